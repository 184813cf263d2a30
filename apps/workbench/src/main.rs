use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use client_core::{GatewayConfig, HttpProductGateway, SessionContext, WorkbenchClient};
use shared::domain::ProductId;
use tracing::info;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    api_url: String,
    /// Bearer token for the data-product service, if it requires one.
    #[arg(long)]
    token: Option<String>,
    /// Validate this product after listing.
    #[arg(long)]
    validate: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let session = Arc::new(SessionContext::new());
    if let Some(token) = args.token {
        session.sign_in(token).await;
    }
    let gateway = HttpProductGateway::new(GatewayConfig::new(args.api_url), session)?;
    let client = WorkbenchClient::new(Arc::new(gateway));

    client.refresh().await?;
    let view = client.store_view().await;
    info!(count = view.entities.len(), "product list loaded");
    println!("{} data products", view.entities.len());
    for product in &view.entities {
        println!(
            "  #{} {} [{:?}] refresh={:?} updated={}",
            product.id.0, product.name, product.status, product.refresh_frequency,
            product.last_updated
        );
    }

    if let Some(id) = args.validate {
        client.validate(ProductId(id)).await?;
        if let client_core::ActiveDialog::Validate { payload: Some(report), .. } =
            client.active_dialog().await
        {
            println!(
                "validation for #{id}: {}",
                if report.passed { "passed" } else { "failed" }
            );
            for check in &report.details {
                println!(
                    "  [{}] {}: {}",
                    if check.passed { "ok" } else { "!!" },
                    check.name,
                    check.message
                );
            }
            for hint in &report.recommendations {
                println!("  hint: {hint}");
            }
        }
    }

    Ok(())
}
