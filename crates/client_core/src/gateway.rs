use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use shared::{
    domain::ProductId,
    protocol::{
        AttributeSpec, DataProduct, ProductDesign, ProductDraft, ProductUpdate, ValidationReport,
    },
};
use tracing::debug;

use crate::{error::GatewayError, session::SessionContext};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin interface to the remote data-product service. Every call is a single
/// attempt; retry is the caller's decision, surfaced through the error kind.
#[async_trait]
pub trait ProductGateway: Send + Sync {
    async fn list_products(&self) -> Result<Vec<DataProduct>, GatewayError>;
    async fn fetch_product(&self, id: ProductId) -> Result<DataProduct, GatewayError>;
    async fn create_product(&self, draft: &ProductDraft) -> Result<DataProduct, GatewayError>;
    async fn update_product(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<DataProduct, GatewayError>;
    /// Idempotent from the caller's perspective: a not-found result counts as
    /// success, the product is gone either way.
    async fn delete_product(&self, id: ProductId) -> Result<(), GatewayError>;
    async fn recommend_attributes(
        &self,
        use_case: &str,
    ) -> Result<Vec<AttributeSpec>, GatewayError>;
    async fn generate_design(&self, id: ProductId) -> Result<ProductDesign, GatewayError>;
    async fn validate_product(&self, id: ProductId) -> Result<ValidationReport, GatewayError>;
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

/// FastAPI-style error envelope; anything else in the body is ignored.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

pub struct HttpProductGateway {
    http: Client,
    base_url: String,
    request_timeout: Duration,
    session: Arc<SessionContext>,
}

impl HttpProductGateway {
    pub fn new(config: GatewayConfig, session: Arc<SessionContext>) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout,
            session,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.bearer_token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Sends the request and maps the raw outcome onto the error taxonomy.
    /// Success leaves the response body untouched for the caller to decode.
    async fn execute(&self, request: RequestBuilder) -> Result<reqwest::Response, GatewayError> {
        let request = self.authorized(request).await;
        let response = request
            .send()
            .await
            .map_err(|err| GatewayError::from_reqwest(err, self.request_timeout))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.detail)
            .unwrap_or_default();
        debug!(status = status.as_u16(), detail, "gateway call rejected");

        Err(match status {
            StatusCode::UNAUTHORIZED => GatewayError::Unauthorized { detail },
            StatusCode::UNPROCESSABLE_ENTITY => GatewayError::Validation { detail },
            _ => GatewayError::Service {
                status: status.as_u16(),
                detail,
            },
        })
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        response
            .json()
            .await
            .map_err(|err| GatewayError::Transport(format!("invalid response body: {err}")))
    }
}

#[async_trait]
impl ProductGateway for HttpProductGateway {
    async fn list_products(&self) -> Result<Vec<DataProduct>, GatewayError> {
        let response = self.execute(self.http.get(self.endpoint("data-products"))).await?;
        Self::decode(response).await
    }

    async fn fetch_product(&self, id: ProductId) -> Result<DataProduct, GatewayError> {
        let response = self
            .execute(self.http.get(self.endpoint(&format!("data-products/{}", id.0))))
            .await?;
        Self::decode(response).await
    }

    async fn create_product(&self, draft: &ProductDraft) -> Result<DataProduct, GatewayError> {
        let response = self
            .execute(self.http.post(self.endpoint("data-products")).json(draft))
            .await?;
        Self::decode(response).await
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<DataProduct, GatewayError> {
        let response = self
            .execute(
                self.http
                    .patch(self.endpoint(&format!("data-products/{}", id.0)))
                    .json(update),
            )
            .await?;
        Self::decode(response).await
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), GatewayError> {
        let result = self
            .execute(
                self.http
                    .delete(self.endpoint(&format!("data-products/{}", id.0))),
            )
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(GatewayError::Service { status: 404, .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn recommend_attributes(
        &self,
        use_case: &str,
    ) -> Result<Vec<AttributeSpec>, GatewayError> {
        let response = self
            .execute(
                self.http
                    .get(self.endpoint("recommend-attributes"))
                    .query(&[("use_case", use_case)]),
            )
            .await?;
        Self::decode(response).await
    }

    async fn generate_design(&self, id: ProductId) -> Result<ProductDesign, GatewayError> {
        let response = self
            .execute(
                self.http
                    .post(self.endpoint(&format!("data-products/{}/generate-mappings", id.0))),
            )
            .await?;
        Self::decode(response).await
    }

    async fn validate_product(&self, id: ProductId) -> Result<ValidationReport, GatewayError> {
        let response = self
            .execute(
                self.http
                    .get(self.endpoint(&format!("data-products/{}/validate", id.0))),
            )
            .await?;
        Self::decode(response).await
    }
}
