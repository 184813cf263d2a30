use std::{collections::HashSet, sync::Arc, time::Duration};

use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use shared::{
    domain::{ProductId, ProductStatus, RefreshFrequency},
    protocol::{
        AttributeSpec, DataProduct, ProductDesign, SourceField, ValidationCheck, ValidationReport,
    },
};
use tokio::{
    net::TcpListener,
    sync::{Mutex, Semaphore},
};

/// In-process stand-in for the data-product service. Each field of shared
/// state either scripts a failure, gates a response, or records what the
/// service observed so tests can assert on it.
#[derive(Clone)]
pub struct ServiceState {
    pub products: Arc<Mutex<Vec<DataProduct>>>,
    pub auth_headers: Arc<Mutex<Vec<Option<String>>>>,

    pub list_failure: Arc<Mutex<Option<u16>>>,
    pub list_hold: Arc<Mutex<bool>>,
    pub list_release: Arc<Semaphore>,

    pub create_calls: Arc<Mutex<u32>>,
    pub create_failure: Arc<Mutex<Option<(u16, String)>>>,
    pub create_hold: Arc<Mutex<bool>>,
    pub create_release: Arc<Semaphore>,

    pub update_calls: Arc<Mutex<Vec<(i64, serde_json::Value)>>>,
    pub update_failure: Arc<Mutex<Option<(u16, String)>>>,

    pub delete_calls: Arc<Mutex<Vec<i64>>>,
    pub delete_failure: Arc<Mutex<Option<u16>>>,
    pub delete_missing: Arc<Mutex<bool>>,

    pub recommend_calls: Arc<Mutex<u32>>,
    pub recommend_use_cases: Arc<Mutex<Vec<String>>>,
    pub recommend_failure: Arc<Mutex<Option<(u16, String)>>>,
    pub recommend_hold: Arc<Mutex<bool>>,
    pub recommend_release: Arc<Semaphore>,
    pub attributes: Arc<Mutex<Vec<AttributeSpec>>>,

    pub design_calls: Arc<Mutex<u32>>,
    pub design_failure: Arc<Mutex<Option<(u16, String)>>>,
    pub design_hold: Arc<Mutex<bool>>,
    pub design_release: Arc<Semaphore>,
    pub design: Arc<Mutex<ProductDesign>>,

    pub validate_calls: Arc<Mutex<Vec<i64>>>,
    pub validate_hold_ids: Arc<Mutex<HashSet<i64>>>,
    pub validate_release: Arc<Semaphore>,
}

impl ServiceState {
    fn new() -> Self {
        Self {
            products: Arc::new(Mutex::new(Vec::new())),
            auth_headers: Arc::new(Mutex::new(Vec::new())),
            list_failure: Arc::new(Mutex::new(None)),
            list_hold: Arc::new(Mutex::new(false)),
            list_release: Arc::new(Semaphore::new(0)),
            create_calls: Arc::new(Mutex::new(0)),
            create_failure: Arc::new(Mutex::new(None)),
            create_hold: Arc::new(Mutex::new(false)),
            create_release: Arc::new(Semaphore::new(0)),
            update_calls: Arc::new(Mutex::new(Vec::new())),
            update_failure: Arc::new(Mutex::new(None)),
            delete_calls: Arc::new(Mutex::new(Vec::new())),
            delete_failure: Arc::new(Mutex::new(None)),
            delete_missing: Arc::new(Mutex::new(false)),
            recommend_calls: Arc::new(Mutex::new(0)),
            recommend_use_cases: Arc::new(Mutex::new(Vec::new())),
            recommend_failure: Arc::new(Mutex::new(None)),
            recommend_hold: Arc::new(Mutex::new(false)),
            recommend_release: Arc::new(Semaphore::new(0)),
            attributes: Arc::new(Mutex::new(vec![sample_attribute("customer_id")])),
            design_calls: Arc::new(Mutex::new(0)),
            design_failure: Arc::new(Mutex::new(None)),
            design_hold: Arc::new(Mutex::new(false)),
            design_release: Arc::new(Semaphore::new(0)),
            design: Arc::new(Mutex::new(sample_design())),
            validate_calls: Arc::new(Mutex::new(Vec::new())),
            validate_hold_ids: Arc::new(Mutex::new(HashSet::new())),
            validate_release: Arc::new(Semaphore::new(0)),
        }
    }
}

pub fn sample_product(id: i64, name: &str) -> DataProduct {
    DataProduct {
        id: ProductId(id),
        name: name.to_string(),
        description: format!("{name} across all systems"),
        status: ProductStatus::Draft,
        refresh_frequency: RefreshFrequency::Daily,
        last_updated: "2024-03-01T10:00:00Z".parse().expect("timestamp"),
        attributes: None,
        design: None,
    }
}

pub fn sample_attribute(name: &str) -> AttributeSpec {
    AttributeSpec {
        name: name.to_string(),
        data_type: "string".to_string(),
        description: String::new(),
        required: true,
        source: None,
    }
}

pub fn sample_design() -> ProductDesign {
    ProductDesign {
        source_system: Some("core_banking".to_string()),
        source_fields: vec![SourceField {
            name: "customer_id".to_string(),
            data_type: "string".to_string(),
            required: true,
        }],
        relationships: Vec::new(),
    }
}

type Failure = (StatusCode, Json<serde_json::Value>);

fn failure(status: u16, detail: &str) -> Failure {
    (
        StatusCode::from_u16(status).expect("status"),
        Json(json!({ "detail": detail })),
    )
}

async fn handle_list(
    State(state): State<ServiceState>,
    headers: HeaderMap,
) -> Result<Json<Vec<DataProduct>>, Failure> {
    state.auth_headers.lock().await.push(
        headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    );
    if *state.list_hold.lock().await {
        state.list_release.acquire().await.expect("semaphore").forget();
    }
    if let Some(status) = *state.list_failure.lock().await {
        return Err(failure(status, ""));
    }
    Ok(Json(state.products.lock().await.clone()))
}

async fn handle_create(
    State(state): State<ServiceState>,
    Json(draft): Json<serde_json::Value>,
) -> Result<Json<DataProduct>, Failure> {
    *state.create_calls.lock().await += 1;
    if *state.create_hold.lock().await {
        state
            .create_release
            .acquire()
            .await
            .expect("semaphore")
            .forget();
    }
    if let Some((status, detail)) = state.create_failure.lock().await.clone() {
        return Err(failure(status, &detail));
    }

    let mut product = sample_product(7, draft["name"].as_str().unwrap_or_default());
    product.description = draft["description"].as_str().unwrap_or_default().to_string();
    if let Some(frequency) = draft.get("refresh_frequency") {
        product.refresh_frequency =
            serde_json::from_value(frequency.clone()).expect("refresh_frequency");
    }
    Ok(Json(product))
}

async fn handle_fetch(
    State(state): State<ServiceState>,
    Path(id): Path<i64>,
) -> Result<Json<DataProduct>, Failure> {
    state
        .products
        .lock()
        .await
        .iter()
        .find(|product| product.id.0 == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| failure(404, "Data product not found"))
}

async fn handle_update(
    State(state): State<ServiceState>,
    Path(id): Path<i64>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<DataProduct>, Failure> {
    state.update_calls.lock().await.push((id, body.clone()));
    if let Some((status, detail)) = state.update_failure.lock().await.clone() {
        return Err(failure(status, &detail));
    }

    let mut product = state
        .products
        .lock()
        .await
        .iter()
        .find(|product| product.id.0 == id)
        .cloned()
        .unwrap_or_else(|| sample_product(id, "patched"));
    if body.get("status") == Some(&json!("Active")) {
        product.status = ProductStatus::Active;
    }
    if let Some(design) = body.get("source_mappings") {
        product.design = serde_json::from_value(design.clone()).ok();
    }
    Ok(Json(product))
}

async fn handle_delete(
    State(state): State<ServiceState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, Failure> {
    state.delete_calls.lock().await.push(id);
    if let Some(status) = *state.delete_failure.lock().await {
        return Err(failure(status, ""));
    }
    if *state.delete_missing.lock().await {
        return Err(failure(404, "Data product not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(serde::Deserialize)]
struct RecommendQuery {
    use_case: String,
}

async fn handle_recommend(
    State(state): State<ServiceState>,
    Query(query): Query<RecommendQuery>,
) -> Result<Json<Vec<AttributeSpec>>, Failure> {
    *state.recommend_calls.lock().await += 1;
    state.recommend_use_cases.lock().await.push(query.use_case);
    if *state.recommend_hold.lock().await {
        state
            .recommend_release
            .acquire()
            .await
            .expect("semaphore")
            .forget();
    }
    if let Some((status, detail)) = state.recommend_failure.lock().await.clone() {
        return Err(failure(status, &detail));
    }
    Ok(Json(state.attributes.lock().await.clone()))
}

async fn handle_generate_design(
    State(state): State<ServiceState>,
    Path(_id): Path<i64>,
) -> Result<Json<ProductDesign>, Failure> {
    *state.design_calls.lock().await += 1;
    if *state.design_hold.lock().await {
        state
            .design_release
            .acquire()
            .await
            .expect("semaphore")
            .forget();
    }
    if let Some((status, detail)) = state.design_failure.lock().await.clone() {
        return Err(failure(status, &detail));
    }
    Ok(Json(state.design.lock().await.clone()))
}

async fn handle_validate(
    State(state): State<ServiceState>,
    Path(id): Path<i64>,
) -> Json<ValidationReport> {
    state.validate_calls.lock().await.push(id);
    if state.validate_hold_ids.lock().await.contains(&id) {
        state
            .validate_release
            .acquire()
            .await
            .expect("semaphore")
            .forget();
    }
    Json(ValidationReport {
        passed: true,
        details: vec![ValidationCheck {
            name: format!("product-{id}"),
            passed: true,
            message: String::new(),
        }],
        recommendations: Vec::new(),
    })
}

pub async fn spawn_service() -> (String, ServiceState) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let state = ServiceState::new();
    let app = Router::new()
        .route("/data-products", get(handle_list).post(handle_create))
        .route(
            "/data-products/:id",
            get(handle_fetch)
                .patch(handle_update)
                .delete(handle_delete),
        )
        .route(
            "/data-products/:id/generate-mappings",
            post(handle_generate_design),
        )
        .route("/data-products/:id/validate", get(handle_validate))
        .route("/recommend-attributes", get(handle_recommend))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), state)
}

pub async fn wait_for_count(counter: &Mutex<u32>, expected: u32) {
    for _ in 0..200 {
        if *counter.lock().await >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("service did not observe the expected request in time");
}

pub async fn wait_for_id(calls: &Mutex<Vec<i64>>, id: i64) {
    for _ in 0..200 {
        if calls.lock().await.contains(&id) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("service did not observe the expected request in time");
}
