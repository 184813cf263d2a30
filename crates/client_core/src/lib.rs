use std::{collections::HashSet, sync::Arc};

use shared::{
    domain::{ProductId, ProductStatus},
    protocol::{DataProduct, ProductDraft, ProductUpdate},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

pub mod dialog;
pub mod error;
pub mod gateway;
pub mod session;
pub mod store;

pub use dialog::{ActiveDialog, CreateForm, DialogKind};
pub use error::{GatewayError, WorkflowError};
pub use gateway::{GatewayConfig, HttpProductGateway, ProductGateway};
pub use session::SessionContext;
pub use store::{ProductPatch, ProductStore};

/// Long-running operations serialized per product id. A second request for
/// the same `(ProductId, OperationKind)` key is rejected with
/// `WorkflowError::Busy` instead of racing the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Attributes,
    Design,
    Validate,
    SaveDesign,
    Delete,
}

#[derive(Debug, Clone)]
pub enum WorkbenchEvent {
    StoreChanged,
    DialogChanged,
    Error(String),
}

/// Read-only snapshot of the store for rendering.
#[derive(Debug, Clone)]
pub struct StoreView {
    pub entities: Vec<DataProduct>,
    pub loading: bool,
    pub error: Option<String>,
}

struct ControllerState {
    store: ProductStore,
    dialog: ActiveDialog,
    /// Bumped on every dialog transition. An async result captured under an
    /// older epoch is stale and must not be applied.
    dialog_epoch: u64,
    pending_delete: Option<ProductId>,
    inflight: HashSet<(ProductId, OperationKind)>,
}

impl ControllerState {
    fn set_dialog(&mut self, dialog: ActiveDialog) {
        self.dialog = dialog;
        self.dialog_epoch += 1;
    }
}

/// The workflow controller: sequences gateway calls, owns the store and the
/// active dialog, and is the only writer for either. Every action follows the
/// same fire, wait, reconcile shape — no retries, no cancellation; closing a
/// dialog only suppresses the eventual UI effect of an in-flight call.
pub struct WorkbenchClient {
    gateway: Arc<dyn ProductGateway>,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<WorkbenchEvent>,
}

impl WorkbenchClient {
    pub fn new(gateway: Arc<dyn ProductGateway>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            gateway,
            inner: Mutex::new(ControllerState {
                store: ProductStore::default(),
                dialog: ActiveDialog::None,
                dialog_epoch: 0,
                pending_delete: None,
                inflight: HashSet::new(),
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WorkbenchEvent> {
        self.events.subscribe()
    }

    pub async fn store_view(&self) -> StoreView {
        let inner = self.inner.lock().await;
        StoreView {
            entities: inner.store.entities().to_vec(),
            loading: inner.store.loading(),
            error: inner.store.error().map(str::to_string),
        }
    }

    pub async fn active_dialog(&self) -> ActiveDialog {
        self.inner.lock().await.dialog.clone()
    }

    pub async fn pending_delete(&self) -> Option<ProductId> {
        self.inner.lock().await.pending_delete
    }

    /// Re-fetches the product list. On failure the previous list is retained
    /// and the error banner is set, so a failed refresh never blanks a
    /// previously good view.
    pub async fn refresh(&self) -> Result<(), WorkflowError> {
        {
            let mut inner = self.inner.lock().await;
            inner.store.begin_load();
        }
        self.emit(WorkbenchEvent::StoreChanged);

        match self.gateway.list_products().await {
            Ok(products) => {
                let count = products.len();
                self.inner.lock().await.store.set_entities(products);
                self.emit(WorkbenchEvent::StoreChanged);
                info!(count, "product list refreshed");
                Ok(())
            }
            Err(err) => {
                let message = user_message("load data products", &err);
                warn!("product list refresh failed: {err}");
                self.inner.lock().await.store.fail(message.clone());
                self.emit(WorkbenchEvent::StoreChanged);
                self.emit(WorkbenchEvent::Error(message));
                Err(err.into())
            }
        }
    }

    pub async fn open_create(&self) {
        {
            let mut inner = self.inner.lock().await;
            inner.set_dialog(ActiveDialog::Create {
                form: CreateForm::default(),
            });
        }
        self.emit(WorkbenchEvent::DialogChanged);
    }

    pub async fn close_dialog(&self) {
        {
            let mut inner = self.inner.lock().await;
            inner.set_dialog(ActiveDialog::None);
        }
        self.emit(WorkbenchEvent::DialogChanged);
    }

    /// Submits the create form. An empty name never reaches the gateway, and
    /// a second submit while one is pending is rejected. A gateway failure
    /// keeps the dialog open with a slot-local error so the user's input is
    /// not lost; the entity is appended only after the service confirms it,
    /// no optimistic insert.
    pub async fn submit_create(&self, draft: ProductDraft) -> Result<ProductId, WorkflowError> {
        if draft.name.trim().is_empty() {
            {
                let mut inner = self.inner.lock().await;
                if let ActiveDialog::Create { form } = &mut inner.dialog {
                    form.error = Some("product name must not be empty".to_string());
                    form.submitting = false;
                }
            }
            self.emit(WorkbenchEvent::DialogChanged);
            return Err(WorkflowError::EmptyName);
        }

        {
            let mut inner = self.inner.lock().await;
            if let ActiveDialog::Create { form } = &mut inner.dialog {
                if form.submitting {
                    return Err(WorkflowError::SubmitInFlight);
                }
                form.submitting = true;
                form.error = None;
            }
        }
        self.emit(WorkbenchEvent::DialogChanged);

        match self.gateway.create_product(&draft).await {
            Ok(product) => {
                let id = product.id;
                {
                    let mut inner = self.inner.lock().await;
                    inner.store.append(product);
                    if inner.dialog.is_open(DialogKind::Create) {
                        inner.set_dialog(ActiveDialog::None);
                    }
                }
                self.emit(WorkbenchEvent::StoreChanged);
                self.emit(WorkbenchEvent::DialogChanged);
                info!(product_id = id.0, "data product created");
                Ok(id)
            }
            Err(err) => {
                let message = user_message("create data product", &err);
                warn!("create failed: {err}");
                {
                    let mut inner = self.inner.lock().await;
                    match &mut inner.dialog {
                        ActiveDialog::Create { form } => {
                            form.error = Some(message.clone());
                            form.submitting = false;
                        }
                        _ => inner.store.fail(message.clone()),
                    }
                }
                self.emit(WorkbenchEvent::DialogChanged);
                self.emit(WorkbenchEvent::Error(message));
                Err(err.into())
            }
        }
    }

    /// Records the delete target without touching the gateway. Deletion is
    /// destructive, so nothing is dispatched until `confirm_delete`.
    pub async fn request_delete(&self, id: ProductId) -> Result<(), WorkflowError> {
        let mut inner = self.inner.lock().await;
        if inner.store.get(id).is_none() {
            return Err(WorkflowError::UnknownProduct(id));
        }
        inner.pending_delete = Some(id);
        Ok(())
    }

    pub async fn cancel_delete(&self) {
        self.inner.lock().await.pending_delete = None;
    }

    pub async fn confirm_delete(&self) -> Result<(), WorkflowError> {
        let id = {
            let inner = self.inner.lock().await;
            inner.pending_delete.ok_or(WorkflowError::NoPendingDelete)?
        };
        self.begin_operation(id, OperationKind::Delete).await?;

        let outcome = match self.gateway.delete_product(id).await {
            Ok(()) => {
                {
                    let mut inner = self.inner.lock().await;
                    inner.pending_delete = None;
                    inner.store.remove(id);
                    if inner.dialog.bound_product() == Some(id) {
                        inner.set_dialog(ActiveDialog::None);
                    }
                }
                self.emit(WorkbenchEvent::StoreChanged);
                self.emit(WorkbenchEvent::DialogChanged);
                info!(product_id = id.0, "data product deleted");
                Ok(())
            }
            Err(err) => {
                let message = user_message("delete data product", &err);
                warn!(product_id = id.0, "delete failed: {err}");
                {
                    let mut inner = self.inner.lock().await;
                    inner.pending_delete = None;
                    inner.store.fail(message.clone());
                }
                self.emit(WorkbenchEvent::StoreChanged);
                self.emit(WorkbenchEvent::Error(message));
                Err(err.into())
            }
        };

        self.finish_operation(id, OperationKind::Delete).await;
        outcome
    }

    /// Opens the attributes dialog bound to `id` with an empty payload, then
    /// fetches recommendations for the product's use case. The resolved
    /// payload is dropped if the dialog changed during the await.
    pub async fn recommend_attributes(&self, id: ProductId) -> Result<(), WorkflowError> {
        let use_case = {
            let inner = self.inner.lock().await;
            let product = inner
                .store
                .get(id)
                .ok_or(WorkflowError::UnknownProduct(id))?;
            if product.description.is_empty() {
                product.name.clone()
            } else {
                product.description.clone()
            }
        };
        self.begin_operation(id, OperationKind::Attributes).await?;

        let epoch = {
            let mut inner = self.inner.lock().await;
            inner.set_dialog(ActiveDialog::Attributes {
                product_id: id,
                payload: None,
            });
            inner.dialog_epoch
        };
        self.emit(WorkbenchEvent::DialogChanged);

        let outcome = match self.gateway.recommend_attributes(&use_case).await {
            Ok(attributes) => {
                let applied = {
                    let mut inner = self.inner.lock().await;
                    if inner.dialog_epoch == epoch {
                        inner.set_dialog(ActiveDialog::Attributes {
                            product_id: id,
                            payload: Some(attributes),
                        });
                        true
                    } else {
                        false
                    }
                };
                if applied {
                    self.emit(WorkbenchEvent::DialogChanged);
                } else {
                    info!(
                        product_id = id.0,
                        "dropping attribute recommendation for a closed or rebound dialog"
                    );
                }
                Ok(())
            }
            Err(err) => {
                // The dialog stays open in its empty state; only the banner
                // reports the failure.
                let message = user_message("recommend attributes", &err);
                warn!(product_id = id.0, "attribute recommendation failed: {err}");
                self.inner.lock().await.store.fail(message.clone());
                self.emit(WorkbenchEvent::StoreChanged);
                self.emit(WorkbenchEvent::Error(message));
                Err(err.into())
            }
        };

        self.finish_operation(id, OperationKind::Attributes).await;
        outcome
    }

    /// Requests an AI-generated design for `id`. The design dialog opens only
    /// on success, and only if no dialog interaction happened while the call
    /// was in flight.
    pub async fn generate_design(&self, id: ProductId) -> Result<(), WorkflowError> {
        {
            let inner = self.inner.lock().await;
            inner
                .store
                .get(id)
                .ok_or(WorkflowError::UnknownProduct(id))?;
        }
        self.begin_operation(id, OperationKind::Design).await?;
        let epoch = { self.inner.lock().await.dialog_epoch };

        let outcome = match self.gateway.generate_design(id).await {
            Ok(design) => {
                let applied = {
                    let mut inner = self.inner.lock().await;
                    if inner.dialog_epoch == epoch {
                        inner.set_dialog(ActiveDialog::Design {
                            product_id: id,
                            payload: Some(design),
                        });
                        true
                    } else {
                        false
                    }
                };
                if applied {
                    self.emit(WorkbenchEvent::DialogChanged);
                } else {
                    info!(
                        product_id = id.0,
                        "dropping generated design after a dialog change"
                    );
                }
                Ok(())
            }
            Err(err) => {
                let message = user_message("generate design", &err);
                warn!(product_id = id.0, "design generation failed: {err}");
                self.inner.lock().await.store.fail(message.clone());
                self.emit(WorkbenchEvent::StoreChanged);
                self.emit(WorkbenchEvent::Error(message));
                Err(err.into())
            }
        };

        self.finish_operation(id, OperationKind::Design).await;
        outcome
    }

    /// Runs validation for `id`. Validation is requested by id and always
    /// recomputed; the validate dialog opens only on success under the same
    /// stale-result rule as `generate_design`.
    pub async fn validate(&self, id: ProductId) -> Result<(), WorkflowError> {
        {
            let inner = self.inner.lock().await;
            inner
                .store
                .get(id)
                .ok_or(WorkflowError::UnknownProduct(id))?;
        }
        self.begin_operation(id, OperationKind::Validate).await?;
        let epoch = { self.inner.lock().await.dialog_epoch };

        let outcome = match self.gateway.validate_product(id).await {
            Ok(report) => {
                let applied = {
                    let mut inner = self.inner.lock().await;
                    if inner.dialog_epoch == epoch {
                        inner.set_dialog(ActiveDialog::Validate {
                            product_id: id,
                            payload: Some(report),
                        });
                        true
                    } else {
                        false
                    }
                };
                if applied {
                    self.emit(WorkbenchEvent::DialogChanged);
                } else {
                    info!(
                        product_id = id.0,
                        "dropping validation report after a dialog change"
                    );
                }
                Ok(())
            }
            Err(err) => {
                let message = user_message("validate data product", &err);
                warn!(product_id = id.0, "validation failed: {err}");
                self.inner.lock().await.store.fail(message.clone());
                self.emit(WorkbenchEvent::StoreChanged);
                self.emit(WorkbenchEvent::Error(message));
                Err(err.into())
            }
        };

        self.finish_operation(id, OperationKind::Validate).await;
        outcome
    }

    /// Persists the design currently shown in the design dialog, promoting
    /// the product to `Active`. On success the local entity is patched from
    /// the confirmed record and the dialog closes, clearing its payload; on
    /// failure the dialog stays open with its data intact.
    pub async fn save_design(&self) -> Result<(), WorkflowError> {
        let (id, design) = {
            let inner = self.inner.lock().await;
            match &inner.dialog {
                ActiveDialog::Design {
                    product_id,
                    payload: Some(design),
                } => (*product_id, design.clone()),
                _ => return Err(WorkflowError::NoDesignLoaded),
            }
        };
        self.begin_operation(id, OperationKind::SaveDesign).await?;

        let update = ProductUpdate {
            status: Some(ProductStatus::Active),
            design: Some(design),
            ..Default::default()
        };
        let outcome = match self.gateway.update_product(id, &update).await {
            Ok(confirmed) => {
                {
                    let mut inner = self.inner.lock().await;
                    inner.store.patch(id, ProductPatch::from_confirmed(&confirmed));
                    if inner.dialog.is_bound(DialogKind::Design, id) {
                        inner.set_dialog(ActiveDialog::None);
                    }
                }
                self.emit(WorkbenchEvent::StoreChanged);
                self.emit(WorkbenchEvent::DialogChanged);
                info!(product_id = id.0, "design saved and product activated");
                Ok(())
            }
            Err(err) => {
                let message = user_message("save design", &err);
                warn!(product_id = id.0, "save design failed: {err}");
                self.inner.lock().await.store.fail(message.clone());
                self.emit(WorkbenchEvent::StoreChanged);
                self.emit(WorkbenchEvent::Error(message));
                Err(err.into())
            }
        };

        self.finish_operation(id, OperationKind::SaveDesign).await;
        outcome
    }

    pub async fn dismiss_error(&self) {
        self.inner.lock().await.store.clear_error();
        self.emit(WorkbenchEvent::StoreChanged);
    }

    fn emit(&self, event: WorkbenchEvent) {
        let _ = self.events.send(event);
    }

    async fn begin_operation(
        &self,
        id: ProductId,
        op: OperationKind,
    ) -> Result<(), WorkflowError> {
        let mut inner = self.inner.lock().await;
        if !inner.inflight.insert((id, op)) {
            return Err(WorkflowError::Busy { id, op });
        }
        Ok(())
    }

    async fn finish_operation(&self, id: ProductId, op: OperationKind) {
        self.inner.lock().await.inflight.remove(&(id, op));
    }
}

/// Banner text policy: the service's own `detail` is shown verbatim when
/// present, otherwise a generic per-action message.
fn user_message(action: &str, err: &GatewayError) -> String {
    match err.detail() {
        Some(detail) => detail.to_string(),
        None => format!("failed to {action}"),
    }
}
