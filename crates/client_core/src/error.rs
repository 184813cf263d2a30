use std::time::Duration;

use shared::domain::ProductId;
use thiserror::Error;

use crate::OperationKind;

/// Outcome of a single gateway call. The gateway never retries; every variant
/// here is recoverable by re-invoking the same action.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No usable response reached the client (connect failure, timeout, or a
    /// body that could not be decoded).
    #[error("transport failure: {0}")]
    Transport(String),
    /// Non-2xx response. `detail` is the service's error message when the
    /// body carried one, otherwise empty.
    #[error("service error (status {status}): {detail}")]
    Service { status: u16, detail: String },
    /// 422-class subset of `Service`, split out so the caller can surface the
    /// service's validation message verbatim.
    #[error("validation rejected: {detail}")]
    Validation { detail: String },
    /// 401 forwarded as a distinct kind so the session layer can tear down.
    /// The gateway itself never mutates the session.
    #[error("credential rejected: {detail}")]
    Unauthorized { detail: String },
}

impl GatewayError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            return GatewayError::Transport(format!(
                "request timed out after {}s",
                timeout.as_secs()
            ));
        }
        GatewayError::Transport(err.to_string())
    }

    /// The service's own message, when one was present in the response body.
    pub fn detail(&self) -> Option<&str> {
        match self {
            GatewayError::Transport(_) => None,
            GatewayError::Service { detail, .. }
            | GatewayError::Validation { detail }
            | GatewayError::Unauthorized { detail } => {
                (!detail.is_empty()).then_some(detail.as_str())
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("product name must not be empty")]
    EmptyName,
    #[error("a create request is already in flight")]
    SubmitInFlight,
    #[error("{op:?} is already running for product {}", id.0)]
    Busy { id: ProductId, op: OperationKind },
    #[error("unknown product {0:?}")]
    UnknownProduct(ProductId),
    #[error("no delete is awaiting confirmation")]
    NoPendingDelete,
    #[error("design dialog is not open with a loaded design")]
    NoDesignLoaded,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
