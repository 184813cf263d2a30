use tokio::sync::RwLock;

/// Injected session-context collaborator. Acquired on sign-in, cleared on
/// sign-out, read-only during requests. Absence of a credential is not an
/// error here; enforcement is the service's responsibility.
#[derive(Debug, Default)]
pub struct SessionContext {
    bearer_token: RwLock<Option<String>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sign_in(&self, token: impl Into<String>) {
        *self.bearer_token.write().await = Some(token.into());
    }

    pub async fn sign_out(&self) {
        *self.bearer_token.write().await = None;
    }

    pub async fn bearer_token(&self) -> Option<String> {
        self.bearer_token.read().await.clone()
    }
}
