use crate::domain::value_objects::AuthContext;
use crate::shared::error::AppError;
use async_trait::async_trait;

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Credential for new requests, if a session exists.
    async fn current(&self) -> Option<AuthContext>;

    /// Attempts a credential refresh. Must fail with
    /// [`AppError::ConnectivityAbsent`] when the refresh endpoint could not be
    /// reached, and with [`AppError::SessionExpired`] when the session is invalid.
    async fn refresh(&self) -> Result<AuthContext, AppError>;
}
