use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// No response reached us: the request never got to the server or timed out.
    #[error("Connectivity absent: {0}")]
    ConnectivityAbsent(String),
    #[error("Request rejected with status {status}")]
    DefinitiveRejection { status: u16, body: Value },
    #[error("Server fault with status {status}")]
    ServerFault { status: u16, body: Value },
    #[error("Local storage error: {0}")]
    LocalStorage(String),
    #[error("No local data for {0}")]
    NoLocalData(String),
    #[error("Session expired")]
    SessionExpired,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AppError {
    /// Errors the engine recovers from locally instead of surfacing to the user.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::ConnectivityAbsent(_) | AppError::ServerFault { .. }
        )
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::LocalStorage(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::LocalStorage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            AppError::ConnectivityAbsent(err.to_string())
        } else {
            AppError::Serialization(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
