use serde::{Deserialize, Serialize};
use std::fmt;

/// Credential captured when a write is issued. Queued writes replay with the
/// context they were enqueued with, not whatever session is active later.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthContext(String);

impl AuthContext {
    pub fn new(token: String) -> Result<Self, String> {
        if token.trim().is_empty() {
            return Err("Auth token cannot be empty".to_string());
        }
        Ok(Self(token))
    }

    pub fn bearer_token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthContext(<redacted>)")
    }
}
