use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MutationRow {
    pub id: i64,
    pub target_url: String,
    pub method: String,
    pub body: Option<String>,
    pub attachment_digest: Option<String>,
    pub auth_context: Option<String>,
    pub entity_id: Option<String>,
    pub enqueued_at: i64,
    pub retry_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SnapshotRow {
    pub url: String,
    pub body: String,
    pub origin: String,
    pub is_stale: bool,
    pub refreshed_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IdRemapRow {
    pub local_id: String,
    pub remote_id: String,
    pub created_at: i64,
}
