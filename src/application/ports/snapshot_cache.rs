use crate::domain::entities::{SnapshotEntry, SnapshotOrigin};
use crate::domain::value_objects::ResourceUrl;
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde_json::Value;

/// Edits a cached body in place; returns whether it changed anything.
pub type SnapshotMutator<'a> = &'a (dyn Fn(&mut Value) -> bool + Send + Sync);

/// Last known server bodies, keyed by canonical url. Exact-key lookups only.
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    async fn get(&self, url: &ResourceUrl) -> Result<Option<SnapshotEntry>, AppError>;

    async fn put(
        &self,
        url: &ResourceUrl,
        body: &Value,
        origin: SnapshotOrigin,
    ) -> Result<(), AppError>;

    /// No-op returning `None` when nothing is cached for `url`.
    async fn mutate(
        &self,
        url: &ResourceUrl,
        mutator: SnapshotMutator<'_>,
    ) -> Result<Option<SnapshotEntry>, AppError>;

    /// Moves an entry to a new key, replacing whatever was stored there.
    async fn rename(&self, from: &ResourceUrl, to: &ResourceUrl) -> Result<bool, AppError>;

    async fn mark_stale(&self, url: &ResourceUrl) -> Result<bool, AppError>;

    async fn remove(&self, url: &ResourceUrl) -> Result<bool, AppError>;
}
