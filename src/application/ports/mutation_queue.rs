use crate::domain::entities::{MutationDraft, QueuedMutation};
use crate::domain::value_objects::MutationId;
use crate::shared::error::AppError;
use async_trait::async_trait;
use bytes::Bytes;

/// Durable FIFO of writes waiting for the network.
///
/// `enqueue` returning `Ok` means the entry survives a crash. Entries come back
/// in insertion order and the store never reorders them.
#[async_trait]
pub trait MutationQueue: Send + Sync {
    async fn enqueue(&self, draft: MutationDraft) -> Result<MutationId, AppError>;
    async fn list_all(&self) -> Result<Vec<QueuedMutation>, AppError>;
    async fn oldest(&self) -> Result<Option<QueuedMutation>, AppError>;
    /// Returns `false` when the entry was already gone.
    async fn remove(&self, id: MutationId) -> Result<bool, AppError>;
    /// Removes all of `ids` atomically.
    async fn remove_many(&self, ids: &[MutationId]) -> Result<u32, AppError>;
    /// Increments and returns the entry's retry count.
    async fn record_retry(&self, id: MutationId) -> Result<u32, AppError>;
    async fn len(&self) -> Result<u32, AppError>;
    async fn load_attachment(&self, digest: &str) -> Result<Option<Bytes>, AppError>;
}
