use crate::domain::entities::IdRemap;
use crate::domain::value_objects::EntityId;
use crate::shared::error::AppError;
use async_trait::async_trait;

#[async_trait]
pub trait IdRemapStore: Send + Sync {
    async fn record(&self, local_id: &EntityId, remote_id: &EntityId) -> Result<(), AppError>;
    async fn load(&self) -> Result<IdRemap, AppError>;
}
