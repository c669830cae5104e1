use super::rows::IdRemapRow;
use crate::application::ports::IdRemapStore;
use crate::domain::entities::IdRemap;
use crate::domain::value_objects::EntityId;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

pub struct SqliteIdRemapStore {
    pool: SqlitePool,
}

impl SqliteIdRemapStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdRemapStore for SqliteIdRemapStore {
    async fn record(&self, local_id: &EntityId, remote_id: &EntityId) -> Result<(), AppError> {
        if local_id == remote_id {
            return Ok(());
        }
        sqlx::query(
            r#"
            INSERT INTO id_remap (local_id, remote_id, created_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(local_id) DO UPDATE SET remote_id = excluded.remote_id
            "#,
        )
        .bind(local_id.as_str())
        .bind(remote_id.as_str())
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            target: "sync::remap",
            local_id = %local_id,
            remote_id = %remote_id,
            "client id replaced by server id"
        );
        Ok(())
    }

    async fn load(&self) -> Result<IdRemap, AppError> {
        let rows = sqlx::query_as::<_, IdRemapRow>("SELECT * FROM id_remap ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.local_id, row.remote_id))
            .collect())
    }
}
