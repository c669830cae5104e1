use super::mappers::snapshot_from_row;
use super::rows::SnapshotRow;
use crate::application::ports::{SnapshotCache, SnapshotMutator};
use crate::domain::entities::{SnapshotEntry, SnapshotOrigin};
use crate::domain::value_objects::ResourceUrl;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::Mutex;

pub struct SqliteSnapshotCache {
    pool: SqlitePool,
    // Serializes read-modify-write cycles issued from this process.
    write_gate: Mutex<()>,
}

impl SqliteSnapshotCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_gate: Mutex::new(()),
        }
    }

    async fn fetch(&self, url: &ResourceUrl) -> Result<Option<SnapshotEntry>, AppError> {
        let row = sqlx::query_as::<_, SnapshotRow>("SELECT * FROM snapshot_cache WHERE url = ?1")
            .bind(url.as_key())
            .fetch_optional(&self.pool)
            .await?;
        row.map(snapshot_from_row).transpose()
    }
}

#[async_trait]
impl SnapshotCache for SqliteSnapshotCache {
    async fn get(&self, url: &ResourceUrl) -> Result<Option<SnapshotEntry>, AppError> {
        self.fetch(url).await
    }

    async fn put(
        &self,
        url: &ResourceUrl,
        body: &Value,
        origin: SnapshotOrigin,
    ) -> Result<(), AppError> {
        let _guard = self.write_gate.lock().await;
        sqlx::query(
            r#"
            INSERT INTO snapshot_cache (url, body, origin, is_stale, refreshed_at)
            VALUES (?1, ?2, ?3, 0, ?4)
            ON CONFLICT(url) DO UPDATE SET
                body = excluded.body,
                origin = excluded.origin,
                is_stale = 0,
                refreshed_at = excluded.refreshed_at
            "#,
        )
        .bind(url.as_key())
        .bind(serde_json::to_string(body)?)
        .bind(origin.as_str())
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mutate(
        &self,
        url: &ResourceUrl,
        mutator: SnapshotMutator<'_>,
    ) -> Result<Option<SnapshotEntry>, AppError> {
        let _guard = self.write_gate.lock().await;
        let Some(mut entry) = self.fetch(url).await? else {
            return Ok(None);
        };

        if mutator(&mut entry.body) {
            sqlx::query("UPDATE snapshot_cache SET body = ?1 WHERE url = ?2")
                .bind(serde_json::to_string(&entry.body)?)
                .bind(url.as_key())
                .execute(&self.pool)
                .await?;
            tracing::trace!(target: "sync::cache", url = %url, "snapshot updated locally");
        }
        Ok(Some(entry))
    }

    async fn rename(&self, from: &ResourceUrl, to: &ResourceUrl) -> Result<bool, AppError> {
        if from == to {
            return Ok(false);
        }
        let _guard = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM snapshot_cache WHERE url = ?1")
            .bind(from.as_key())
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Ok(false);
        }

        sqlx::query("DELETE FROM snapshot_cache WHERE url = ?1")
            .bind(to.as_key())
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE snapshot_cache SET url = ?1 WHERE url = ?2")
            .bind(to.as_key())
            .bind(from.as_key())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn mark_stale(&self, url: &ResourceUrl) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE snapshot_cache SET is_stale = 1 WHERE url = ?1")
            .bind(url.as_key())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove(&self, url: &ResourceUrl) -> Result<bool, AppError> {
        let _guard = self.write_gate.lock().await;
        let result = sqlx::query("DELETE FROM snapshot_cache WHERE url = ?1")
            .bind(url.as_key())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
