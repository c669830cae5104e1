use super::mappers::mutation_from_row;
use super::rows::MutationRow;
use crate::application::ports::MutationQueue;
use crate::domain::entities::{MutationDraft, QueuedMutation};
use crate::domain::value_objects::{Attachment, MutationBody, MutationId, RequestBody};
use crate::shared::error::AppError;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};

/// Mutation queue backed by the `mutation_queue` table. Attachment bytes live
/// in `attachment_blobs` and are written in the same transaction as the entry.
pub struct SqliteMutationQueue {
    pool: SqlitePool,
}

impl SqliteMutationQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn delete_entry(
        tx: &mut Transaction<'_, Sqlite>,
        id: MutationId,
    ) -> Result<bool, AppError> {
        let digest: Option<Option<String>> =
            sqlx::query_scalar("SELECT attachment_digest FROM mutation_queue WHERE id = ?1")
                .bind(id.value())
                .fetch_optional(&mut **tx)
                .await?;

        let Some(digest) = digest else {
            return Ok(false);
        };

        sqlx::query("DELETE FROM mutation_queue WHERE id = ?1")
            .bind(id.value())
            .execute(&mut **tx)
            .await?;

        if let Some(digest) = digest {
            sqlx::query(
                r#"
                DELETE FROM attachment_blobs
                WHERE digest = ?1
                  AND NOT EXISTS (SELECT 1 FROM mutation_queue WHERE attachment_digest = ?1)
                "#,
            )
            .bind(&digest)
            .execute(&mut **tx)
            .await?;
        }

        Ok(true)
    }
}

fn persisted_body(
    body: Option<RequestBody>,
) -> Result<(Option<String>, Option<Attachment>), AppError> {
    match body {
        None => Ok((None, None)),
        Some(RequestBody::Json(value)) => {
            Ok((Some(serde_json::to_string(&MutationBody::Json(value))?), None))
        }
        Some(RequestBody::Attachment(attachment)) => {
            let reference = MutationBody::Attachment(attachment.to_ref());
            Ok((Some(serde_json::to_string(&reference)?), Some(attachment)))
        }
    }
}

#[async_trait]
impl MutationQueue for SqliteMutationQueue {
    async fn enqueue(&self, draft: MutationDraft) -> Result<MutationId, AppError> {
        let MutationDraft {
            target_url,
            method,
            body,
            auth_context,
            entity_id,
            enqueued_at,
        } = draft;

        let (body, attachment) = persisted_body(body)?;
        let digest = attachment.as_ref().map(Attachment::digest);

        let mut tx = self.pool.begin().await?;

        if let (Some(attachment), Some(digest)) = (&attachment, &digest) {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO attachment_blobs (digest, media_type, bytes, created_at)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(digest)
            .bind(&attachment.media_type)
            .bind(attachment.bytes.as_ref())
            .bind(Utc::now().timestamp_millis())
            .execute(&mut *tx)
            .await?;
        }

        let result = sqlx::query(
            r#"
            INSERT INTO mutation_queue (
                target_url, method, body, attachment_digest,
                auth_context, entity_id, enqueued_at, retry_count
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)
            "#,
        )
        .bind(target_url.as_key())
        .bind(method.as_str())
        .bind(&body)
        .bind(&digest)
        .bind(auth_context.as_ref().map(|ctx| ctx.bearer_token().to_string()))
        .bind(entity_id.as_ref().map(|id| id.as_str().to_string()))
        .bind(enqueued_at.timestamp_millis())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let id = MutationId::new(result.last_insert_rowid()).map_err(AppError::LocalStorage)?;
        tracing::debug!(
            target: "sync::queue",
            id = %id,
            method = %method,
            url = %target_url,
            "mutation enqueued"
        );
        Ok(id)
    }

    async fn list_all(&self) -> Result<Vec<QueuedMutation>, AppError> {
        let rows = sqlx::query_as::<_, MutationRow>("SELECT * FROM mutation_queue ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(mutation_from_row).collect()
    }

    async fn oldest(&self) -> Result<Option<QueuedMutation>, AppError> {
        let row = sqlx::query_as::<_, MutationRow>(
            "SELECT * FROM mutation_queue ORDER BY id ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(mutation_from_row).transpose()
    }

    async fn remove(&self, id: MutationId) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;
        let removed = Self::delete_entry(&mut tx, id).await?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn remove_many(&self, ids: &[MutationId]) -> Result<u32, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for id in ids {
            if Self::delete_entry(&mut tx, *id).await? {
                removed += 1;
            }
        }
        tx.commit().await?;
        Ok(removed)
    }

    async fn record_retry(&self, id: MutationId) -> Result<u32, AppError> {
        let count: Option<i64> = sqlx::query_scalar(
            "UPDATE mutation_queue SET retry_count = retry_count + 1 WHERE id = ?1 RETURNING retry_count",
        )
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await?;

        let count = count.ok_or_else(|| {
            AppError::LocalStorage(format!("mutation {id} is no longer queued"))
        })?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn len(&self) -> Result<u32, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mutation_queue")
            .fetch_one(&self.pool)
            .await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn load_attachment(&self, digest: &str) -> Result<Option<Bytes>, AppError> {
        let bytes: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT bytes FROM attachment_blobs WHERE digest = ?1")
                .bind(digest)
                .fetch_optional(&self.pool)
                .await?;
        Ok(bytes.map(Bytes::from))
    }
}
