use super::rows::{MutationRow, SnapshotRow};
use crate::domain::entities::{QueuedMutation, SnapshotEntry, SnapshotOrigin};
use crate::domain::value_objects::{
    AuthContext, EntityId, MutationBody, MutationId, MutationMethod, ResourceUrl,
};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use std::str::FromStr;

pub(crate) fn timestamp_from_millis(millis: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| AppError::LocalStorage(format!("invalid stored timestamp: {millis}")))
}

pub(crate) fn mutation_from_row(row: MutationRow) -> Result<QueuedMutation, AppError> {
    let id = MutationId::new(row.id).map_err(AppError::LocalStorage)?;
    let target_url = ResourceUrl::parse(&row.target_url).map_err(AppError::LocalStorage)?;
    let method = MutationMethod::from_str(&row.method).map_err(AppError::LocalStorage)?;
    let body = row
        .body
        .as_deref()
        .map(serde_json::from_str::<MutationBody>)
        .transpose()?;
    let auth_context = row
        .auth_context
        .map(AuthContext::new)
        .transpose()
        .map_err(AppError::LocalStorage)?;
    let entity_id = row
        .entity_id
        .map(EntityId::new)
        .transpose()
        .map_err(AppError::LocalStorage)?;

    Ok(QueuedMutation {
        id,
        target_url,
        method,
        body,
        auth_context,
        entity_id,
        enqueued_at: timestamp_from_millis(row.enqueued_at)?,
        retry_count: u32::try_from(row.retry_count).unwrap_or(0),
    })
}

pub(crate) fn snapshot_from_row(row: SnapshotRow) -> Result<SnapshotEntry, AppError> {
    Ok(SnapshotEntry {
        url: ResourceUrl::parse(&row.url).map_err(AppError::LocalStorage)?,
        body: serde_json::from_str(&row.body)?,
        origin: SnapshotOrigin::from_str(&row.origin).map_err(AppError::LocalStorage)?,
        is_stale: row.is_stale,
        refreshed_at: timestamp_from_millis(row.refreshed_at)?,
    })
}
