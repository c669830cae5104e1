//! Folding a single write into every cached snapshot that contains its entity.

use crate::application::ports::SnapshotCache;
use crate::domain::entities::SnapshotOrigin;
use crate::domain::overlay::LocalEffect;
use crate::domain::value_objects::{MutationMethod, ResourceUrl};
use crate::shared::error::AppError;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldMode {
    /// The write is queued; a created entity gets an injected placeholder.
    Optimistic,
    /// The server accepted the write; the entity's own snapshot becomes server data.
    Confirmed,
}

/// Applies `method`/`body` at `entity_path` to every cached ancestor and to the
/// entity's own snapshot. Cached bodies never carry the offline tag; the
/// overlay adds it on read from the pending queue.
pub async fn fold_into_cache(
    cache: &dyn SnapshotCache,
    method: MutationMethod,
    entity_path: &ResourceUrl,
    body: Option<&Value>,
    mode: FoldMode,
) -> Result<(), AppError> {
    let effect = LocalEffect {
        method,
        body,
        tag: false,
    };

    for ancestor in entity_path.lineage() {
        let Some(rel) = entity_path.relative_to(&ancestor) else {
            continue;
        };
        if rel.is_empty() {
            fold_own_snapshot(cache, &effect, entity_path, mode).await?;
        } else {
            cache
                .mutate(&ancestor, &|value: &mut Value| effect.apply_to_value(value, rel))
                .await?;
        }
    }
    Ok(())
}

async fn fold_own_snapshot(
    cache: &dyn SnapshotCache,
    effect: &LocalEffect<'_>,
    entity_path: &ResourceUrl,
    mode: FoldMode,
) -> Result<(), AppError> {
    if effect.method == MutationMethod::Delete {
        cache.remove(entity_path).await?;
        return Ok(());
    }

    let existing = cache.get(entity_path).await?;
    match (mode, existing) {
        (FoldMode::Optimistic, None) => {
            if effect.method == MutationMethod::Create
                && let Some(body) = effect.body
            {
                cache
                    .put(entity_path, body, SnapshotOrigin::Injected)
                    .await?;
            }
        }
        (FoldMode::Optimistic, Some(_)) => {
            cache
                .mutate(entity_path, &|value: &mut Value| {
                    effect.apply_to_value(value, &[])
                })
                .await?;
        }
        (FoldMode::Confirmed, Some(entry)) => {
            let mut value = entry.body;
            effect.apply_to_value(&mut value, &[]);
            cache.put(entity_path, &value, SnapshotOrigin::Server).await?;
        }
        (FoldMode::Confirmed, None) => {}
    }
    Ok(())
}
