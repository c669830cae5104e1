use crate::domain::value_objects::{MutationId, ResourceUrl};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Snapshot with pending local writes folded in. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayView {
    pub url: ResourceUrl,
    /// `None` when a pending delete removed the resource itself.
    pub body: Option<Value>,
    /// Pending mutations that changed this view, in queue order.
    pub applied: Vec<MutationId>,
}

impl OverlayView {
    pub fn has_unsynced_changes(&self) -> bool {
        !self.applied.is_empty()
    }

    pub fn is_deleted(&self) -> bool {
        self.body.is_none()
    }
}
