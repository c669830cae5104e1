use crate::domain::value_objects::{MutationId, MutationMethod, ResourceUrl};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DiscardReason {
    Rejected { status: u16, body: Value },
    RetryLimitReached { retry_count: u32 },
    Expired,
    /// The queued attachment bytes could not be found.
    MissingAttachment { digest: String },
}

/// A queued write that was dropped without being applied by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscardedMutation {
    pub id: MutationId,
    pub target_url: ResourceUrl,
    pub method: MutationMethod,
    pub reason: DiscardReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    ConnectivityAbsent,
    ServerFault { status: u16 },
    AlreadyRunning,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub replayed: u32,
    pub discarded: Vec<DiscardedMutation>,
    pub remaining: u32,
    pub stopped: Option<StopReason>,
}

impl ReplayReport {
    pub fn already_running() -> Self {
        Self {
            stopped: Some(StopReason::AlreadyRunning),
            ..Self::default()
        }
    }

    pub fn is_drained(&self) -> bool {
        self.stopped.is_none() && self.remaining == 0
    }

    pub fn rejected_count(&self) -> usize {
        self.discarded
            .iter()
            .filter(|item| matches!(item.reason, DiscardReason::Rejected { .. }))
            .count()
    }

    pub fn expired_count(&self) -> usize {
        self.discarded
            .iter()
            .filter(|item| item.reason == DiscardReason::Expired)
            .count()
    }
}
