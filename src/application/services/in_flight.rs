use crate::domain::value_objects::MutationId;
use tokio::sync::{Mutex, MutexGuard};

/// The queue entry the replayer is currently sending, if any.
///
/// The replayer claims an entry under this lock before it issues the request;
/// compaction checks it under the same lock before removing queue entries.
#[derive(Debug, Default)]
pub struct InFlightMutation {
    current: Mutex<Option<MutationId>>,
}

impl InFlightMutation {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self) -> MutexGuard<'_, Option<MutationId>> {
        self.current.lock().await
    }

    pub async fn clear(&self) {
        *self.current.lock().await = None;
    }

    pub async fn current(&self) -> Option<MutationId> {
        *self.current.lock().await
    }
}
