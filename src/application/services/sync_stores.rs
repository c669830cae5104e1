use crate::application::ports::{IdRemapStore, MutationQueue, SnapshotCache};
use std::sync::Arc;

/// Local persistence shared by the interceptor and the replayer.
#[derive(Clone)]
pub struct SyncStores {
    pub queue: Arc<dyn MutationQueue>,
    pub cache: Arc<dyn SnapshotCache>,
    pub remap: Arc<dyn IdRemapStore>,
}

impl SyncStores {
    pub fn new(
        queue: Arc<dyn MutationQueue>,
        cache: Arc<dyn SnapshotCache>,
        remap: Arc<dyn IdRemapStore>,
    ) -> Self {
        Self {
            queue,
            cache,
            remap,
        }
    }
}
