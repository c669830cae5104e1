use crate::domain::entities::{DiscardedMutation, ReplayReport};

/// Best-effort local notifications towards the UI.
pub trait SyncNotifier: Send + Sync {
    fn mutation_discarded(&self, discarded: &DiscardedMutation) -> Result<(), String>;
    fn drain_finished(&self, report: &ReplayReport) -> Result<(), String>;
}

/// Asks for a replay once connectivity allows it.
pub trait ResyncScheduler: Send + Sync {
    fn schedule_resync(&self);
}
