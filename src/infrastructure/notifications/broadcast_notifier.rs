use crate::application::ports::SyncNotifier;
use crate::domain::entities::{DiscardedMutation, ReplayReport};
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum SyncEvent {
    MutationDiscarded(DiscardedMutation),
    DrainFinished(ReplayReport),
}

/// Fans sync events out to any number of UI subscribers. Events sent while
/// nobody is subscribed are dropped.
pub struct BroadcastNotifier {
    sender: broadcast::Sender<SyncEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    fn publish(&self, event: SyncEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!(target: "sync::events", "no subscribers for sync event");
        }
    }
}

impl SyncNotifier for BroadcastNotifier {
    fn mutation_discarded(&self, discarded: &DiscardedMutation) -> Result<(), String> {
        self.publish(SyncEvent::MutationDiscarded(discarded.clone()));
        Ok(())
    }

    fn drain_finished(&self, report: &ReplayReport) -> Result<(), String> {
        self.publish(SyncEvent::DrainFinished(report.clone()));
        Ok(())
    }
}
