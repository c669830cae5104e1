pub mod id_remap;
pub mod overlay_view;
pub mod queued_mutation;
pub mod replay_report;
pub mod snapshot_entry;

pub use id_remap::IdRemap;
pub use overlay_view::OverlayView;
pub use queued_mutation::{MutationDraft, QueuedMutation};
pub use replay_report::{DiscardReason, DiscardedMutation, ReplayReport, StopReason};
pub use snapshot_entry::{SnapshotEntry, SnapshotOrigin};
