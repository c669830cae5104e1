pub mod auth;
pub mod id_remap;
pub mod mutation_queue;
pub mod notifier;
pub mod snapshot_cache;
pub mod transport;

pub use auth::AuthProvider;
pub use id_remap::IdRemapStore;
pub use mutation_queue::MutationQueue;
pub use notifier::{ResyncScheduler, SyncNotifier};
pub use snapshot_cache::{SnapshotCache, SnapshotMutator};
pub use transport::{OutboundRequest, Transport, TransportError, TransportResponse};
