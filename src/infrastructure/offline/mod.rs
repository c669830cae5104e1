mod mappers;
pub mod rows;
pub mod sqlite_id_remap;
pub mod sqlite_queue;
pub mod sqlite_snapshot_cache;

pub use sqlite_id_remap::SqliteIdRemapStore;
pub use sqlite_queue::SqliteMutationQueue;
pub use sqlite_snapshot_cache::SqliteSnapshotCache;
