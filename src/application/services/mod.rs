pub mod cache_sync;
pub mod in_flight;
pub mod interceptor;
pub mod replayer;
pub mod sync_stores;

#[cfg(test)]
pub(crate) mod test_support;

pub use in_flight::InFlightMutation;
pub use interceptor::{ReadOutcome, ReadSource, RequestInterceptor, WriteDisposition, WriteOutcome};
pub use replayer::{BackgroundReplayer, ReplayPolicy};
pub use sync_stores::SyncStores;
