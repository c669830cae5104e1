//! Offline-first synchronization for a task-board client.
//!
//! [`SyncEngine`] sits between the UI and the HTTP API. Reads fall back to
//! cached snapshots merged with pending writes; writes that cannot reach the
//! server are queued durably and replayed in order once connectivity returns.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;
mod state;

pub use application::ports::{
    AuthProvider, OutboundRequest, Transport, TransportError, TransportResponse,
};
pub use application::services::{ReadOutcome, ReadSource, WriteDisposition, WriteOutcome};
pub use domain::entities::{DiscardReason, DiscardedMutation, OverlayView, ReplayReport, StopReason};
pub use domain::value_objects::{Attachment, AuthContext, MutationMethod, RequestBody};
pub use infrastructure::notifications::SyncEvent;
pub use shared::config::AppConfig;
pub use shared::error::{AppError, Result};
pub use state::SyncEngine;
