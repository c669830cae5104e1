use super::in_flight::InFlightMutation;
use super::sync_stores::SyncStores;
use crate::application::ports::{
    AuthProvider, OutboundRequest, ResyncScheduler, SnapshotCache, SnapshotMutator,
    SyncNotifier, Transport, TransportError, TransportResponse,
};
use crate::domain::entities::{DiscardedMutation, ReplayReport, SnapshotEntry, SnapshotOrigin};
use crate::domain::value_objects::{AuthContext, ResourceUrl};
use crate::infrastructure::database::ConnectionPool;
use crate::infrastructure::offline::{
    SqliteIdRemapStore, SqliteMutationQueue, SqliteSnapshotCache,
};
use crate::shared::error::AppError;
use async_trait::async_trait;
use mockall::mock;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

mock! {
    pub Auth {}

    #[async_trait]
    impl AuthProvider for Auth {
        async fn current(&self) -> Option<AuthContext>;
        async fn refresh(&self) -> Result<AuthContext, AppError>;
    }
}

pub fn token(value: &str) -> AuthContext {
    AuthContext::new(value.to_string()).unwrap()
}

/// Auth collaborator with a fixed credential that cannot be refreshed.
pub fn static_auth(value: &str) -> Arc<dyn AuthProvider> {
    let context = token(value);
    let mut auth = MockAuth::new();
    auth.expect_current().returning(move || Some(context.clone()));
    auth.expect_refresh()
        .returning(|| Err(AppError::SessionExpired));
    Arc::new(auth)
}

/// Answers requests from a script; an exhausted script means the network is down.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    sent: Mutex<Vec<OutboundRequest>>,
}

impl ScriptedTransport {
    pub fn respond(&self, status: u16, body: Value) {
        self.script
            .lock()
            .unwrap()
            .push_back(Ok(TransportResponse::new(status, body)));
    }

    pub fn fail(&self) {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(TransportError::Unreachable("connection refused".into())));
    }

    pub fn sent(&self) -> Vec<OutboundRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<TransportResponse, TransportError> {
        self.sent.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Unreachable("offline".into())))
    }
}

#[derive(Default)]
pub struct CountingResync {
    requests: AtomicUsize,
}

impl CountingResync {
    pub fn count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl ResyncScheduler for CountingResync {
    fn schedule_resync(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Cache whose every write fails, as when the disk is full.
pub struct BrokenCache;

fn disk_full() -> AppError {
    AppError::LocalStorage("database or disk is full".into())
}

#[async_trait]
impl SnapshotCache for BrokenCache {
    async fn get(&self, _url: &ResourceUrl) -> Result<Option<SnapshotEntry>, AppError> {
        Ok(None)
    }

    async fn put(
        &self,
        _url: &ResourceUrl,
        _body: &Value,
        _origin: SnapshotOrigin,
    ) -> Result<(), AppError> {
        Err(disk_full())
    }

    async fn mutate(
        &self,
        _url: &ResourceUrl,
        _mutator: SnapshotMutator<'_>,
    ) -> Result<Option<SnapshotEntry>, AppError> {
        Err(disk_full())
    }

    async fn rename(&self, _from: &ResourceUrl, _to: &ResourceUrl) -> Result<bool, AppError> {
        Err(disk_full())
    }

    async fn mark_stale(&self, _url: &ResourceUrl) -> Result<bool, AppError> {
        Err(disk_full())
    }

    async fn remove(&self, _url: &ResourceUrl) -> Result<bool, AppError> {
        Err(disk_full())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub discarded: Mutex<Vec<DiscardedMutation>>,
    pub reports: Mutex<Vec<ReplayReport>>,
}

impl SyncNotifier for RecordingNotifier {
    fn mutation_discarded(&self, discarded: &DiscardedMutation) -> Result<(), String> {
        self.discarded.lock().unwrap().push(discarded.clone());
        Ok(())
    }

    fn drain_finished(&self, report: &ReplayReport) -> Result<(), String> {
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}

pub struct Harness {
    pub pool: ConnectionPool,
    pub stores: SyncStores,
    pub transport: Arc<ScriptedTransport>,
    pub resync: Arc<CountingResync>,
    pub in_flight: Arc<InFlightMutation>,
}

impl Harness {
    /// Same stores, with the snapshot cache swapped for [`BrokenCache`].
    pub fn with_broken_cache(&self) -> SyncStores {
        SyncStores::new(
            self.stores.queue.clone(),
            Arc::new(BrokenCache),
            self.stores.remap.clone(),
        )
    }

    pub async fn new() -> Self {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.migrate().await.unwrap();
        let sqlite = pool.get_pool().clone();
        let stores = SyncStores::new(
            Arc::new(SqliteMutationQueue::new(sqlite.clone())),
            Arc::new(SqliteSnapshotCache::new(sqlite.clone())),
            Arc::new(SqliteIdRemapStore::new(sqlite)),
        );

        Self {
            pool,
            stores,
            transport: Arc::new(ScriptedTransport::default()),
            resync: Arc::new(CountingResync::default()),
            in_flight: Arc::new(InFlightMutation::new()),
        }
    }
}
