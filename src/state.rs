use crate::application::ports::{AuthProvider, SyncNotifier, Transport};
use crate::application::services::{
    BackgroundReplayer, InFlightMutation, ReadOutcome, ReplayPolicy, RequestInterceptor,
    SyncStores, WriteOutcome,
};
use crate::domain::entities::ReplayReport;
use crate::domain::value_objects::{MutationMethod, RequestBody};
use crate::infrastructure::connectivity::ConnectivityMonitor;
use crate::infrastructure::database::ConnectionPool;
use crate::infrastructure::notifications::{BroadcastNotifier, SyncEvent};
use crate::infrastructure::offline::{
    SqliteIdRemapStore, SqliteMutationQueue, SqliteSnapshotCache,
};
use crate::infrastructure::transport::ReqwestTransport;
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use anyhow::Context;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;

const EVENT_CAPACITY: usize = 64;

/// Wires the stores, the interceptor, the replayer and the connectivity loop
/// together over one SQLite database.
pub struct SyncEngine {
    config: AppConfig,
    pool: ConnectionPool,
    stores: SyncStores,
    interceptor: Arc<RequestInterceptor>,
    replayer: Arc<BackgroundReplayer>,
    monitor: Arc<ConnectivityMonitor>,
    notifier: Arc<BroadcastNotifier>,
    monitor_task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncEngine {
    /// Opens the engine against the HTTP API named in `config.network`.
    pub async fn open(config: AppConfig, auth: Arc<dyn AuthProvider>) -> anyhow::Result<Self> {
        let transport =
            ReqwestTransport::new(&config.network).context("failed to create HTTP transport")?;
        Self::with_transport(config, Arc::new(transport), auth).await
    }

    pub async fn with_transport(
        config: AppConfig,
        transport: Arc<dyn Transport>,
        auth: Arc<dyn AuthProvider>,
    ) -> anyhow::Result<Self> {
        config
            .validate()
            .map_err(anyhow::Error::msg)
            .context("invalid sync configuration")?;

        let pool = ConnectionPool::connect(&config.database)
            .await
            .context("failed to open sync database")?;
        pool.migrate()
            .await
            .context("failed to apply sync database migrations")?;

        let sqlite = pool.get_pool().clone();
        let stores = SyncStores::new(
            Arc::new(SqliteMutationQueue::new(sqlite.clone())),
            Arc::new(SqliteSnapshotCache::new(sqlite.clone())),
            Arc::new(SqliteIdRemapStore::new(sqlite)),
        );

        let in_flight = Arc::new(InFlightMutation::new());
        let notifier = Arc::new(BroadcastNotifier::new(EVENT_CAPACITY));
        let monitor = ConnectivityMonitor::new(true);

        let replayer = BackgroundReplayer::new(
            Arc::clone(&transport),
            stores.clone(),
            Arc::clone(&auth),
            Arc::clone(&in_flight),
            ReplayPolicy::from(&config.sync),
            Some(notifier.clone() as Arc<dyn SyncNotifier>),
        );
        let interceptor = Arc::new(RequestInterceptor::new(
            transport,
            stores.clone(),
            auth,
            monitor.clone(),
            in_flight,
        ));

        let monitor_task = if config.sync.auto_sync {
            Some(monitor.spawn(Arc::clone(&replayer)))
        } else {
            None
        };

        tracing::info!(
            target: "sync::engine",
            base_url = %config.network.base_url,
            auto_sync = config.sync.auto_sync,
            "sync engine ready"
        );

        Ok(Self {
            config,
            pool,
            stores,
            interceptor,
            replayer,
            monitor,
            notifier,
            monitor_task: Mutex::new(monitor_task),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn interceptor(&self) -> Arc<RequestInterceptor> {
        Arc::clone(&self.interceptor)
    }

    pub async fn read(&self, url: &str) -> Result<ReadOutcome, AppError> {
        self.interceptor.read(url).await
    }

    pub async fn write(
        &self,
        method: MutationMethod,
        url: &str,
        body: Option<RequestBody>,
    ) -> Result<WriteOutcome, AppError> {
        self.interceptor.write(method, url, body).await
    }

    /// Host connectivity signal. Going online starts a drain.
    pub fn set_online(&self, online: bool) {
        self.monitor.set_online(online);
    }

    pub fn is_online(&self) -> bool {
        self.monitor.is_online()
    }

    pub fn request_resync(&self) {
        self.monitor.request_resync();
    }

    /// Drains the queue now, independent of the connectivity loop.
    pub async fn sync_now(&self) -> Result<ReplayReport, AppError> {
        self.replayer.drain().await
    }

    pub async fn pending_mutations(&self) -> Result<u32, AppError> {
        self.stores.queue.len().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.notifier.subscribe()
    }

    /// Stops the connectivity loop after any running drain and closes the pool.
    pub async fn shutdown(&self) {
        self.monitor.shutdown();
        if let Some(task) = self.monitor_task.lock().await.take()
            && let Err(err) = task.await
        {
            tracing::warn!(
                target: "sync::engine",
                error = %err,
                "connectivity task ended abnormally"
            );
        }
        self.pool.close().await;
    }
}
