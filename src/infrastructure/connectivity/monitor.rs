use crate::application::ports::ResyncScheduler;
use crate::application::services::BackgroundReplayer;
use std::sync::Arc;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;

/// Tracks the host's connectivity signal and runs the replayer when it
/// matters: at start-up when online, on every offline to online transition,
/// and when a resync is requested while online.
pub struct ConnectivityMonitor {
    online: watch::Sender<bool>,
    resync: Notify,
    shutdown: Notify,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Arc<Self> {
        let (online, _) = watch::channel(initially_online);
        Arc::new(Self {
            online,
            resync: Notify::new(),
            shutdown: Notify::new(),
        })
    }

    pub fn set_online(&self, online: bool) {
        let previous = self.online.send_replace(online);
        if previous != online {
            tracing::info!(
                target: "sync::connectivity",
                online,
                "connectivity changed"
            );
        }
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    pub fn request_resync(&self) {
        self.resync.notify_one();
    }

    /// Stops the drain loop once the current drain, if any, has finished.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    pub fn spawn(self: &Arc<Self>, replayer: Arc<BackgroundReplayer>) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move { monitor.run(replayer).await })
    }

    async fn run(&self, replayer: Arc<BackgroundReplayer>) {
        let mut online = self.online.subscribe();
        if *online.borrow_and_update() {
            drain(&replayer, "startup").await;
        }

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => break,
                changed = online.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if *online.borrow_and_update() {
                        drain(&replayer, "connectivity restored").await;
                    }
                }
                _ = self.resync.notified() => {
                    if self.is_online() {
                        drain(&replayer, "resync requested").await;
                    } else {
                        tracing::debug!(
                            target: "sync::connectivity",
                            "resync deferred until connectivity returns"
                        );
                    }
                }
            }
        }
        tracing::debug!(target: "sync::connectivity", "connectivity monitor stopped");
    }
}

impl ResyncScheduler for ConnectivityMonitor {
    fn schedule_resync(&self) {
        self.request_resync();
    }
}

async fn drain(replayer: &BackgroundReplayer, cause: &'static str) {
    match replayer.drain().await {
        Ok(report) => tracing::debug!(
            target: "sync::connectivity",
            cause,
            replayed = report.replayed,
            remaining = report.remaining,
            "drain completed"
        ),
        Err(err) => tracing::error!(
            target: "sync::connectivity",
            cause,
            error = %err,
            "drain failed"
        ),
    }
}
