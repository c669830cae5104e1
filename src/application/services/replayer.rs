use super::cache_sync::{FoldMode, fold_into_cache};
use super::in_flight::InFlightMutation;
use super::sync_stores::SyncStores;
use crate::application::ports::{
    AuthProvider, OutboundRequest, SyncNotifier, Transport, TransportResponse,
};
use crate::domain::entities::{
    DiscardReason, DiscardedMutation, IdRemap, QueuedMutation, ReplayReport, StopReason,
};
use crate::domain::overlay;
use crate::domain::value_objects::{
    Attachment, EntityId, MutationBody, MutationMethod, RequestBody, ResourceUrl,
};
use crate::shared::config::SyncConfig;
use crate::shared::error::AppError;
use chrono::{Duration, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayPolicy {
    /// Entries older than this are discarded without being sent.
    pub expiry: Duration,
    /// Entries whose retry count reached this are discarded.
    pub max_retries: u32,
}

impl Default for ReplayPolicy {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for ReplayPolicy {
    fn from(config: &SyncConfig) -> Self {
        Self {
            expiry: config.expiry(),
            max_retries: config.max_retries,
        }
    }
}

enum ReplayStep {
    Applied,
    Discarded(DiscardedMutation),
    Stop(StopReason),
}

enum PreparedBody {
    Ready(Option<RequestBody>),
    MissingAttachment(String),
}

/// Drains the mutation queue against the server, oldest entry first.
pub struct BackgroundReplayer {
    transport: Arc<dyn Transport>,
    stores: SyncStores,
    auth: Arc<dyn AuthProvider>,
    in_flight: Arc<InFlightMutation>,
    policy: ReplayPolicy,
    notifier: Option<Arc<dyn SyncNotifier>>,
    gate: Mutex<()>,
    rerun: AtomicBool,
}

impl BackgroundReplayer {
    pub fn new(
        transport: Arc<dyn Transport>,
        stores: SyncStores,
        auth: Arc<dyn AuthProvider>,
        in_flight: Arc<InFlightMutation>,
        policy: ReplayPolicy,
        notifier: Option<Arc<dyn SyncNotifier>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport,
            stores,
            auth,
            in_flight,
            policy,
            notifier,
            gate: Mutex::new(()),
            rerun: AtomicBool::new(false),
        })
    }

    pub fn trigger(self: &Arc<Self>) {
        let job = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = job.drain().await {
                tracing::error!(
                    target: "sync::replay",
                    error = %err,
                    "replay drain failed"
                );
            }
        });
    }

    /// Replays queued mutations until the queue is empty or a transient
    /// failure stops the drain. Only one drain runs at a time; a call made
    /// while another is running returns immediately and makes the running
    /// drain take one more pass before it goes idle.
    pub async fn drain(&self) -> Result<ReplayReport, AppError> {
        let mut report = self.drain_gated().await?;

        // A request can land after the last pass but before the gate opened.
        while report.stopped.is_none() && self.rerun.load(Ordering::SeqCst) {
            let follow_up = self.drain_gated().await?;
            if follow_up.stopped == Some(StopReason::AlreadyRunning) {
                break;
            }
            report.replayed += follow_up.replayed;
            report.discarded.extend(follow_up.discarded);
            report.remaining = follow_up.remaining;
            report.stopped = follow_up.stopped;
        }
        Ok(report)
    }

    async fn drain_gated(&self) -> Result<ReplayReport, AppError> {
        let Ok(guard) = self.gate.try_lock() else {
            self.rerun.store(true, Ordering::SeqCst);
            tracing::debug!(target: "sync::replay", "drain already running");
            return Ok(ReplayReport::already_running());
        };

        let mut report = ReplayReport::default();
        loop {
            self.rerun.store(false, Ordering::SeqCst);
            if let Some(reason) = self.drain_pass(&mut report).await? {
                report.stopped = Some(reason);
                break;
            }
            if !self.rerun.swap(false, Ordering::SeqCst) {
                break;
            }
        }
        report.remaining = self.stores.queue.len().await?;
        drop(guard);

        self.emit_finished(&report);
        Ok(report)
    }

    async fn drain_pass(&self, report: &mut ReplayReport) -> Result<Option<StopReason>, AppError> {
        loop {
            let remap = self.stores.remap.load().await?;

            let mut claim = self.in_flight.lock().await;
            let Some(entry) = self.stores.queue.oldest().await? else {
                return Ok(None);
            };

            if entry.is_expired(Utc::now(), self.policy.expiry) {
                drop(claim);
                let discarded = self.discard(&entry, DiscardReason::Expired, &remap).await?;
                report.discarded.push(discarded);
                continue;
            }
            if entry.retry_count >= self.policy.max_retries {
                drop(claim);
                let reason = DiscardReason::RetryLimitReached {
                    retry_count: entry.retry_count,
                };
                let discarded = self.discard(&entry, reason, &remap).await?;
                report.discarded.push(discarded);
                continue;
            }

            *claim = Some(entry.id);
            drop(claim);

            let step = self.replay_one(&entry, &remap).await;
            self.in_flight.clear().await;

            match step? {
                ReplayStep::Applied => report.replayed += 1,
                ReplayStep::Discarded(discarded) => report.discarded.push(discarded),
                ReplayStep::Stop(reason) => return Ok(Some(reason)),
            }
        }
    }

    async fn replay_one(
        &self,
        entry: &QueuedMutation,
        remap: &IdRemap,
    ) -> Result<ReplayStep, AppError> {
        let url = remap.rewrite_url(&entry.target_url);
        let body = match self.prepare_body(entry, remap).await? {
            PreparedBody::Ready(body) => body,
            PreparedBody::MissingAttachment(digest) => {
                let reason = DiscardReason::MissingAttachment { digest };
                return Ok(ReplayStep::Discarded(
                    self.discard(entry, reason, remap).await?,
                ));
            }
        };

        let mut request = OutboundRequest {
            method: entry.method.http_method(),
            url: url.clone(),
            body,
            auth: entry.auth_context.clone(),
        };

        let Ok(mut response) = self.transport.send(&request).await else {
            tracing::info!(
                target: "sync::replay",
                id = %entry.id,
                "no response, stopping drain"
            );
            return Ok(ReplayStep::Stop(StopReason::ConnectivityAbsent));
        };

        if response.status == 401
            && let Some(current) = self.auth.current().await
            && request.auth.as_ref() != Some(&current)
        {
            tracing::debug!(
                target: "sync::replay",
                id = %entry.id,
                "stored credential rejected, retrying with current session"
            );
            request.auth = Some(current);
            response = match self.transport.send(&request).await {
                Ok(response) => response,
                Err(_) => return Ok(ReplayStep::Stop(StopReason::ConnectivityAbsent)),
            };
        }

        let already_gone = entry.method == MutationMethod::Delete && response.status == 404;
        if response.is_success() || already_gone {
            self.confirm(entry, &url, &response, remap).await?;
            return Ok(ReplayStep::Applied);
        }

        if response.is_server_error() {
            let retry_count = self.stores.queue.record_retry(entry.id).await?;
            tracing::warn!(
                target: "sync::replay",
                id = %entry.id,
                status = response.status,
                retry_count,
                "server fault, stopping drain"
            );
            return Ok(ReplayStep::Stop(StopReason::ServerFault {
                status: response.status,
            }));
        }

        let reason = DiscardReason::Rejected {
            status: response.status,
            body: response.body,
        };
        Ok(ReplayStep::Discarded(
            self.discard(entry, reason, remap).await?,
        ))
    }

    async fn prepare_body(
        &self,
        entry: &QueuedMutation,
        remap: &IdRemap,
    ) -> Result<PreparedBody, AppError> {
        match &entry.body {
            None => Ok(PreparedBody::Ready(None)),
            Some(MutationBody::Json(value)) => {
                let mut value = value.clone();
                remap.rewrite_body(&mut value);
                Ok(PreparedBody::Ready(Some(RequestBody::Json(value))))
            }
            Some(MutationBody::Attachment(reference)) => {
                match self.stores.queue.load_attachment(&reference.digest).await? {
                    Some(bytes) => Ok(PreparedBody::Ready(Some(RequestBody::Attachment(
                        Attachment {
                            name: reference.name.clone(),
                            media_type: reference.media_type.clone(),
                            bytes,
                        },
                    )))),
                    None => Ok(PreparedBody::MissingAttachment(reference.digest.clone())),
                }
            }
        }
    }

    async fn confirm(
        &self,
        entry: &QueuedMutation,
        url: &ResourceUrl,
        response: &TransportResponse,
        remap: &IdRemap,
    ) -> Result<(), AppError> {
        let mut entity_path = remap.rewrite_url(&entry.entity_path());

        if entry.is_create()
            && let Some(local_id) = &entry.entity_id
            && let Some(remote) = response.body.get("id").and_then(overlay::id_string)
            && remote != remap.resolve(local_id.as_str())
            && let Ok(remote_id) = EntityId::new(remote)
        {
            self.stores.remap.record(local_id, &remote_id).await?;
            let confirmed_path = url.without_query().child(remote_id.as_str());
            self.stores
                .cache
                .rename(&entity_path, &confirmed_path)
                .await?;
            fold_into_cache(
                self.stores.cache.as_ref(),
                MutationMethod::Delete,
                &entity_path,
                None,
                FoldMode::Confirmed,
            )
            .await?;
            entity_path = confirmed_path;
        }

        let confirmed = if response.body.is_object() {
            Some(response.body.clone())
        } else {
            overlay::local_body(entry, remap)
        };
        fold_into_cache(
            self.stores.cache.as_ref(),
            entry.method,
            &entity_path,
            confirmed.as_ref(),
            FoldMode::Confirmed,
        )
        .await?;

        self.stores.queue.remove(entry.id).await?;
        tracing::info!(
            target: "sync::replay",
            id = %entry.id,
            method = %entry.method,
            url = %url,
            status = response.status,
            "mutation replayed"
        );
        Ok(())
    }

    /// Drops an entry the server will never accept and undoes its optimistic
    /// effect as far as the cache allows.
    async fn discard(
        &self,
        entry: &QueuedMutation,
        reason: DiscardReason,
        remap: &IdRemap,
    ) -> Result<DiscardedMutation, AppError> {
        self.stores.queue.remove(entry.id).await?;

        let entity_path = remap.rewrite_url(&entry.entity_path());
        if entry.is_create() {
            fold_into_cache(
                self.stores.cache.as_ref(),
                MutationMethod::Delete,
                &entity_path,
                None,
                FoldMode::Confirmed,
            )
            .await?;
        } else {
            for ancestor in entity_path.lineage() {
                self.stores.cache.mark_stale(&ancestor).await?;
            }
        }

        let discarded = DiscardedMutation {
            id: entry.id,
            target_url: entry.target_url.clone(),
            method: entry.method,
            reason,
        };
        tracing::warn!(
            target: "sync::replay",
            id = %entry.id,
            method = %entry.method,
            url = %entry.target_url,
            reason = ?discarded.reason,
            "mutation discarded"
        );
        self.emit_discarded(&discarded);
        Ok(discarded)
    }

    fn emit_discarded(&self, discarded: &DiscardedMutation) {
        if let Some(notifier) = &self.notifier
            && let Err(err) = notifier.mutation_discarded(discarded)
        {
            tracing::warn!(
                target: "sync::replay",
                error = %err,
                "failed to emit discard notification"
            );
        }
    }

    fn emit_finished(&self, report: &ReplayReport) {
        if let Some(notifier) = &self.notifier
            && let Err(err) = notifier.drain_finished(report)
        {
            tracing::warn!(
                target: "sync::replay",
                error = %err,
                "failed to emit drain report"
            );
        }
        tracing::info!(
            target: "sync::replay",
            replayed = report.replayed,
            discarded = report.discarded.len(),
            remaining = report.remaining,
            stopped = ?report.stopped,
            "replay drain finished"
        );
    }
}
