//! Offline-aware front door for every API call the UI makes.
//!
//! Reads go to the network first and fall back to cached snapshots merged with
//! the pending queue. Writes go to the network first and are queued (with an
//! optimistic cache update and a synthesized success) when no response arrives
//! or the server faults.

use super::cache_sync::{FoldMode, fold_into_cache};
use super::in_flight::InFlightMutation;
use super::sync_stores::SyncStores;
use crate::application::ports::{
    AuthProvider, OutboundRequest, ResyncScheduler, Transport, TransportResponse,
};
use crate::domain::entities::{IdRemap, MutationDraft, OverlayView, SnapshotOrigin};
use crate::domain::overlay::{self, OFFLINE_FLAG};
use crate::domain::value_objects::{
    EntityId, HttpMethod, MutationBody, MutationId, MutationMethod, RequestBody, ResourceUrl,
};
use crate::shared::error::AppError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadSource {
    Network,
    Local,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadOutcome {
    pub view: OverlayView,
    pub source: ReadSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteDisposition {
    /// The server answered with a success status.
    Sent,
    /// Queued for replay under the given id.
    Queued(MutationId),
    /// A delete cancelled a still-pending create; these entries were dropped.
    Compacted(Vec<MutationId>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    pub status: u16,
    pub body: Value,
    pub disposition: WriteDisposition,
}

impl WriteOutcome {
    pub fn is_local(&self) -> bool {
        !matches!(self.disposition, WriteDisposition::Sent)
    }
}

enum Dispatch {
    Response(TransportResponse),
    Unreachable(String),
    SessionExpired,
}

pub struct RequestInterceptor {
    transport: Arc<dyn Transport>,
    stores: SyncStores,
    auth: Arc<dyn AuthProvider>,
    resync: Arc<dyn ResyncScheduler>,
    in_flight: Arc<InFlightMutation>,
}

impl RequestInterceptor {
    pub fn new(
        transport: Arc<dyn Transport>,
        stores: SyncStores,
        auth: Arc<dyn AuthProvider>,
        resync: Arc<dyn ResyncScheduler>,
        in_flight: Arc<InFlightMutation>,
    ) -> Self {
        Self {
            transport,
            stores,
            auth,
            resync,
            in_flight,
        }
    }

    pub async fn read(&self, url: &str) -> Result<ReadOutcome, AppError> {
        let requested = ResourceUrl::parse(url).map_err(AppError::InvalidInput)?;
        let remap = self.stores.remap.load().await?;
        let url = remap.rewrite_url(&requested);

        let mut request = OutboundRequest {
            method: HttpMethod::Get,
            url: url.clone(),
            body: None,
            auth: self.auth.current().await,
        };

        let response = match self.dispatch(&mut request).await? {
            Dispatch::Response(response) => response,
            Dispatch::Unreachable(reason) => {
                tracing::debug!(
                    target: "sync::interceptor",
                    url = %url,
                    reason = %reason,
                    "read served locally"
                );
                return self.read_local(&url, &remap).await;
            }
            Dispatch::SessionExpired => return Err(AppError::SessionExpired),
        };

        if response.is_success() {
            self.stores
                .cache
                .put(&url, &response.body, SnapshotOrigin::Server)
                .await?;
            let pending = self.stores.queue.list_all().await?;
            let view = overlay::overlay(&url, Some(response.body), &pending, &remap);
            return Ok(ReadOutcome {
                view,
                source: ReadSource::Network,
            });
        }

        if response.is_server_error() {
            tracing::warn!(
                target: "sync::interceptor",
                url = %url,
                status = response.status,
                "server fault on read, serving local data"
            );
            return self.read_local(&url, &remap).await;
        }

        if response.status == 404 && self.awaits_confirmation(&url, &remap).await? {
            return self.read_local(&url, &remap).await;
        }

        Err(AppError::DefinitiveRejection {
            status: response.status,
            body: response.body,
        })
    }

    pub async fn write(
        &self,
        method: MutationMethod,
        url: &str,
        body: Option<RequestBody>,
    ) -> Result<WriteOutcome, AppError> {
        let requested = ResourceUrl::parse(url).map_err(AppError::InvalidInput)?;
        let remap = self.stores.remap.load().await?;
        let target = remap.rewrite_url(&requested);

        let mut body = body;
        if let Some(RequestBody::Json(value)) = body.as_mut() {
            remap.rewrite_body(value);
        }
        let entity_id = match method {
            MutationMethod::Create => Some(assign_entity_id(body.as_mut())?),
            _ => None,
        };

        let mut draft = MutationDraft::new(target.clone(), method, body, self.auth.current().await);
        if let Some(entity_id) = entity_id {
            draft = draft.with_entity_id(entity_id);
        }
        let entity_path = draft.entity_path();

        let pending = self.stores.queue.list_all().await?;
        if let Some(blocking) = pending.iter().find(|mutation| {
            let other = remap.rewrite_url(&mutation.entity_path());
            other.is_within(&entity_path) || entity_path.is_within(&other)
        }) {
            tracing::debug!(
                target: "sync::interceptor",
                url = %target,
                blocking = %blocking.id,
                "write queued behind pending mutation"
            );
            return self.queue_write(draft, &remap).await;
        }

        let mut request = OutboundRequest {
            method: method.http_method(),
            url: target.clone(),
            body: draft.body.clone(),
            auth: draft.auth_context.clone(),
        };
        let dispatch = self.dispatch(&mut request).await?;
        draft.auth_context = request.auth;

        let response = match dispatch {
            Dispatch::Response(response) => response,
            Dispatch::Unreachable(reason) => {
                tracing::info!(
                    target: "sync::interceptor",
                    method = %method,
                    url = %target,
                    reason = %reason,
                    "no response, queueing write"
                );
                return self.queue_write(draft, &remap).await;
            }
            Dispatch::SessionExpired => return Err(AppError::SessionExpired),
        };

        if response.is_success() {
            self.fold_confirmed(&draft, &entity_path, &response).await?;
            return Ok(WriteOutcome {
                status: response.status,
                body: response.body,
                disposition: WriteDisposition::Sent,
            });
        }

        if response.is_server_error() {
            tracing::warn!(
                target: "sync::interceptor",
                method = %method,
                url = %target,
                status = response.status,
                "server fault, queueing write"
            );
            return self.queue_write(draft, &remap).await;
        }

        if response.status == 404 && self.awaits_confirmation(&target, &remap).await? {
            tracing::debug!(
                target: "sync::interceptor",
                url = %target,
                "parent not yet materialized, queueing write"
            );
            return self.queue_write(draft, &remap).await;
        }

        Err(AppError::DefinitiveRejection {
            status: response.status,
            body: response.body,
        })
    }

    /// Sends once, refreshing the credential and retrying once on 401.
    async fn dispatch(&self, request: &mut OutboundRequest) -> Result<Dispatch, AppError> {
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(err) => return Ok(Dispatch::Unreachable(err.to_string())),
        };
        if response.status != 401 {
            return Ok(Dispatch::Response(response));
        }

        match self.auth.refresh().await {
            Ok(context) => request.auth = Some(context),
            Err(AppError::ConnectivityAbsent(reason)) => {
                return Ok(Dispatch::Unreachable(reason));
            }
            Err(AppError::SessionExpired) => return Ok(Dispatch::SessionExpired),
            Err(err) => return Err(err),
        }

        tracing::debug!(
            target: "sync::interceptor",
            url = %request.url,
            "retrying with refreshed credential"
        );
        match self.transport.send(request).await {
            Ok(response) if response.status == 401 => Ok(Dispatch::SessionExpired),
            Ok(response) => Ok(Dispatch::Response(response)),
            Err(err) => Ok(Dispatch::Unreachable(err.to_string())),
        }
    }

    async fn read_local(&self, url: &ResourceUrl, remap: &IdRemap) -> Result<ReadOutcome, AppError> {
        let pending = self.stores.queue.list_all().await?;
        let view = match self.stores.cache.get(url).await? {
            Some(snapshot) => overlay::merge(&snapshot, &pending, remap),
            None => {
                let view = overlay::overlay(url, None, &pending, remap);
                if view.body.is_none() {
                    return Err(AppError::NoLocalData(url.to_string()));
                }
                view
            }
        };
        Ok(ReadOutcome {
            view,
            source: ReadSource::Local,
        })
    }

    /// Whether `url` or one of its ancestors exists only locally so far.
    async fn awaits_confirmation(&self, url: &ResourceUrl, remap: &IdRemap) -> Result<bool, AppError> {
        let pending = self.stores.queue.list_all().await?;
        for ancestor in url.lineage() {
            let pending_create = pending.iter().any(|mutation| {
                mutation.is_create() && remap.rewrite_url(&mutation.entity_path()) == ancestor
            });
            if pending_create {
                return Ok(true);
            }
            if self
                .stores
                .cache
                .get(&ancestor)
                .await?
                .is_some_and(|entry| entry.is_injected())
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn queue_write(
        &self,
        draft: MutationDraft,
        remap: &IdRemap,
    ) -> Result<WriteOutcome, AppError> {
        let method = draft.method;
        let entity_path = draft.entity_path();

        if method == MutationMethod::Delete
            && let Some(outcome) = self.compact(&entity_path, remap).await?
        {
            return Ok(outcome);
        }

        let local = optimistic_body(&draft);
        let id = self.stores.queue.enqueue(draft).await?;

        fold_into_cache(
            self.stores.cache.as_ref(),
            method,
            &entity_path,
            local.as_ref(),
            FoldMode::Optimistic,
        )
        .await?;
        self.resync.schedule_resync();

        Ok(WriteOutcome {
            status: if method == MutationMethod::Create { 201 } else { 200 },
            body: synthesize_response(&entity_path, local),
            disposition: WriteDisposition::Queued(id),
        })
    }

    /// Drops a still-pending create of `entity_path` together with everything
    /// queued on its subtree. Returns `None` when there is nothing to cancel or
    /// the replayer is already sending one of those entries.
    async fn compact(
        &self,
        entity_path: &ResourceUrl,
        remap: &IdRemap,
    ) -> Result<Option<WriteOutcome>, AppError> {
        let claim = self.in_flight.lock().await;
        let pending = self.stores.queue.list_all().await?;

        let Some(create) = pending.iter().find(|mutation| {
            mutation.is_create() && remap.rewrite_url(&mutation.entity_path()) == *entity_path
        }) else {
            return Ok(None);
        };

        let doomed: Vec<MutationId> = pending
            .iter()
            .filter(|mutation| {
                mutation.id >= create.id
                    && remap.rewrite_url(&mutation.entity_path()).is_within(entity_path)
            })
            .map(|mutation| mutation.id)
            .collect();

        if let Some(current) = *claim
            && doomed.contains(&current)
        {
            tracing::debug!(
                target: "sync::interceptor",
                url = %entity_path,
                in_flight = %current,
                "create is being replayed, queueing delete instead"
            );
            return Ok(None);
        }

        self.stores.queue.remove_many(&doomed).await?;
        drop(claim);

        fold_into_cache(
            self.stores.cache.as_ref(),
            MutationMethod::Delete,
            entity_path,
            None,
            FoldMode::Optimistic,
        )
        .await?;

        tracing::info!(
            target: "sync::interceptor",
            url = %entity_path,
            removed = doomed.len(),
            "offline create cancelled by delete"
        );

        Ok(Some(WriteOutcome {
            status: 200,
            body: synthesize_response(entity_path, None),
            disposition: WriteDisposition::Compacted(doomed),
        }))
    }

    async fn fold_confirmed(
        &self,
        draft: &MutationDraft,
        entity_path: &ResourceUrl,
        response: &TransportResponse,
    ) -> Result<(), AppError> {
        let remote_id = response.body.get("id").and_then(overlay::id_string);
        let confirmed_path = match (draft.method, remote_id) {
            (MutationMethod::Create, Some(id)) => match EntityId::new(id) {
                Ok(id) => draft.target_url.without_query().child(id.as_str()),
                Err(_) => entity_path.clone(),
            },
            _ => entity_path.clone(),
        };
        let confirmed = if response.body.is_object() {
            Some(response.body.clone())
        } else {
            optimistic_body(draft)
        };

        fold_into_cache(
            self.stores.cache.as_ref(),
            draft.method,
            &confirmed_path,
            confirmed.as_ref(),
            FoldMode::Confirmed,
        )
        .await
    }
}

/// Uses the caller's `id` when the body carries one, otherwise assigns a UUID
/// and writes it into JSON object bodies.
fn assign_entity_id(body: Option<&mut RequestBody>) -> Result<EntityId, AppError> {
    let Some(RequestBody::Json(Value::Object(map))) = body else {
        return Ok(EntityId::generate());
    };
    if let Some(id) = map.get("id").and_then(overlay::id_string) {
        return EntityId::new(id).map_err(AppError::InvalidInput);
    }
    let id = EntityId::generate();
    map.insert("id".to_string(), Value::String(id.as_str().to_string()));
    Ok(id)
}

fn optimistic_body(draft: &MutationDraft) -> Option<Value> {
    let mut value = match draft.body.as_ref()? {
        RequestBody::Json(value) => value.clone(),
        RequestBody::Attachment(attachment) => {
            MutationBody::Attachment(attachment.to_ref()).overlay_value()
        }
    };
    if let (Some(entity_id), Value::Object(map)) = (&draft.entity_id, &mut value) {
        map.entry("id".to_string())
            .or_insert_with(|| Value::String(entity_id.as_str().to_string()));
    }
    Some(value)
}

/// Success body for a write that has not reached the server: the local body
/// plus the identifiers the URL implies (`/boards/b1/lists/l1` gives
/// `boardId: b1` and `id: l1`).
fn synthesize_response(entity_path: &ResourceUrl, body: Option<Value>) -> Value {
    let mut map = match body {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    let segments = entity_path.segments();
    let mut index = 0;
    while index + 1 < segments.len() {
        let key = if index + 2 >= segments.len() {
            "id".to_string()
        } else {
            format!("{}Id", singular(&segments[index]))
        };
        map.entry(key)
            .or_insert_with(|| Value::String(segments[index + 1].clone()));
        index += 2;
    }

    map.insert(OFFLINE_FLAG.to_string(), Value::Bool(true));
    Value::Object(map)
}

fn singular(collection: &str) -> String {
    if let Some(stem) = collection.strip_suffix("ies") {
        format!("{stem}y")
    } else if let Some(stem) = collection.strip_suffix('s') {
        stem.to_string()
    } else {
        collection.to_string()
    }
}
