#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use taskboard_sync::domain::value_objects::HttpMethod;
use taskboard_sync::shared::logging;
use taskboard_sync::{
    AppConfig, AppError, AuthContext, AuthProvider, OutboundRequest, RequestBody, SyncEngine,
    Transport, TransportError, TransportResponse,
};

pub const TOKEN: &str = "session-token";

/// In-memory board API. Resources nest as `/boards/{id}/lists/{id}/cards/{id}`;
/// collections are arrays inside their parent object.
pub struct FakeBoardServer {
    online: AtomicBool,
    assign_server_ids: bool,
    next_id: AtomicU64,
    root: Mutex<Value>,
    injected_statuses: Mutex<VecDeque<u16>>,
    log: Mutex<Vec<(HttpMethod, String)>>,
}

impl FakeBoardServer {
    pub fn new() -> Arc<Self> {
        Self::build(false)
    }

    /// Ignores client ids on create and hands out `srv-N` instead.
    pub fn assigning_ids() -> Arc<Self> {
        Self::build(true)
    }

    fn build(assign_server_ids: bool) -> Arc<Self> {
        Arc::new(Self {
            online: AtomicBool::new(true),
            assign_server_ids,
            next_id: AtomicU64::new(1),
            root: Mutex::new(json!({"boards": []})),
            injected_statuses: Mutex::new(VecDeque::new()),
            log: Mutex::new(Vec::new()),
        })
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// The next request is answered with `status` without touching any state.
    pub fn fail_next(&self, status: u16) {
        self.injected_statuses.lock().unwrap().push_back(status);
    }

    pub fn log(&self) -> Vec<(HttpMethod, String)> {
        self.log.lock().unwrap().clone()
    }

    pub fn clear_log(&self) {
        self.log.lock().unwrap().clear();
    }

    pub fn resource(&self, path: &str) -> Option<Value> {
        let root = self.root.lock().unwrap();
        let segments = split(path);
        locate(&root, &segments).cloned()
    }

    fn handle(&self, request: &OutboundRequest) -> TransportResponse {
        if request.auth.as_ref().map(AuthContext::bearer_token) != Some(TOKEN) {
            return TransportResponse::new(401, json!({"error": "unauthorized"}));
        }
        if let Some(status) = self.injected_statuses.lock().unwrap().pop_front() {
            return TransportResponse::new(status, json!({"error": "injected"}));
        }

        let segments = split(&request.url.path());
        let body = match &request.body {
            Some(RequestBody::Json(value)) => value.clone(),
            Some(RequestBody::Attachment(attachment)) => json!({
                "name": attachment.name,
                "mediaType": attachment.media_type,
                "size": attachment.bytes.len(),
            }),
            None => Value::Null,
        };
        let mut root = self.root.lock().unwrap();

        match request.method {
            HttpMethod::Get => match locate(&root, &segments) {
                Some(node) => TransportResponse::new(200, node.clone()),
                None => not_found(),
            },
            HttpMethod::Post => self.create(&mut root, &segments, body),
            HttpMethod::Patch | HttpMethod::Put => {
                if body.get("title").is_some_and(|title| title == "") {
                    return TransportResponse::new(422, json!({"error": "title must not be empty"}));
                }
                match locate_mut(&mut root, &segments) {
                    Some(Value::Object(target)) => {
                        if let Value::Object(fields) = body {
                            if request.method == HttpMethod::Put {
                                target.retain(|key, value| key == "id" || value.is_array());
                            }
                            for (key, value) in fields {
                                target.insert(key, value);
                            }
                        }
                        TransportResponse::new(200, Value::Object(target.clone()))
                    }
                    _ => not_found(),
                }
            }
            HttpMethod::Delete => {
                let Some((id, collection)) = segments.split_last() else {
                    return not_found();
                };
                match locate_mut(&mut root, collection) {
                    Some(Value::Array(items)) => {
                        let before = items.len();
                        items.retain(|item| item["id"].as_str() != Some(id.as_str()));
                        if items.len() == before {
                            not_found()
                        } else {
                            TransportResponse::new(204, Value::Null)
                        }
                    }
                    _ => not_found(),
                }
            }
        }
    }

    fn create(&self, root: &mut Value, segments: &[String], body: Value) -> TransportResponse {
        let Some((collection, parent)) = segments.split_last() else {
            return not_found();
        };
        let Value::Object(mut fields) = body else {
            return TransportResponse::new(400, json!({"error": "object body required"}));
        };
        if fields.get("title").is_some_and(|title| title == "") {
            return TransportResponse::new(422, json!({"error": "title must not be empty"}));
        }

        let Some(Value::Object(parent)) = locate_mut(root, parent) else {
            return not_found();
        };
        let id = match fields.get("id").and_then(Value::as_str) {
            Some(id) if !self.assign_server_ids => id.to_string(),
            _ => format!("srv-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
        };
        fields.insert("id".to_string(), Value::String(id));

        let items = parent
            .entry(collection.clone())
            .or_insert_with(|| Value::Array(Vec::new()));
        match items {
            Value::Array(items) => {
                let created = Value::Object(fields);
                items.push(created.clone());
                TransportResponse::new(201, created)
            }
            _ => TransportResponse::new(409, json!({"error": "not a collection"})),
        }
    }
}

#[async_trait]
impl Transport for FakeBoardServer {
    async fn send(&self, request: &OutboundRequest) -> Result<TransportResponse, TransportError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable("fake server offline".into()));
        }
        self.log
            .lock()
            .unwrap()
            .push((request.method, request.url.path()));
        Ok(self.handle(request))
    }
}

fn not_found() -> TransportResponse {
    TransportResponse::new(404, json!({"error": "not found"}))
}

fn split(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn locate<'a>(node: &'a Value, segments: &[String]) -> Option<&'a Value> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(node);
    };
    let child = match node {
        Value::Object(map) => map.get(head)?,
        Value::Array(items) => items
            .iter()
            .find(|item| item["id"].as_str() == Some(head.as_str()))?,
        _ => return None,
    };
    locate(child, rest)
}

fn locate_mut<'a>(node: &'a mut Value, segments: &[String]) -> Option<&'a mut Value> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(node);
    };
    let child = match node {
        Value::Object(map) => map.get_mut(head)?,
        Value::Array(items) => items
            .iter_mut()
            .find(|item| item["id"].as_str() == Some(head.as_str()))?,
        _ => return None,
    };
    locate_mut(child, rest)
}

pub struct StaticAuth;

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn current(&self) -> Option<AuthContext> {
        AuthContext::new(TOKEN.to_string()).ok()
    }

    async fn refresh(&self) -> Result<AuthContext, AppError> {
        AuthContext::new(TOKEN.to_string()).map_err(AppError::InvalidInput)
    }
}

pub fn test_config(database: &Path, auto_sync: bool) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = format!("sqlite://{}?mode=rwc", database.display());
    config.network.base_url = "http://fake.invalid/api".to_string();
    config.sync.auto_sync = auto_sync;
    config
}

pub async fn open_engine(
    server: &Arc<FakeBoardServer>,
    database: &Path,
    auto_sync: bool,
) -> SyncEngine {
    logging::init("taskboard-sync-tests");
    SyncEngine::with_transport(
        test_config(database, auto_sync),
        server.clone(),
        Arc::new(StaticAuth),
    )
    .await
    .expect("sync engine")
}

pub fn json_body(value: Value) -> Option<RequestBody> {
    Some(RequestBody::Json(value))
}

pub fn object(value: &Value) -> &Map<String, Value> {
    value.as_object().expect("object body")
}

/// Polls until the engine reports an empty queue.
pub async fn wait_until_drained(engine: &SyncEngine) {
    for _ in 0..200 {
        if engine.pending_mutations().await.unwrap_or(u32::MAX) == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("queue was not drained");
}
