//! Folding pending writes onto cached server state.
//!
//! Paths below a snapshot alternate between object fields (child collections
//! such as `lists`) and array elements addressed by their `id`. A write is
//! applied by walking its entity path relative to the snapshot key and then
//! creating, patching, replacing or removing the node it ends on.

use crate::domain::entities::{IdRemap, OverlayView, QueuedMutation, SnapshotEntry};
use crate::domain::value_objects::{MutationMethod, ResourceUrl};
use serde_json::{Map, Value};

/// Field set on every sub-entity the overlay synthesized or changed.
pub const OFFLINE_FLAG: &str = "isOffline";

/// Merge a cached snapshot with the pending queue.
pub fn merge(snapshot: &SnapshotEntry, pending: &[QueuedMutation], remap: &IdRemap) -> OverlayView {
    overlay(&snapshot.url, Some(snapshot.body.clone()), pending, remap)
}

/// Same as [`merge`], but for a resource that may have no snapshot at all
/// (for example an entity that only exists as a pending create).
pub fn overlay(
    url: &ResourceUrl,
    base: Option<Value>,
    pending: &[QueuedMutation],
    remap: &IdRemap,
) -> OverlayView {
    let key = remap.rewrite_url(url).without_query();
    let mut doc = base;
    let mut applied = Vec::new();

    let mut ordered: Vec<&QueuedMutation> = pending.iter().collect();
    ordered.sort_by_key(|mutation| mutation.id);

    for mutation in ordered {
        let entity = remap.rewrite_url(&mutation.entity_path());
        let Some(rel) = entity.relative_to(&key) else {
            continue;
        };

        let body = local_body(mutation, remap);
        let effect = LocalEffect {
            method: mutation.method,
            body: body.as_ref(),
            tag: true,
        };
        if effect.apply(&mut doc, rel) {
            applied.push(mutation.id);
        }
    }

    OverlayView {
        url: url.clone(),
        body: doc,
        applied,
    }
}

/// Whether `mutation` would change the view of `url`.
pub fn is_related(url: &ResourceUrl, mutation: &QueuedMutation, remap: &IdRemap) -> bool {
    let key = remap.rewrite_url(url).without_query();
    remap.rewrite_url(&mutation.entity_path()).is_within(&key)
}

/// Body the overlay should show for `mutation`, with ids remapped and the
/// created entity's id filled in.
pub fn local_body(mutation: &QueuedMutation, remap: &IdRemap) -> Option<Value> {
    let mut body = mutation.body.as_ref().map(|b| b.overlay_value())?;
    remap.rewrite_body(&mut body);
    if mutation.method == MutationMethod::Create
        && let (Some(entity_id), Value::Object(map)) = (&mutation.entity_id, &mut body)
    {
        map.insert(
            "id".to_string(),
            Value::String(remap.resolve(entity_id.as_str()).to_string()),
        );
    }
    Some(body)
}

/// One write's effect on an in-memory document.
#[derive(Debug, Clone, Copy)]
pub struct LocalEffect<'a> {
    pub method: MutationMethod,
    pub body: Option<&'a Value>,
    /// Mark touched entities with [`OFFLINE_FLAG`].
    pub tag: bool,
}

impl LocalEffect<'_> {
    /// Applies the effect at `rel` below the document root. Returns whether
    /// anything changed.
    pub fn apply(&self, doc: &mut Option<Value>, rel: &[String]) -> bool {
        if rel.is_empty() {
            return self.apply_root(doc);
        }
        match doc {
            Some(node) => self.apply_at(node, rel),
            None => false,
        }
    }

    /// Variant for stored snapshots, which cannot be absent. A root delete
    /// leaves `Value::Null`.
    pub fn apply_to_value(&self, value: &mut Value, rel: &[String]) -> bool {
        let mut doc = Some(std::mem::take(value));
        let changed = self.apply(&mut doc, rel);
        *value = doc.unwrap_or(Value::Null);
        changed
    }

    fn apply_root(&self, doc: &mut Option<Value>) -> bool {
        if self.method == MutationMethod::Delete {
            return doc.take().is_some();
        }
        let Some(body) = self.body else {
            return false;
        };

        match doc {
            Some(Value::Array(items)) if self.method == MutationMethod::Create => {
                self.upsert_into(items, None, body)
            }
            Some(existing) => {
                if self.method == MutationMethod::Replace {
                    self.replace(existing, body);
                } else {
                    self.patch(existing, body);
                }
                true
            }
            None if self.method == MutationMethod::PartialUpdate => false,
            None => {
                let mut created = body.clone();
                self.mark(&mut created);
                *doc = Some(created);
                true
            }
        }
    }

    fn apply_at(&self, node: &mut Value, rel: &[String]) -> bool {
        let segment = rel[0].as_str();
        let rest = &rel[1..];

        match node {
            Value::Object(map) => {
                if rest.is_empty() {
                    return self.apply_field(map, segment);
                }
                // Only the collection directly holding a created entity is
                // materialized; deeper missing branches are left alone.
                let child = if self.method == MutationMethod::Create && rest.len() == 1 {
                    map.entry(segment.to_string())
                        .or_insert_with(|| Value::Array(Vec::new()))
                } else {
                    match map.get_mut(segment) {
                        Some(child) => child,
                        None => return false,
                    }
                };
                self.apply_at(child, rest)
            }
            Value::Array(items) => {
                let position = items.iter().position(|item| has_id(item, segment));
                if rest.is_empty() {
                    return self.apply_element(items, position, segment);
                }
                match position {
                    Some(index) => self.apply_at(&mut items[index], rest),
                    None => false,
                }
            }
            _ => false,
        }
    }

    /// The path ends on a named field of an object, e.g. a create posted to
    /// a collection without a client id.
    fn apply_field(&self, map: &mut Map<String, Value>, field: &str) -> bool {
        match (self.method, self.body) {
            (MutationMethod::Delete, _) => map.remove(field).is_some(),
            (MutationMethod::Create, Some(body)) => {
                let slot = map
                    .entry(field.to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                match slot {
                    Value::Array(items) => self.upsert_into(items, None, body),
                    _ => false,
                }
            }
            (MutationMethod::Replace, Some(body)) => {
                map.insert(field.to_string(), body.clone());
                true
            }
            (MutationMethod::PartialUpdate, Some(body)) => {
                if map.get(field).is_some_and(Value::is_object) {
                    if let Some(existing) = map.get_mut(field) {
                        self.patch(existing, body);
                    }
                } else {
                    map.insert(field.to_string(), body.clone());
                }
                true
            }
            (_, None) => false,
        }
    }

    /// The path ends on an array element addressed by id.
    fn apply_element(&self, items: &mut Vec<Value>, position: Option<usize>, id: &str) -> bool {
        match (self.method, position, self.body) {
            (MutationMethod::Delete, Some(index), _) => {
                items.remove(index);
                true
            }
            (MutationMethod::Delete, None, _) => false,
            (MutationMethod::Create, _, Some(body)) => self.upsert_into(items, Some(id), body),
            (MutationMethod::Replace, Some(index), Some(body)) => {
                self.replace(&mut items[index], body);
                true
            }
            (MutationMethod::PartialUpdate, Some(index), Some(body)) => {
                self.patch(&mut items[index], body);
                true
            }
            _ => false,
        }
    }

    fn upsert_into(&self, items: &mut Vec<Value>, id: Option<&str>, body: &Value) -> bool {
        let id = id
            .map(ToString::to_string)
            .or_else(|| body.get("id").and_then(id_string));

        if let Some(id) = id.as_deref()
            && let Some(existing) = items.iter_mut().find(|item| has_id(item, id))
        {
            self.patch(existing, body);
            return true;
        }

        let mut created = body.clone();
        if let (Some(id), Value::Object(map)) = (id, &mut created) {
            map.entry("id".to_string()).or_insert(Value::String(id));
        }
        self.mark(&mut created);
        items.push(created);
        true
    }

    fn patch(&self, target: &mut Value, body: &Value) {
        match body.as_object() {
            Some(fields) if target.is_object() => {
                if let Some(target_map) = target.as_object_mut() {
                    for (key, value) in fields {
                        target_map.insert(key.clone(), value.clone());
                    }
                }
            }
            _ => *target = body.clone(),
        }
        self.mark(target);
    }

    /// Replaces the entity's own fields. Child collections are separate
    /// resources and survive unless the body names them.
    fn replace(&self, target: &mut Value, body: &Value) {
        match body.as_object() {
            Some(fields) if target.is_object() => {
                if let Some(target_map) = target.as_object_mut() {
                    target_map.retain(|key, value| value.is_array() && !fields.contains_key(key));
                    for (key, value) in fields {
                        target_map.insert(key.clone(), value.clone());
                    }
                }
            }
            _ => *target = body.clone(),
        }
        self.mark(target);
    }

    fn mark(&self, target: &mut Value) {
        if self.tag
            && let Value::Object(map) = target
        {
            map.insert(OFFLINE_FLAG.to_string(), Value::Bool(true));
        }
    }
}

fn has_id(item: &Value, id: &str) -> bool {
    item.get("id")
        .and_then(id_string)
        .is_some_and(|candidate| candidate == id)
}

/// Entity ids arrive as JSON strings or numbers; both compare as text.
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
