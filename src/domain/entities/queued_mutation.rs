use crate::domain::value_objects::{
    AuthContext, EntityId, MutationBody, MutationId, MutationMethod, RequestBody, ResourceUrl,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A write handed to the queue store. The store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationDraft {
    pub target_url: ResourceUrl,
    pub method: MutationMethod,
    pub body: Option<RequestBody>,
    pub auth_context: Option<AuthContext>,
    pub entity_id: Option<EntityId>,
    pub enqueued_at: DateTime<Utc>,
}

impl MutationDraft {
    pub fn new(
        target_url: ResourceUrl,
        method: MutationMethod,
        body: Option<RequestBody>,
        auth_context: Option<AuthContext>,
    ) -> Self {
        Self {
            target_url,
            method,
            body,
            auth_context,
            entity_id: None,
            enqueued_at: Utc::now(),
        }
    }

    pub fn with_entity_id(mut self, entity_id: EntityId) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    pub fn enqueued_at(mut self, at: DateTime<Utc>) -> Self {
        self.enqueued_at = at;
        self
    }

    pub fn entity_path(&self) -> ResourceUrl {
        entity_path(self.method, &self.target_url, self.entity_id.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedMutation {
    pub id: MutationId,
    pub target_url: ResourceUrl,
    pub method: MutationMethod,
    pub body: Option<MutationBody>,
    pub auth_context: Option<AuthContext>,
    pub entity_id: Option<EntityId>,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
}

impl QueuedMutation {
    /// URL of the entity this write affects. For creates that is the target
    /// collection plus the client-assigned id.
    pub fn entity_path(&self) -> ResourceUrl {
        entity_path(self.method, &self.target_url, self.entity_id.as_ref())
    }

    pub fn is_expired(&self, now: DateTime<Utc>, horizon: Duration) -> bool {
        now.signed_duration_since(self.enqueued_at) > horizon
    }

    pub fn is_create(&self) -> bool {
        self.method == MutationMethod::Create
    }
}

fn entity_path(
    method: MutationMethod,
    target_url: &ResourceUrl,
    entity_id: Option<&EntityId>,
) -> ResourceUrl {
    match (method, entity_id) {
        (MutationMethod::Create, Some(id)) => target_url.child(id.as_str()),
        _ => target_url.without_query(),
    }
}
