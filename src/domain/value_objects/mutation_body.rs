use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

/// Payload of an outbound request as the caller supplies it.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Attachment(Attachment),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub name: String,
    pub media_type: String,
    pub bytes: Bytes,
}

impl Attachment {
    pub fn new(name: String, media_type: String, bytes: Bytes) -> Result<Self, String> {
        if name.trim().is_empty() {
            return Err("Attachment name cannot be empty".to_string());
        }
        if media_type.trim().is_empty() {
            return Err("Attachment media type cannot be empty".to_string());
        }
        Ok(Self {
            name,
            media_type,
            bytes,
        })
    }

    /// Hex SHA-256 of the content; used as the byte reference in the queue.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }

    pub fn to_ref(&self) -> AttachmentRef {
        AttachmentRef {
            name: self.name.clone(),
            media_type: self.media_type.clone(),
            digest: self.digest(),
            size: self.bytes.len() as u64,
        }
    }
}

/// Payload as persisted in the mutation queue. Attachment bytes are stored
/// separately and referenced by digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MutationBody {
    Json(Value),
    Attachment(AttachmentRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub name: String,
    pub media_type: String,
    pub digest: String,
    pub size: u64,
}

impl MutationBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            MutationBody::Json(value) => Some(value),
            MutationBody::Attachment(_) => None,
        }
    }

    pub fn attachment(&self) -> Option<&AttachmentRef> {
        match self {
            MutationBody::Json(_) => None,
            MutationBody::Attachment(reference) => Some(reference),
        }
    }

    /// JSON the overlay uses to represent this write locally.
    pub fn overlay_value(&self) -> Value {
        match self {
            MutationBody::Json(value) => value.clone(),
            MutationBody::Attachment(reference) => json!({
                "name": reference.name,
                "mediaType": reference.media_type,
                "size": reference.size,
            }),
        }
    }
}

impl RequestBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            RequestBody::Json(value) => Some(value),
            RequestBody::Attachment(_) => None,
        }
    }
}
