use crate::domain::value_objects::ResourceUrl;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotOrigin {
    /// Body returned by the server.
    Server,
    /// Placeholder written locally for an entity the server has not confirmed yet.
    Injected,
}

impl SnapshotOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotOrigin::Server => "server",
            SnapshotOrigin::Injected => "injected",
        }
    }
}

impl fmt::Display for SnapshotOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SnapshotOrigin {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "server" => Ok(SnapshotOrigin::Server),
            "injected" => Ok(SnapshotOrigin::Injected),
            other => Err(format!("Unknown snapshot origin: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub url: ResourceUrl,
    pub body: Value,
    pub origin: SnapshotOrigin,
    pub is_stale: bool,
    pub refreshed_at: DateTime<Utc>,
}

impl SnapshotEntry {
    pub fn is_injected(&self) -> bool {
        self.origin == SnapshotOrigin::Injected
    }
}
