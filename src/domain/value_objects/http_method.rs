use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four write operations the engine can queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationMethod {
    Create,
    Replace,
    PartialUpdate,
    Delete,
}

impl MutationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationMethod::Create => "create",
            MutationMethod::Replace => "replace",
            MutationMethod::PartialUpdate => "partial_update",
            MutationMethod::Delete => "delete",
        }
    }

    pub fn http_method(&self) -> HttpMethod {
        match self {
            MutationMethod::Create => HttpMethod::Post,
            MutationMethod::Replace => HttpMethod::Put,
            MutationMethod::PartialUpdate => HttpMethod::Patch,
            MutationMethod::Delete => HttpMethod::Delete,
        }
    }
}

impl fmt::Display for MutationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationMethod {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "create" => Ok(MutationMethod::Create),
            "replace" => Ok(MutationMethod::Replace),
            "partial_update" => Ok(MutationMethod::PartialUpdate),
            "delete" => Ok(MutationMethod::Delete),
            other => Err(format!("Unknown mutation method: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub fn mutation(&self) -> Option<MutationMethod> {
        match self {
            HttpMethod::Get => None,
            HttpMethod::Post => Some(MutationMethod::Create),
            HttpMethod::Put => Some(MutationMethod::Replace),
            HttpMethod::Patch => Some(MutationMethod::PartialUpdate),
            HttpMethod::Delete => Some(MutationMethod::Delete),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<MutationMethod> for HttpMethod {
    fn from(method: MutationMethod) -> Self {
        method.http_method()
    }
}
