use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical form of an API endpoint: `/seg/seg[?query]`, without scheme, host,
/// duplicate or trailing slashes. Used as the snapshot cache key and as the
/// basis for parent/child relationships between resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceUrl {
    segments: Vec<String>,
    query: Option<String>,
}

impl ResourceUrl {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("Resource url cannot be empty".to_string());
        }

        let without_origin = strip_origin(trimmed);
        let (path, query) = match without_origin.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (without_origin, None),
        };

        let segments: Vec<String> = path
            .split('/')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(ToString::to_string)
            .collect();

        if segments.is_empty() {
            return Err(format!("Resource url has no path: {raw}"));
        }

        let query = query
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty());

        Ok(Self { segments, query })
    }

    pub fn from_segments<I, S>(segments: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments
            .into_iter()
            .map(Into::into)
            .filter(|s: &String| !s.is_empty())
            .collect();
        if segments.is_empty() {
            return Err("Resource url has no path".to_string());
        }
        Ok(Self {
            segments,
            query: None,
        })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn last_segment(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self {
            segments,
            query: None,
        }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
            query: None,
        })
    }

    pub fn without_query(&self) -> Self {
        Self {
            segments: self.segments.clone(),
            query: None,
        }
    }

    /// Every path prefix from the outermost collection down to `self`, query dropped.
    pub fn lineage(&self) -> Vec<Self> {
        (1..=self.segments.len())
            .map(|len| Self {
                segments: self.segments[..len].to_vec(),
                query: None,
            })
            .collect()
    }

    /// Path segments of `self` below `base`, or `None` when `self` is not `base`
    /// or one of its descendants. Queries are ignored on both sides.
    pub fn relative_to<'a>(&'a self, base: &ResourceUrl) -> Option<&'a [String]> {
        if self.segments.len() < base.segments.len() {
            return None;
        }
        if self.segments[..base.segments.len()] != base.segments[..] {
            return None;
        }
        Some(&self.segments[base.segments.len()..])
    }

    pub fn is_within(&self, base: &ResourceUrl) -> bool {
        self.relative_to(base).is_some()
    }

    pub fn map_segments<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&str) -> Option<String>,
    {
        Self {
            segments: self
                .segments
                .iter()
                .map(|segment| f(segment.as_str()).unwrap_or_else(|| segment.clone()))
                .collect(),
            query: self.query.clone(),
        }
    }

    pub fn as_key(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path(), query),
            None => self.path(),
        }
    }
}

fn strip_origin(raw: &str) -> &str {
    for scheme in ["https://", "http://"] {
        if let Some(rest) = raw.strip_prefix(scheme) {
            return match rest.find('/') {
                Some(index) => &rest[index..],
                None => "",
            };
        }
    }
    raw
}

impl fmt::Display for ResourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_key())
    }
}

impl TryFrom<String> for ResourceUrl {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ResourceUrl> for String {
    fn from(url: ResourceUrl) -> Self {
        url.as_key()
    }
}
