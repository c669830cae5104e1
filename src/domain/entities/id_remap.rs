use crate::domain::value_objects::ResourceUrl;
use serde_json::Value;
use std::collections::BTreeMap;

/// Client-assigned ids that the server replaced with its own on create.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdRemap {
    entries: BTreeMap<String, String>,
}

impl IdRemap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, local_id: String, remote_id: String) {
        if local_id != remote_id {
            self.entries.insert(local_id, remote_id);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Confirmed id for `id`, following chained remaps.
    pub fn resolve<'a>(&'a self, id: &'a str) -> &'a str {
        let mut current = id;
        for _ in 0..=self.entries.len() {
            match self.entries.get(current) {
                Some(next) => current = next.as_str(),
                None => break,
            }
        }
        current
    }

    pub fn rewrite_url(&self, url: &ResourceUrl) -> ResourceUrl {
        if self.is_empty() {
            return url.clone();
        }
        url.map_segments(|segment| {
            let resolved = self.resolve(segment);
            (resolved != segment).then(|| resolved.to_string())
        })
    }

    /// Rewrites `id` and `*Id` string fields anywhere in `value`.
    pub fn rewrite_body(&self, value: &mut Value) {
        if self.is_empty() {
            return;
        }
        match value {
            Value::Object(map) => {
                for (key, field) in map.iter_mut() {
                    if is_id_field(key)
                        && let Value::String(id) = field
                    {
                        let resolved = self.resolve(id);
                        if resolved != id.as_str() {
                            *id = resolved.to_string();
                        }
                        continue;
                    }
                    self.rewrite_body(field);
                }
            }
            Value::Array(items) => {
                for item in items.iter_mut() {
                    self.rewrite_body(item);
                }
            }
            _ => {}
        }
    }
}

impl FromIterator<(String, String)> for IdRemap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut remap = IdRemap::new();
        for (local, remote) in iter {
            remap.insert(local, remote);
        }
        remap
    }
}

fn is_id_field(key: &str) -> bool {
    key == "id" || (key.len() > 2 && key.ends_with("Id"))
}
