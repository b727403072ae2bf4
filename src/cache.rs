use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use reqwest::Method;

use crate::{RequestBody, Response};

const EMPTY: &str = "{}";

/// In-memory store of successful GET responses.
///
/// Entries never expire; only [`ResponseCache::clear`] removes them.
#[derive(Debug, Default)]
pub(crate) struct ResponseCache {
    entries: Mutex<HashMap<String, Response>>,
}

impl ResponseCache {
    pub(crate) fn get(&self, key: &str) -> Option<Response> {
        self.lock().get(key).cloned()
    }

    pub(crate) fn insert(&self, key: String, response: Response) {
        self.lock().insert(key, response);
    }

    pub(crate) fn clear(&self) {
        self.lock().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Response>> {
        // No invariant spans a panic inside these one-line critical sections.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Derives the cache key of a request.
///
/// Data and params are encoded canonically (object keys sorted at every
/// depth), so two requests built with different insertion orders collide.
/// Absent data or params encode as `{}`.
pub(crate) fn cache_key(
    method: &Method,
    url: &str,
    data: Option<&RequestBody>,
    params: &BTreeMap<String, String>,
) -> String {
    let data = data.map_or_else(|| EMPTY.to_owned(), RequestBody::signature);
    let params = if params.is_empty() {
        EMPTY.to_owned()
    } else {
        serde_json::to_string(params).unwrap_or_else(|_| EMPTY.to_owned())
    };
    format!("{method} {url} {data} {params}")
}

/// Serializes a JSON value with object keys sorted recursively.
pub(crate) fn canonical_json(value: &serde_json::Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries = map.iter().collect::<Vec<_>>();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (index, (key, value)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
