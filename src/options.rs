use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use tokio_util::sync::CancellationToken;

use crate::{transport::Progress, ProgressCallback, RequestBody};

/// Per-call options, passed through the request interceptor chain.
///
/// Header names are stored lower-cased. A header set to `None` suppresses
/// the client default of the same name.
#[derive(Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub data: Option<RequestBody>,
    pub params: BTreeMap<String, String>,
    pub headers: BTreeMap<String, Option<String>>,
    /// Overrides the client default timeout.
    pub timeout: Option<Duration>,
    /// Serve and store successful GET responses through the client cache.
    pub cache: bool,
    pub cancel: Option<CancellationToken>,
    pub on_progress: Option<ProgressCallback>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            data: None,
            params: BTreeMap::new(),
            headers: BTreeMap::new(),
            timeout: None,
            cache: false,
            cancel: None,
            on_progress: None,
        }
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("method", &self.method)
            .field("data", &self.data)
            .field("params", &self.params)
            .field("headers", &self.headers)
            .field("timeout", &self.timeout)
            .field("cache", &self.cache)
            .field("cancel", &self.cancel.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_data(mut self, data: impl Into<RequestBody>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), Some(value.into()));
        self
    }

    /// Drops a default header for this call.
    pub fn without_header(mut self, name: impl AsRef<str>) -> Self {
        self.headers.insert(name.as_ref().to_ascii_lowercase(), None);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(Progress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }
}

/// Merges client defaults with per-call headers.
///
/// Per-call entries win; `None` entries remove the header altogether.
pub(crate) fn merge_headers(
    defaults: &BTreeMap<String, String>,
    overrides: &BTreeMap<String, Option<String>>,
) -> BTreeMap<String, String> {
    let mut merged = defaults
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
        .collect::<BTreeMap<_, _>>();
    for (name, value) in overrides {
        let name = name.to_ascii_lowercase();
        match value {
            Some(value) => {
                merged.insert(name, value.clone());
            }
            None => {
                merged.remove(&name);
            }
        }
    }
    merged
}
