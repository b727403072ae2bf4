use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{
    cache::{cache_key, ResponseCache},
    interceptor::Chain,
    options::merge_headers,
    pending::PendingRegistry,
    response::normalize,
    ClientConfig, RequestBody, RequestError, RequestInterceptor, RequestOptions, Response,
    ResponseInterceptor, Result, ReqwestTransport, Transport, TransportRequest,
};

/// Appends `params` as a query string, using `&` when `url` already has one.
pub fn build_url(url: &str, params: &BTreeMap<String, String>) -> String {
    if params.is_empty() {
        return url.to_owned();
    }
    let query = params
        .iter()
        .map(|(name, value)| {
            format!(
                "{}={}",
                urlencoding::encode(name),
                urlencoding::encode(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&");
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{query}")
}

/// HTTP request helper with defaults, retry, cache, interceptors and cancellation.
///
/// Cloning is cheap; clones share the cache, pending registry and
/// interceptor chains.
#[derive(Clone)]
pub struct RequestClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    cache: ResponseCache,
    pending: Arc<PendingRegistry>,
    request_interceptors: Chain<dyn RequestInterceptor>,
    response_interceptors: Chain<dyn ResponseInterceptor>,
}

impl fmt::Debug for RequestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestClient")
            .field("config", &self.inner.config)
            .field("pending", &self.inner.pending.len())
            .field("cached", &self.inner.cache.len())
            .field("request_interceptors", &self.inner.request_interceptors.len())
            .field(
                "response_interceptors",
                &self.inner.response_interceptors.len(),
            )
            .finish()
    }
}

impl RequestClient {
    /// Creates a client dispatching through `reqwest`.
    ///
    /// Fails with [`RequestError::TransportUnavailable`] when the HTTP stack
    /// cannot be initialized.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self::with_transport(config, Arc::new(ReqwestTransport::new()?)))
    }

    /// Creates a client dispatching through a custom [`Transport`].
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                cache: ResponseCache::default(),
                pending: Arc::new(PendingRegistry::default()),
                request_interceptors: Chain::default(),
                response_interceptors: Chain::default(),
            }),
        }
    }

    /// Creates a client from `REQUEST_CLIENT_*` environment variables.
    ///
    /// See [`ClientConfig::from_env`].
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub async fn get(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(url, options.with_method(Method::GET)).await
    }

    pub async fn post<D: Into<RequestBody>>(
        &self,
        url: &str,
        data: D,
        options: RequestOptions,
    ) -> Result<Response> {
        self.request(url, options.with_method(Method::POST).with_data(data))
            .await
    }

    pub async fn put<D: Into<RequestBody>>(
        &self,
        url: &str,
        data: D,
        options: RequestOptions,
    ) -> Result<Response> {
        self.request(url, options.with_method(Method::PUT).with_data(data))
            .await
    }

    pub async fn patch<D: Into<RequestBody>>(
        &self,
        url: &str,
        data: D,
        options: RequestOptions,
    ) -> Result<Response> {
        self.request(url, options.with_method(Method::PATCH).with_data(data))
            .await
    }

    pub async fn delete(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(url, options.with_method(Method::DELETE)).await
    }

    /// Runs one call through the interceptor, cache and retry pipeline.
    ///
    /// `url` is appended to the configured base URL. Non-2xx responses are
    /// retried up to `retry_attempts` times, waiting `retry_delay × attempt`
    /// before each retry. Network failures, timeouts and cancellation are
    /// returned immediately.
    pub async fn request(&self, url: &str, options: RequestOptions) -> Result<Response> {
        let config = &self.inner.config;
        let options = self.inner.request_interceptors.run(options).await;
        let target = format!("{}{}", config.base_url, url);

        let cache_key = (options.cache && options.method == Method::GET).then(|| {
            cache_key(
                &options.method,
                &target,
                options.data.as_ref(),
                &options.params,
            )
        });
        if let Some(hit) = cache_key.as_deref().and_then(|key| self.inner.cache.get(key)) {
            #[cfg(feature = "tracing")]
            tracing::trace!(url = %target, "serving response from cache");
            return Ok(hit);
        }

        let request = self.prepare(&target, &options)?;
        let mut attempt = 1usize;
        loop {
            let response = self.dispatch(&request, &options).await?;

            if response.is_success() {
                if options
                    .cancel
                    .as_ref()
                    .is_some_and(CancellationToken::is_cancelled)
                {
                    return Err(RequestError::Aborted);
                }
                if let Some(key) = cache_key {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(url = %request.url, "storing response in cache");
                    self.inner.cache.insert(key, response.clone());
                }
                return Ok(response);
            }

            if attempt >= config.retry_attempts.saturating_add(1) {
                return Err(RequestError::Status(Box::new(response)));
            }

            let delay = config.retry_delay(attempt);
            #[cfg(feature = "tracing")]
            tracing::debug!(
                url = %request.url,
                status = response.status,
                attempt,
                "retrying request after {} ms",
                delay.as_millis()
            );
            wait_before_retry(delay, options.cancel.as_ref()).await?;
            attempt += 1;
        }
    }

    /// Cancels every in-flight attempt and empties the pending registry.
    ///
    /// Each affected call fails with [`RequestError::Aborted`]. Calls waiting
    /// out a retry delay are not registered and keep going.
    pub fn abort_all(&self) -> usize {
        let aborted = self.inner.pending.abort_all();
        #[cfg(feature = "tracing")]
        tracing::debug!(aborted, "aborted pending requests");
        aborted
    }

    /// Drops every cached response.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    pub fn add_request_interceptor<I>(&self, interceptor: I)
    where
        I: RequestInterceptor + 'static,
    {
        self.inner.request_interceptors.push(Arc::new(interceptor));
    }

    pub fn add_response_interceptor<I>(&self, interceptor: I)
    where
        I: ResponseInterceptor + 'static,
    {
        self.inner.response_interceptors.push(Arc::new(interceptor));
    }

    /// Number of attempts currently on the wire.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    pub fn cached_len(&self) -> usize {
        self.inner.cache.len()
    }

    fn prepare(&self, target: &str, options: &RequestOptions) -> Result<TransportRequest> {
        let headers = merge_headers(&self.inner.config.headers, &options.headers);
        let body = options
            .data
            .as_ref()
            .map(|data| data.encode(headers.get("content-type").map(String::as_str)))
            .transpose()?;

        Ok(TransportRequest {
            method: options.method.clone(),
            url: build_url(target, &options.params),
            headers: headers.into_iter().collect(),
            timeout: options
                .timeout
                .unwrap_or_else(|| self.inner.config.timeout()),
            body,
        })
    }

    /// Sends one attempt and produces the interceptor-transformed response.
    ///
    /// The attempt is registered for exactly as long as it is on the wire.
    async fn dispatch(
        &self,
        request: &TransportRequest,
        options: &RequestOptions,
    ) -> Result<Response> {
        let guard = self.inner.pending.register(options.cancel.as_ref());

        #[cfg(feature = "tracing")]
        tracing::trace!(id = %guard.id(), method = %request.method, url = %request.url, "dispatching request");

        let outcome = tokio::select! {
            biased;
            () = guard.token().cancelled() => return Err(RequestError::Aborted),
            outcome = self
                .inner
                .transport
                .send(request.clone(), options.on_progress.clone()) => outcome,
        };
        drop(guard);

        let raw = outcome?;
        if raw.status == 0 {
            return Err(RequestError::Network(format!(
                "no response status for {} {}",
                request.method, request.url
            )));
        }

        let response = normalize(raw, request.url.clone());
        let intercepted = self.inner.response_interceptors.run(response);
        match options.cancel.as_ref() {
            Some(token) => tokio::select! {
                biased;
                () = token.cancelled() => Err(RequestError::Aborted),
                response = intercepted => Ok(response),
            },
            None => Ok(intercepted.await),
        }
    }
}

/// Sleeps before the next attempt; cancellation cuts the wait short.
async fn wait_before_retry(delay: Duration, cancel: Option<&CancellationToken>) -> Result<()> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            () = token.cancelled() => Err(RequestError::Aborted),
            () = sleep(delay) => Ok(()),
        },
        None => {
            sleep(delay).await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{build_url, RequestClient};
    use crate::ClientConfig;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn build_url_without_params_is_unchanged() {
        assert_eq!(
            build_url("https://api.test/u", &BTreeMap::new()),
            "https://api.test/u"
        );
    }

    #[test]
    fn build_url_starts_query_string() {
        assert_eq!(
            build_url("https://api.test/u", &params(&[("q", "a b"), ("page", "2")])),
            "https://api.test/u?page=2&q=a%20b"
        );
    }

    #[test]
    fn build_url_extends_existing_query_string() {
        assert_eq!(
            build_url("https://api.test/u?sort=asc", &params(&[("page", "2")])),
            "https://api.test/u?sort=asc&page=2"
        );
    }

    #[test]
    fn debug_reports_state_counts() {
        let client = RequestClient::new(ClientConfig::new("https://api.test"))
            .expect("reqwest transport must build");
        let debug = format!("{client:?}");
        assert!(debug.contains("https://api.test"));
        assert!(debug.contains("pending: 0"));
        assert!(debug.contains("cached: 0"));
    }
}
