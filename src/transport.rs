use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::HeaderValue, Method};

use crate::{RequestError, Result};

/// Direction of a progress notification.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressDirection {
    Upload,
    Download,
}

/// Transfer progress reported by the transport.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Progress {
    pub direction: ProgressDirection,
    /// Bytes transferred so far.
    pub loaded: u64,
    /// Total bytes, when the transport knows it.
    pub total: Option<u64>,
}

pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// A fully prepared request handed to a [`Transport`].
#[derive(Clone, Debug, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Zero means no timeout.
    pub timeout: Duration,
    pub body: Option<Vec<u8>>,
}

/// What the transport observed once a response was available.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RawResponse {
    /// Zero means the exchange never produced an HTTP status.
    pub status: u16,
    pub status_text: String,
    /// Raw header block, one `Name: value` per CR-LF terminated line.
    pub headers: String,
    pub body: String,
}

/// Failures reported by the transport itself, as opposed to HTTP error statuses.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("timeout")]
    Timeout,
}

impl From<TransportError> for RequestError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Network(message) => RequestError::Network(message),
            TransportError::Timeout => RequestError::Timeout,
        }
    }
}

/// The network stack a [`crate::RequestClient`] dispatches through.
///
/// Aborting is done by dropping the future returned from [`Transport::send`],
/// so implementations must not rely on running to completion.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: TransportRequest,
        progress: Option<ProgressCallback>,
    ) -> std::result::Result<RawResponse, TransportError>;
}

/// Default transport backed by `reqwest`.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|err| RequestError::TransportUnavailable(err.to_string()))?;
        Ok(Self { http })
    }

    /// Wraps an already configured `reqwest::Client`.
    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: TransportRequest,
        progress: Option<ProgressCallback>,
    ) -> std::result::Result<RawResponse, TransportError> {
        let mut builder = self.http.request(request.method, &request.url);
        if !request.timeout.is_zero() {
            builder = builder.timeout(request.timeout);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let upload_len = request.body.as_ref().map(|body| body.len() as u64);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let mut response = builder.send().await.map_err(map_reqwest_error)?;

        if let (Some(callback), Some(len)) = (progress.as_ref(), upload_len) {
            callback(Progress {
                direction: ProgressDirection::Upload,
                loaded: len,
                total: Some(len),
            });
        }

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| format!("{}: {}\r\n", name.as_str(), header_text(value)))
            .collect::<String>();
        let total = response.content_length();

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(map_reqwest_error)? {
            body.extend_from_slice(&chunk);
            if let Some(callback) = progress.as_ref() {
                callback(Progress {
                    direction: ProgressDirection::Download,
                    loaded: body.len() as u64,
                    total,
                });
            }
        }

        Ok(RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_owned(),
            headers,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

fn header_text(value: &HeaderValue) -> String {
    String::from_utf8_lossy(value.as_bytes()).into_owned()
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(err.to_string())
    }
}
