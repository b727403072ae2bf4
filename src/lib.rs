//! `request-client` is a small async HTTP request helper.
//!
//! [`RequestClient`] wraps a [`Transport`] (reqwest by default) with:
//! - verb helpers: [`RequestClient::get`], [`RequestClient::post`],
//!   [`RequestClient::put`], [`RequestClient::patch`], [`RequestClient::delete`]
//! - default headers, base URL and timeout from [`ClientConfig`]
//! - retry of non-2xx responses with linear backoff
//! - an in-memory cache for successful GET responses
//! - request and response interceptor chains
//! - progress callbacks and cooperative cancellation

mod body;
mod cache;
mod client;
mod config;
mod error;
pub mod interceptor;
mod options;
mod pending;
mod response;
mod transport;

pub use body::RequestBody;
pub use client::{build_url, RequestClient};
pub use config::ClientConfig;
pub use error::RequestError;
pub use interceptor::{RequestInterceptor, ResponseInterceptor};
pub use options::RequestOptions;
pub use response::{Response, ResponseData};
pub use transport::{
    Progress, ProgressCallback, ProgressDirection, RawResponse, ReqwestTransport, Transport,
    TransportError, TransportRequest,
};

pub use reqwest::Method;
pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, RequestError>;
