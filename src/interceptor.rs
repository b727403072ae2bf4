//! Request and response interceptor chains.
//!
//! Interceptors run sequentially in registration order; each receives the
//! output of the previous one. Async closures implement the traits directly:
//!
//! ```no_run
//! use request_client::{ClientConfig, RequestClient, RequestOptions};
//!
//! # fn demo() -> request_client::Result<()> {
//! let client = RequestClient::new(ClientConfig::new("https://api.test"))?;
//! client.add_request_interceptor(|options: RequestOptions| async move {
//!     options.with_header("authorization", "Bearer token")
//! });
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::{RequestOptions, Response};

/// Transforms the options of a call before it is dispatched.
#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    async fn intercept(&self, options: RequestOptions) -> RequestOptions;
}

/// Transforms a normalized response before it is cached or returned.
#[async_trait]
pub trait ResponseInterceptor: Send + Sync {
    async fn intercept(&self, response: Response) -> Response;
}

#[async_trait]
impl<F, Fut> RequestInterceptor for F
where
    F: Fn(RequestOptions) -> Fut + Send + Sync,
    Fut: Future<Output = RequestOptions> + Send + 'static,
{
    async fn intercept(&self, options: RequestOptions) -> RequestOptions {
        self(options).await
    }
}

#[async_trait]
impl<F, Fut> ResponseInterceptor for F
where
    F: Fn(Response) -> Fut + Send + Sync,
    Fut: Future<Output = Response> + Send + 'static,
{
    async fn intercept(&self, response: Response) -> Response {
        self(response).await
    }
}

/// Append-only ordered list of interceptors.
pub(crate) struct Chain<T: ?Sized> {
    items: RwLock<Vec<Arc<T>>>,
}

impl<T: ?Sized> Default for Chain<T> {
    fn default() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
        }
    }
}

impl<T: ?Sized> Chain<T> {
    pub(crate) fn push(&self, item: Arc<T>) {
        self.items
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(item);
    }

    /// Copy of the chain as registered right now.
    ///
    /// Interceptors added while a call is running apply to later calls only.
    pub(crate) fn snapshot(&self) -> Vec<Arc<T>> {
        self.items
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.items
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl Chain<dyn RequestInterceptor> {
    pub(crate) async fn run(&self, mut options: RequestOptions) -> RequestOptions {
        for interceptor in self.snapshot() {
            options = interceptor.intercept(options).await;
        }
        options
    }
}

impl Chain<dyn ResponseInterceptor> {
    pub(crate) async fn run(&self, mut response: Response) -> Response {
        for interceptor in self.snapshot() {
            response = interceptor.intercept(response).await;
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::{Chain, RequestInterceptor};
    use crate::RequestOptions;

    #[tokio::test]
    async fn request_chain_runs_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain: Chain<dyn RequestInterceptor> = Chain::default();

        for step in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            chain.push(Arc::new(move |options: RequestOptions| {
                let seen = Arc::clone(&seen);
                async move {
                    let previous = options.params.get("step").cloned();
                    seen.lock().expect("lock").push((step, previous));
                    options.with_param("step", step)
                }
            }));
        }
        assert_eq!(chain.len(), 3);

        let options = chain.run(RequestOptions::default()).await;
        assert_eq!(options.params.get("step").map(String::as_str), Some("third"));
        assert_eq!(
            *seen.lock().expect("lock"),
            vec![
                ("first", None),
                ("second", Some("first".to_owned())),
                ("third", Some("second".to_owned())),
            ]
        );
    }

    #[tokio::test]
    async fn empty_chain_returns_input() {
        let chain: Chain<dyn RequestInterceptor> = Chain::default();
        let options = chain.run(RequestOptions::default().with_cache(true)).await;
        assert!(options.cache);
    }
}
