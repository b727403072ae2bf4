use crate::Response;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// No usable transport could be constructed.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),
    /// The request never reached the server or no response came back.
    #[error("network error: {0}")]
    Network(String),
    /// The transport gave up waiting for a response.
    #[error("request timed out")]
    Timeout,
    /// Non-success HTTP status after every retry attempt was spent.
    ///
    /// Carries the response as transformed by the response interceptors.
    #[error("http error {}: {}", .0.status, .0.status_text)]
    Status(Box<Response>),
    /// The call was cancelled through its token or [`crate::RequestClient::abort_all`].
    #[error("request aborted")]
    Aborted,
    /// The request payload could not be serialized.
    #[error("body error: {0}")]
    Body(String),
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl RequestError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Returns the final error response for [`RequestError::Status`].
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Status(response) => Some(response),
            _ => None,
        }
    }
}
