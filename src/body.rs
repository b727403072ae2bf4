use serde::Serialize;

use crate::{cache::canonical_json, RequestError, Result};

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Request payload.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestBody {
    /// Structured payload, encoded according to the request Content-Type.
    Json(serde_json::Value),
    /// Already-encoded text, sent unchanged.
    Text(String),
    /// Raw bytes (multipart form bodies, binary uploads), sent unchanged.
    Bytes(Vec<u8>),
}

impl RequestBody {
    /// Serializes any `Serialize` value into a [`RequestBody::Json`].
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(|err| RequestError::Body(err.to_string()))
    }

    /// Produces the bytes put on the wire for the given Content-Type.
    ///
    /// URL-encoded content types form-encode object payloads; anything else
    /// structured is JSON. Text and byte payloads pass through.
    pub(crate) fn encode(&self, content_type: Option<&str>) -> Result<Vec<u8>> {
        match self {
            Self::Text(text) => Ok(text.as_bytes().to_vec()),
            Self::Bytes(bytes) => Ok(bytes.clone()),
            Self::Json(serde_json::Value::String(text)) => Ok(text.as_bytes().to_vec()),
            Self::Json(serde_json::Value::Object(map)) if is_form_urlencoded(content_type) => {
                Ok(form_urlencode(map).into_bytes())
            }
            Self::Json(value) => {
                serde_json::to_vec(value).map_err(|err| RequestError::Body(err.to_string()))
            }
        }
    }

    /// Stable textual form used in cache keys.
    pub(crate) fn signature(&self) -> String {
        match self {
            Self::Json(value) => canonical_json(value),
            Self::Text(text) => serde_json::Value::String(text.clone()).to_string(),
            Self::Bytes(bytes) => format!("bytes:{}", urlencoding::encode_binary(bytes)),
        }
    }
}

impl From<serde_json::Value> for RequestBody {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for RequestBody {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for RequestBody {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

fn is_form_urlencoded(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|value| value.to_ascii_lowercase().contains(FORM_URLENCODED))
}

fn form_urlencode(map: &serde_json::Map<String, serde_json::Value>) -> String {
    map.iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(text) => text.clone(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            format!("{}={}", urlencoding::encode(key), urlencoding::encode(&value))
        })
        .collect::<Vec<_>>()
        .join("&")
}
