use std::collections::BTreeMap;

use serde::de::DeserializeOwned;

use crate::transport::RawResponse;

/// Response body after normalization.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseData {
    /// Body parsed from a JSON content type.
    Json(serde_json::Value),
    /// Raw body text, also used when a JSON body failed to parse.
    Text(String),
}

/// Normalized response handed to response interceptors and callers.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub data: ResponseData,
    /// Header map keyed by lower-cased name.
    pub headers: BTreeMap<String, String>,
    /// Final URL the request was sent to, query string included.
    pub url: String,
    /// The transport's view of the exchange.
    pub raw: RawResponse,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Deserializes the body into `T`.
    ///
    /// Text bodies are parsed as JSON first.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        match &self.data {
            ResponseData::Json(value) => T::deserialize(value),
            ResponseData::Text(text) => serde_json::from_str(text),
        }
    }

    /// Raw body text as received.
    pub fn text(&self) -> &str {
        &self.raw.body
    }
}

pub(crate) fn normalize(raw: RawResponse, url: String) -> Response {
    let headers = parse_header_block(&raw.headers);
    let is_json = headers
        .get("content-type")
        .is_some_and(|value| value.to_ascii_lowercase().contains("json"));

    let data = if is_json {
        match serde_json::from_str(&raw.body) {
            Ok(value) => ResponseData::Json(value),
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(url = %url, error = %_err, "failed to parse JSON response body, keeping raw text");
                ResponseData::Text(raw.body.clone())
            }
        }
    } else {
        ResponseData::Text(raw.body.clone())
    };

    Response {
        status: raw.status,
        status_text: raw.status_text.clone(),
        data,
        headers,
        url,
        raw,
    }
}

/// Parses a CR-LF delimited `Name: value` block.
///
/// Names are lower-cased; a repeated header keeps its last value. Lines
/// without a colon are skipped.
pub(crate) fn parse_header_block(block: &str) -> BTreeMap<String, String> {
    block
        .split("\r\n")
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_ascii_lowercase(), value.trim().to_owned()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{normalize, parse_header_block, ResponseData};
    use crate::transport::RawResponse;

    fn raw(status: u16, headers: &str, body: &str) -> RawResponse {
        RawResponse {
            status,
            status_text: "OK".to_owned(),
            headers: headers.to_owned(),
            body: body.to_owned(),
        }
    }

    #[test]
    fn header_block_lowercases_names() {
        let headers =
            parse_header_block("Content-Type: application/json\r\nX-Request-Id: abc:1\r\n");
        assert_eq!(headers.len(), 2);
        assert_eq!(headers["content-type"], "application/json");
        assert_eq!(headers["x-request-id"], "abc:1");
    }

    #[test]
    fn header_block_skips_malformed_lines() {
        let headers = parse_header_block("garbage\r\n: empty\r\nEtag: \"v1\"");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers["etag"], "\"v1\"");
    }

    #[test]
    fn json_content_type_parses_body() {
        let response = normalize(
            raw(200, "Content-Type: application/json; charset=utf-8\r\n", r#"{"id":1}"#),
            "https://api.test/u".to_owned(),
        );
        assert_eq!(response.data, ResponseData::Json(json!({"id": 1})));
        assert_eq!(response.header("CONTENT-TYPE"), Some("application/json; charset=utf-8"));
    }

    #[test]
    fn invalid_json_keeps_raw_text() {
        let response = normalize(
            raw(200, "content-type: application/json\r\n", "not json"),
            "https://api.test/u".to_owned(),
        );
        assert_eq!(response.data, ResponseData::Text("not json".to_owned()));
        assert!(response.is_success());
    }

    #[test]
    fn non_json_content_type_is_text() {
        let response = normalize(
            raw(404, "content-type: text/plain\r\n", r#"{"id":1}"#),
            "https://api.test/u".to_owned(),
        );
        assert!(matches!(response.data, ResponseData::Text(_)));
        assert!(!response.is_success());
        let id: serde_json::Value = response.json().expect("text body is valid JSON");
        assert_eq!(id, json!({"id": 1}));
    }
}
