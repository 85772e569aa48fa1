//! Buffered HTTP responses

use lrsync_domain::{LrsError, Result};
use serde::de::DeserializeOwned;

/// A fully read response from the record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub etag: Option<String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(LrsError::from)
    }

    /// Body as JSON, or `Null` when the body is empty.
    pub fn json_value(&self) -> Result<serde_json::Value> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::Value::Null);
        }
        self.json()
    }

    /// Statement ids in a batch POST response, in request order. Bodies that
    /// are not an array of strings yield no ids.
    pub fn statement_ids(&self) -> Vec<String> {
        self.json::<Vec<String>>().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &str) -> ApiResponse {
        ApiResponse { status: 200, etag: None, content_type: None, body: body.as_bytes().to_vec() }
    }

    #[test]
    fn statement_ids_from_array_body() {
        assert_eq!(response(r#"["a","b"]"#).statement_ids(), vec!["a", "b"]);
        assert!(response("").statement_ids().is_empty());
        assert!(response(r#"{"ids":[]}"#).statement_ids().is_empty());
    }

    #[test]
    fn empty_body_is_null() {
        assert_eq!(response("  ").json_value().unwrap(), serde_json::Value::Null);
    }
}
