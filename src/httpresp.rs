//! The fixed HTTP response envelope used by every stats endpoint
//! (spec.md §6): a constant header block, with optional JSONP wrapping
//! when `callback` is present.

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

pub struct JsonReply {
    body: String,
}

impl JsonReply {
    /// Wraps a JSON body (or, for error paths, a plain-text message) in
    /// the standard header block, optionally as JSONP.
    pub fn new(body: impl Into<String>, callback: Option<&str>) -> Self {
        let body = body.into();
        let wrapped = match callback {
            Some(cb) if !cb.is_empty() => format!("{cb}({body})"),
            _ => body,
        };
        Self { body: wrapped }
    }
}

impl IntoResponse for JsonReply {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Content-Type",
            HeaderValue::from_static("application/x-javascript; charset=UTF-8"),
        );
        headers.insert("Cache", HeaderValue::from_static("no-cache"));
        headers.insert(
            "Access-Control-Allow-Origin",
            HeaderValue::from_static("*"),
        );
        headers.insert("Connection", HeaderValue::from_static("close"));
        (StatusCode::OK, headers, self.body).into_response()
    }
}
