//! Response types.
//!
//! Handlers return a [`HandlerResponse`] carrying an unformatted JSON value.
//! The router turns it into an [`ApiResponse`], whose body has been encoded
//! by the formatter for the negotiated format (API requests) or is passed
//! through untouched (non-API requests).

use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde_json::Value;

/// Raw result produced by a handler.
#[derive(Debug, Clone)]
pub struct HandlerResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl HandlerResponse {
    #[must_use]
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body,
        }
    }

    /// 200 with the given body.
    #[must_use]
    pub fn ok(body: impl Into<Value>) -> Self {
        Self::new(StatusCode::OK, body.into())
    }

    #[must_use]
    pub fn created(body: impl Into<Value>) -> Self {
        Self::new(StatusCode::CREATED, body.into())
    }

    #[must_use]
    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT, Value::Null)
    }

    /// Add or replace a header. Invalid names or values are ignored.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }
}

/// Body of a finished response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    /// Non-API responses are returned without passing through a formatter.
    Raw(Value),
    /// Bytes produced by a formatter.
    Encoded(Vec<u8>),
}

/// Final response handed back to the HTTP kernel.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl ApiResponse {
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: ResponseBody) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    #[must_use]
    pub fn empty(status: StatusCode) -> Self {
        Self::new(status, HeaderMap::new(), ResponseBody::Empty)
    }

    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body bytes, if the body was encoded.
    #[must_use]
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.body {
            ResponseBody::Encoded(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Decode the body back into JSON. Raw bodies are returned as-is.
    #[must_use]
    pub fn json(&self) -> Option<Value> {
        match &self.body {
            ResponseBody::Empty => None,
            ResponseBody::Raw(value) => Some(value.clone()),
            ResponseBody::Encoded(bytes) => serde_json::from_slice(bytes).ok(),
        }
    }
}
