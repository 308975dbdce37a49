//! Request model consumed by the router.
//!
//! [`ApiRequest`] is the raw request as handed over by the surrounding HTTP
//! kernel (or synthesized by the internal dispatcher). Query parameters use a
//! stack-allocated [`ParamVec`] since most API calls carry only a handful.

use std::net::IpAddr;
use std::sync::Arc;

use http::header::{ACCEPT, HOST};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use once_cell::sync::OnceCell;
use serde_json::Value;
use smallvec::SmallVec;

use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::router::Target;

/// Maximum number of path/query parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Parameter storage: names are shared `Arc<str>`, values are per request.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Look up a parameter using "last write wins" semantics.
#[inline]
#[must_use]
pub fn find_param<'a>(params: &'a ParamVec, name: &str) -> Option<&'a str> {
    params
        .iter()
        .rfind(|(k, _)| k.as_ref() == name)
        .map(|(_, v)| v.as_str())
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub request_id: RequestId,
    pub method: Method,
    /// Path component only, always starting with `/`.
    pub path: String,
    pub query: ParamVec,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    pub remote_addr: Option<IpAddr>,
    internal: bool,
    /// Memoized "is this targeting the API" resolution for this request.
    target: OnceCell<Option<Arc<Target>>>,
}

impl ApiRequest {
    /// Build a request from a method and an origin-form URI (`/path?query`).
    pub fn new(method: Method, uri: &str) -> Self {
        let (path, query) = split_uri(uri);
        Self {
            request_id: RequestId::new(),
            method,
            path,
            query,
            headers: HeaderMap::new(),
            body: None,
            remote_addr: None,
            internal: false,
            target: OnceCell::new(),
        }
    }

    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: &str) -> Self {
        Self::new(Method::POST, uri)
    }

    /// Mark the request as an internal self-call.
    pub(crate) fn into_internal(mut self) -> Self {
        self.internal = true;
        self
    }

    /// Set a header. Invalid names or values are dropped with a warning.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                if name.as_str() == REQUEST_ID_HEADER {
                    self.request_id = RequestId::from_header_or_new(value.to_str().ok());
                }
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Dropping invalid request header"),
        }
    }

    #[must_use]
    pub fn accept(self, value: &str) -> Self {
        self.header(ACCEPT.as_str(), value)
    }

    #[must_use]
    pub fn host(self, value: &str) -> Self {
        self.header(HOST.as_str(), value)
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn remote_addr(mut self, addr: IpAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    #[must_use]
    pub fn is_internal(&self) -> bool {
        self.internal
    }

    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        find_param(&self.query, name)
    }

    /// Raw Accept header value.
    #[must_use]
    pub fn accept_header(&self) -> Option<&str> {
        self.get_header(ACCEPT.as_str())
    }

    /// Host header without port, lowercased.
    #[must_use]
    pub fn host_name(&self) -> Option<String> {
        let raw = self.get_header(HOST.as_str())?;
        let host = match raw.rsplit_once(':') {
            // Keep bracketed IPv6 literals intact.
            Some((h, port)) if !h.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => h,
            _ => raw,
        };
        Some(host.trim().to_ascii_lowercase())
    }

    /// Origin-form URI rebuilt from path and query.
    #[must_use]
    pub fn uri(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.path, query)
    }

    pub(crate) fn target_cell(&self) -> &OnceCell<Option<Arc<Target>>> {
        &self.target
    }
}

/// Split `/path?a=1&b=2` into a normalized path and decoded query params.
fn split_uri(uri: &str) -> (String, ParamVec) {
    let (path, query) = match uri.split_once('?') {
        Some((p, q)) => (p, q),
        None => (uri, ""),
    };
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    let params = url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned()))
        .collect();
    (path, params)
}
