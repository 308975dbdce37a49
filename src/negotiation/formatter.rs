use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::request::ApiRequest;

/// Renders a handler result for one negotiated format.
pub trait Formatter: Send + Sync {
    /// Content type for a response rendered for `req`.
    fn content_type(&self, req: &ApiRequest) -> String;

    fn encode(&self, body: &Value, req: &ApiRequest) -> anyhow::Result<Vec<u8>>;
}

/// `application/json`. A bare string payload is wrapped as `{"message": ...}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFormatter;

impl JsonFormatter {
    fn shape(body: &Value) -> Value {
        match body {
            Value::String(message) => json!({ "message": message }),
            other => other.clone(),
        }
    }
}

impl Formatter for JsonFormatter {
    fn content_type(&self, _req: &ApiRequest) -> String {
        "application/json".to_string()
    }

    fn encode(&self, body: &Value, _req: &ApiRequest) -> anyhow::Result<Vec<u8>> {
        Ok(serde_json::to_vec(&Self::shape(body))?)
    }
}

/// JSON with padding. Wraps the JSON payload in `callback(...)` when the
/// configured query parameter names a valid JavaScript identifier; otherwise
/// behaves exactly like [`JsonFormatter`].
#[derive(Debug, Clone)]
pub struct JsonpFormatter {
    callback_param: String,
}

impl JsonpFormatter {
    pub fn new(callback_param: impl Into<String>) -> Self {
        Self {
            callback_param: callback_param.into(),
        }
    }

    fn callback<'a>(&self, req: &'a ApiRequest) -> Option<&'a str> {
        req.get_query_param(&self.callback_param).filter(|cb| {
            !cb.is_empty()
                && cb
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.')
        })
    }
}

impl Formatter for JsonpFormatter {
    fn content_type(&self, req: &ApiRequest) -> String {
        if self.callback(req).is_some() {
            "application/javascript".to_string()
        } else {
            JsonFormatter.content_type(req)
        }
    }

    fn encode(&self, body: &Value, req: &ApiRequest) -> anyhow::Result<Vec<u8>> {
        let json = JsonFormatter.encode(body, req)?;
        match self.callback(req) {
            Some(cb) => {
                let mut out = Vec::with_capacity(json.len() + cb.len() + 3);
                out.extend_from_slice(cb.as_bytes());
                out.push(b'(');
                out.extend_from_slice(&json);
                out.extend_from_slice(b");");
                Ok(out)
            }
            None => Ok(json),
        }
    }
}

/// Formatters keyed by format name. Built once at startup and owned by the
/// router.
#[derive(Clone, Default)]
pub struct FormatterRegistry {
    formatters: HashMap<String, Arc<dyn Formatter>>,
}

impl FormatterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `json` and `jsonp` registered.
    #[must_use]
    pub fn with_defaults(jsonp_callback: &str) -> Self {
        let mut registry = Self::new();
        registry.register("json", Arc::new(JsonFormatter));
        registry.register("jsonp", Arc::new(JsonpFormatter::new(jsonp_callback)));
        registry
    }

    /// Register (or replace) the formatter for `format`.
    pub fn register(&mut self, format: &str, formatter: Arc<dyn Formatter>) {
        self.formatters.insert(format.to_string(), formatter);
    }

    #[must_use]
    pub fn get(&self, format: &str) -> Option<&Arc<dyn Formatter>> {
        self.formatters.get(format)
    }

    #[must_use]
    pub fn formats(&self) -> Vec<&str> {
        let mut formats: Vec<&str> = self.formatters.keys().map(String::as_str).collect();
        formats.sort_unstable();
        formats
    }
}
