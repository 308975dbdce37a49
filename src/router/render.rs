//! Error bodies and entity tags.

use http::StatusCode;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::error::ApiError;

/// Structured error body: `{message, errors?, code?, debug?}`.
///
/// Fatal errors never leak their message unless `debug` is set.
pub(crate) fn error_body(
    err: &ApiError,
    status: StatusCode,
    debug: bool,
    call_stack: &[String],
) -> Value {
    let message = match err {
        ApiError::Fatal(_) if !debug => String::new(),
        other => other.to_string(),
    };
    let message = if message.is_empty() {
        match status.canonical_reason() {
            Some(reason) if matches!(err, ApiError::Fatal(_)) => reason.to_string(),
            Some(reason) => format!("{} {reason}", status.as_u16()),
            None => status.as_u16().to_string(),
        }
    } else {
        message
    };

    let mut body = Map::new();
    body.insert("message".to_string(), Value::String(message));
    if let Some(errors) = err.errors() {
        body.insert("errors".to_string(), errors.clone());
    }
    if let Some(code) = err.code() {
        body.insert("code".to_string(), json!(code));
    }
    if debug {
        body.insert(
            "debug".to_string(),
            json!({
                "kind": format!("{:?}", err.kind()),
                "source_chain": source_chain(err),
                "call_stack": call_stack,
            }),
        );
    }
    Value::Object(body)
}

fn source_chain(err: &ApiError) -> Vec<String> {
    match err {
        ApiError::Fatal(inner) => inner.chain().map(ToString::to_string).collect(),
        other => vec![other.to_string()],
    }
}

/// Strong entity tag over the encoded body.
pub(crate) fn etag(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("\"{hex}\"")
}

/// Whether an `If-None-Match` header value matches `etag`.
///
/// Weak validators compare equal to their strong counterpart, as GET
/// requests use weak comparison.
pub(crate) fn if_none_match(header: Option<&str>, etag: &str) -> bool {
    let Some(header) = header else {
        return false;
    };
    header.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || candidate.strip_prefix("W/").unwrap_or(candidate) == etag
    })
}
