//! Error taxonomy for negotiation, routing, dispatch and rate limiting.
//!
//! Every failure the router can observe is an [`ApiError`]. Variants that map
//! to an HTTP status carry everything needed to render a structured error
//! body; [`ApiError::Fatal`] wraps anything else and renders as a 500.

use std::fmt;

use http::header::ALLOW;
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use serde_json::Value;

use crate::throttle::ThrottleDecision;

/// Errors raised while handling an API request.
#[derive(Debug)]
pub enum ApiError {
    /// The Accept header named a version no collection was registered for.
    UnknownVersion { version: String },
    /// Strict mode rejected a missing or malformed Accept header.
    BadRequest { message: String },
    /// No route matched the path for the negotiated collection.
    NotFound { path: String },
    /// The path matched but not for this method.
    MethodNotAllowed { allowed: Vec<Method> },
    /// No formatter is registered for the negotiated format.
    NotAcceptable { format: String },
    Unauthorized { message: String },
    Forbidden { message: String },
    /// The selected throttle rejected the request.
    RateLimitExceeded { decision: ThrottleDecision },
    /// Validation/domain failure carrying a structured error bag.
    Resource {
        status: StatusCode,
        message: String,
        errors: Value,
        code: i64,
    },
    /// Handler-raised HTTP error with an explicit status.
    Http {
        status: StatusCode,
        message: String,
        code: i64,
        headers: HeaderMap,
    },
    /// The caller's cancellation token fired.
    Cancelled,
    /// Anything without a status code.
    Fatal(anyhow::Error),
}

/// Tag used to key custom exception handlers.
///
/// `Any` matches every error and `Http` matches every error that carries a
/// status code, so they act as supertypes of the concrete kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Any,
    Http,
    UnknownVersion,
    BadRequest,
    NotFound,
    MethodNotAllowed,
    NotAcceptable,
    Unauthorized,
    Forbidden,
    RateLimitExceeded,
    Resource,
    Cancelled,
    Fatal,
}

impl ErrorKind {
    /// Whether an error of this kind (or a subtype of it) is `err`.
    #[must_use]
    pub fn matches(self, err: &ApiError) -> bool {
        match self {
            ErrorKind::Any => true,
            ErrorKind::Http => err.status().is_some(),
            kind => err.kind() == kind,
        }
    }
}

impl ApiError {
    /// 422 resource error with an error bag.
    pub fn resource(message: impl Into<String>, errors: Value) -> Self {
        ApiError::Resource {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: message.into(),
            errors,
            code: 0,
        }
    }

    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError::Http {
            status,
            message: message.into(),
            code: 0,
            headers: HeaderMap::new(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden {
            message: message.into(),
        }
    }

    /// Attach an application error code. Ignored for variants without one.
    #[must_use]
    pub fn with_code(mut self, new_code: i64) -> Self {
        match &mut self {
            ApiError::Resource { code, .. } | ApiError::Http { code, .. } => *code = new_code,
            _ => {}
        }
        self
    }

    /// Override the status of a resource or HTTP error.
    #[must_use]
    pub fn with_status(mut self, new_status: StatusCode) -> Self {
        match &mut self {
            ApiError::Resource { status, .. } | ApiError::Http { status, .. } => {
                *status = new_status;
            }
            _ => {}
        }
        self
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::UnknownVersion { .. } => ErrorKind::UnknownVersion,
            ApiError::BadRequest { .. } => ErrorKind::BadRequest,
            ApiError::NotFound { .. } => ErrorKind::NotFound,
            ApiError::MethodNotAllowed { .. } => ErrorKind::MethodNotAllowed,
            ApiError::NotAcceptable { .. } => ErrorKind::NotAcceptable,
            ApiError::Unauthorized { .. } => ErrorKind::Unauthorized,
            ApiError::Forbidden { .. } => ErrorKind::Forbidden,
            ApiError::RateLimitExceeded { .. } => ErrorKind::RateLimitExceeded,
            ApiError::Resource { .. } => ErrorKind::Resource,
            ApiError::Http { .. } => ErrorKind::Http,
            ApiError::Cancelled => ErrorKind::Cancelled,
            ApiError::Fatal(_) => ErrorKind::Fatal,
        }
    }

    /// HTTP status for recognized errors; `None` for [`ApiError::Fatal`].
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        let status = match self {
            ApiError::UnknownVersion { .. } | ApiError::BadRequest { .. } => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::NotAcceptable { .. } => StatusCode::NOT_ACCEPTABLE,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Resource { status, .. } | ApiError::Http { status, .. } => *status,
            ApiError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Fatal(_) => return None,
        };
        Some(status)
    }

    /// Application code, only when nonzero.
    #[must_use]
    pub fn code(&self) -> Option<i64> {
        match self {
            ApiError::Resource { code, .. } | ApiError::Http { code, .. } if *code != 0 => {
                Some(*code)
            }
            _ => None,
        }
    }

    /// Structured error bag of a resource error.
    #[must_use]
    pub fn errors(&self) -> Option<&Value> {
        match self {
            ApiError::Resource { errors, .. } => Some(errors),
            _ => None,
        }
    }

    /// Headers that must accompany the rendered error.
    #[must_use]
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        match self {
            ApiError::MethodNotAllowed { allowed } => {
                if let Ok(value) = HeaderValue::from_str(&allow_header(allowed)) {
                    headers.insert(ALLOW, value);
                }
            }
            ApiError::RateLimitExceeded { decision } => decision.apply_headers(&mut headers),
            ApiError::Http { headers: extra, .. } => headers.extend(extra.clone()),
            _ => {}
        }
        headers
    }
}

/// Comma-separated method list for an `Allow` header.
#[must_use]
pub fn allow_header(methods: &[Method]) -> String {
    methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::UnknownVersion { version } => {
                write!(f, "The version given was unknown or has no registered routes: {version}")
            }
            ApiError::BadRequest { message }
            | ApiError::Unauthorized { message }
            | ApiError::Forbidden { message } => write!(f, "{message}"),
            ApiError::NotFound { path } => write!(f, "No route matched {path}"),
            ApiError::MethodNotAllowed { allowed } => {
                write!(f, "Method not allowed. Must be one of: {}", allow_header(allowed))
            }
            ApiError::NotAcceptable { format } => write!(
                f,
                "Unable to format response according to Accept header (format '{format}')"
            ),
            ApiError::RateLimitExceeded { .. } => write!(f, "You have exceeded your rate limit."),
            ApiError::Resource { message, .. } | ApiError::Http { message, .. } => {
                write!(f, "{message}")
            }
            ApiError::Cancelled => write!(f, "Request was cancelled before completion"),
            ApiError::Fatal(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Fatal(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Fatal(err)
    }
}
