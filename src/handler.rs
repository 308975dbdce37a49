//! Handler trait and the per-invocation [`Context`].

use std::sync::Arc;

use serde_json::Value;

use crate::cancel::CancellationToken;
use crate::dispatcher::{InternalDispatcher, RequestScope};
use crate::error::ApiError;
use crate::request::{find_param, ApiRequest, ParamVec};
use crate::response::HandlerResponse;
use crate::router::Router;
use crate::routing::Route;
use crate::security::Identity;

/// Business logic behind a route.
///
/// Any `Fn(&mut Context<'_>) -> Result<HandlerResponse, ApiError>` closure is
/// a handler.
pub trait Handler: Send + Sync {
    fn handle(&self, cx: &mut Context<'_>) -> Result<HandlerResponse, ApiError>;
}

impl<F> Handler for F
where
    F: Fn(&mut Context<'_>) -> Result<HandlerResponse, ApiError> + Send + Sync,
{
    fn handle(&self, cx: &mut Context<'_>) -> Result<HandlerResponse, ApiError> {
        self(cx)
    }
}

/// Everything a handler may consult while serving one request.
///
/// The context owns a mutable borrow of the request scope, which is what lets
/// a handler issue nested internal calls through [`Context::internal`].
pub struct Context<'a> {
    pub(crate) router: &'a Router,
    pub(crate) request: &'a ApiRequest,
    pub(crate) route: &'a Arc<Route>,
    pub(crate) params: &'a ParamVec,
    pub(crate) version: Option<&'a str>,
    pub(crate) format: Option<&'a str>,
    pub(crate) identity: Option<&'a Identity>,
    pub(crate) scope: &'a mut RequestScope,
}

impl<'a> Context<'a> {
    #[must_use]
    pub fn request(&self) -> &ApiRequest {
        self.request
    }

    #[must_use]
    pub fn route(&self) -> &Route {
        self.route
    }

    /// Path parameter captured by a `{name}` segment.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        find_param(self.params, name)
    }

    #[must_use]
    pub fn query(&self, name: &str) -> Option<&str> {
        self.request.get_query_param(name)
    }

    /// Input value by name: query string first, then top-level body field.
    #[must_use]
    pub fn input(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.request.get_query_param(name) {
            return Some(Value::String(value.to_string()));
        }
        self.request.body.as_ref()?.get(name).cloned()
    }

    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.request.body.as_ref()
    }

    /// Negotiated version; `None` for non-API routes.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version
    }

    #[must_use]
    pub fn format(&self) -> Option<&str> {
        self.format
    }

    /// Authenticated (or pretended) consumer.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity
    }

    #[must_use]
    pub fn is_internal(&self) -> bool {
        self.request.is_internal()
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        self.scope.cancellation()
    }

    /// Frames of the internal call stack, outermost first.
    #[must_use]
    pub fn call_stack(&self) -> Vec<String> {
        self.scope.call_stack()
    }

    /// Start an internal self-call against this API.
    pub fn internal(&mut self) -> InternalDispatcher<'_> {
        InternalDispatcher::new(self.router, self.scope)
    }

    /// Pretend to be `identity` for internal calls made later in this request.
    ///
    /// Persists until [`forget`](Self::forget) or the end of the outer
    /// request.
    pub fn be(&mut self, identity: Identity) {
        self.scope.pretend(identity, false);
    }

    /// Pretend to be `identity` for the next internal call only.
    pub fn be_once(&mut self, identity: Identity) {
        self.scope.pretend(identity, true);
    }

    pub fn forget(&mut self) {
        self.scope.forget_pretense();
    }

    /// Build the URL of a named route, resolving across versions.
    pub fn url_for(&self, name: &str, params: &[(&str, &str)]) -> Result<String, ApiError> {
        let version = self
            .version
            .unwrap_or_else(|| self.router.negotiator().default_version());
        self.router.registry().url_for(name, params, version)
    }
}
