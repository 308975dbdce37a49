use http::header::{CONTENT_TYPE, HOST};
use http::Method;
use serde_json::{Map, Value};
use tracing::debug;

use super::stack::{Frame, RequestScope};
use crate::error::ApiError;
use crate::request::ApiRequest;
use crate::response::HandlerResponse;
use crate::router::Router;
use crate::routing::{fill_placeholders, join_prefix, Route};
use crate::security::Identity;

/// Fluent builder for one internal self-call.
///
/// Version, params, headers and body apply to the call being built only; the
/// builder is consumed by the terminal method. Identity pretense set through
/// [`be`](Self::be) lives in the request scope and persists across calls
/// unless [`once`](Self::once) is used.
///
/// ```rust,ignore
/// let user = cx.internal().version("v2").with([("id", 42)]).get("/users/me")?;
/// ```
pub struct InternalDispatcher<'a> {
    router: &'a Router,
    scope: &'a mut RequestScope,
    version: Option<String>,
    params: Vec<(String, Value)>,
    headers: Vec<(String, String)>,
    body: Option<Value>,
    pretense: Option<Identity>,
    once: bool,
}

impl<'a> InternalDispatcher<'a> {
    pub fn new(router: &'a Router, scope: &'a mut RequestScope) -> Self {
        Self {
            router,
            scope,
            version: None,
            params: Vec::new(),
            headers: Vec::new(),
            body: None,
            pretense: None,
            once: false,
        }
    }

    /// Target version; defaults to the configured default version.
    #[must_use]
    pub fn version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    /// Merge parameters. GET, HEAD and DELETE send them as query parameters,
    /// other methods as top-level fields of a JSON body.
    #[must_use]
    pub fn with<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Raw JSON body. Object bodies are merged with [`with`](Self::with) params.
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Pretend to be `identity` for this and later internal calls.
    #[must_use]
    pub fn be(mut self, identity: Identity) -> Self {
        self.pretense = Some(identity);
        self
    }

    /// Limit the pretense to this call. Without [`be`](Self::be), the
    /// scope's persistent pretense is used for this call and then dropped.
    #[must_use]
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    pub fn get(self, uri: &str) -> Result<HandlerResponse, ApiError> {
        self.call(Method::GET, uri)
    }

    pub fn post(self, uri: &str) -> Result<HandlerResponse, ApiError> {
        self.call(Method::POST, uri)
    }

    pub fn put(self, uri: &str) -> Result<HandlerResponse, ApiError> {
        self.call(Method::PUT, uri)
    }

    pub fn patch(self, uri: &str) -> Result<HandlerResponse, ApiError> {
        self.call(Method::PATCH, uri)
    }

    pub fn delete(self, uri: &str) -> Result<HandlerResponse, ApiError> {
        self.call(Method::DELETE, uri)
    }

    pub fn head(self, uri: &str) -> Result<HandlerResponse, ApiError> {
        self.call(Method::HEAD, uri)
    }

    pub fn options(self, uri: &str) -> Result<HandlerResponse, ApiError> {
        self.call(Method::OPTIONS, uri)
    }

    /// Call a named route. When the target version has no such route every
    /// version is searched in registration order.
    pub fn route(self, name: &str, route_params: &[(&str, &str)]) -> Result<HandlerResponse, ApiError> {
        let version = self.target_version();
        let router = self.router;
        let (collection, route) = router
            .registry()
            .find_named(name, &version)
            .ok_or_else(|| ApiError::NotFound {
                path: format!("route named '{name}'"),
            })?;
        self.call_resolved(collection.version().to_string(), &route, route_params)
    }

    /// Call a route by controller action, with the same version fallback as
    /// [`route`](Self::route).
    pub fn action(self, action: &str, route_params: &[(&str, &str)]) -> Result<HandlerResponse, ApiError> {
        let version = self.target_version();
        let router = self.router;
        let (collection, route) = router
            .registry()
            .find_action(action, &version)
            .ok_or_else(|| ApiError::NotFound {
                path: format!("action '{action}'"),
            })?;
        self.call_resolved(collection.version().to_string(), &route, route_params)
    }

    fn call_resolved(
        mut self,
        version: String,
        route: &Route,
        route_params: &[(&str, &str)],
    ) -> Result<HandlerResponse, ApiError> {
        let uri = fill_placeholders(route.uri(), route_params);
        let method = route.methods().first().cloned().unwrap_or(Method::GET);
        self.version = Some(version);
        self.call(method, &uri)
    }

    fn target_version(&self) -> String {
        self.version
            .clone()
            .unwrap_or_else(|| self.router.negotiator().default_version().to_string())
    }

    /// Build the synthetic request and re-enter the router.
    ///
    /// Errors are returned to the caller rather than rendered. The frame is
    /// popped and the pretense restored however the call ends.
    pub fn call(mut self, method: Method, uri: &str) -> Result<HandlerResponse, ApiError> {
        let version = self.target_version();
        let router = self.router;
        let collection = router
            .registry()
            .collection(&version)
            .ok_or_else(|| ApiError::UnknownVersion {
                version: version.clone(),
            })?;

        let uri = match collection.prefix() {
            Some(prefix) => join_prefix(prefix, uri),
            None => join_prefix("", uri),
        };
        let mut request = ApiRequest::new(method.clone(), &uri);

        let query_params = matches!(method, Method::GET | Method::HEAD | Method::DELETE);
        if query_params {
            for (key, value) in &self.params {
                request
                    .query
                    .push((key.as_str().into(), value_to_param(value)));
            }
            request.body = self.body;
        } else {
            request.body = merge_body(self.body, self.params);
        }
        if request.body.is_some() {
            request.set_header(CONTENT_TYPE.as_str(), "application/json");
        }

        let format = self
            .scope
            .outer_format()
            .unwrap_or_else(|| router.negotiator().default_format())
            .to_string();
        let accept = router.negotiator().build(&version, &format);
        request.set_header(http::header::ACCEPT.as_str(), &accept);
        if let Some(domain) = collection.domain() {
            request.set_header(HOST.as_str(), domain);
        }
        for (name, value) in &self.headers {
            request.set_header(name, value);
        }
        let request = request.into_internal();

        let frame = Frame {
            key: format!("{} {}", request.method, request.uri()),
            request_id: request.request_id,
            version: version.clone(),
        };
        debug!(
            request_id = %request.request_id,
            parent_request_id = %self.scope.root_request_id(),
            depth = self.scope.depth() + 1,
            frame = %frame.key,
            version = %version,
            "Internal dispatch"
        );

        match (self.pretense.take(), self.once) {
            (Some(identity), once) => self.scope.pretend(identity, once),
            (None, true) => self.scope.limit_pretense_to_next_call(),
            (None, false) => {}
        }
        let mut guard = self.scope.push(frame)?;
        let result = router.dispatch_internal(request, &mut guard);
        if result.is_err() {
            guard.record_failure();
        }
        result
    }
}

fn value_to_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn merge_body(body: Option<Value>, params: Vec<(String, Value)>) -> Option<Value> {
    if params.is_empty() {
        return body;
    }
    match body {
        None => Some(Value::Object(params.into_iter().collect::<Map<_, _>>())),
        Some(Value::Object(mut map)) => {
            map.extend(params);
            Some(Value::Object(map))
        }
        Some(other) => Some(other),
    }
}
