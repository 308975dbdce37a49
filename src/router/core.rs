use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::header::{ALLOW, CONTENT_TYPE, ETAG, IF_NONE_MATCH};
use http::{HeaderValue, Method, StatusCode};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::exception::ExceptionHandlers;
use super::render;
use crate::cancel::CancellationToken;
use crate::clock::SystemClock;
use crate::config::{ApiConfig, AppliesTo};
use crate::dispatcher::{InternalDispatcher, RequestScope};
use crate::error::{allow_header, ApiError, ErrorKind};
use crate::handler::Context;
use crate::ids::REQUEST_ID_HEADER;
use crate::middleware::Middleware;
use crate::negotiation::{Accept, AcceptParser, AcceptSource, Formatter, FormatterRegistry, JsonFormatter};
use crate::request::{ApiRequest, ParamVec};
use crate::response::{ApiResponse, HandlerResponse, ResponseBody};
use crate::routing::{CollectionOptions, Lookup, Route, RouteCollection, RouteRegistry};
use crate::security::{Authenticator, Identity};
use crate::throttle::{InMemoryCache, Throttle, ThrottleCondition, ThrottleDecision, ThrottleResolver};

/// Handlers slower than this are logged at `warn!`.
const SLOW_HANDLER: Duration = Duration::from_millis(1);

/// Version label of the collection holding non-API routes.
const PLAIN_VERSION: &str = "unversioned";

/// Memoized answer to "does this request target the API?".
///
/// Holds the lenient negotiation result, the collection whose domain or
/// prefix scoped the request, and that collection's lookup result so the
/// dispatch stage does not match twice.
#[derive(Debug, Clone)]
pub struct Target {
    accept: Accept,
    collection: String,
    lookup: Lookup,
}

impl Target {
    #[must_use]
    pub fn accept(&self) -> &Accept {
        &self.accept
    }

    /// Version of the collection that claimed the request.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }
}

/// Outcome of a successful route invocation, before formatting.
struct Invoked {
    response: HandlerResponse,
    decision: Option<ThrottleDecision>,
}

/// Versioned API router.
///
/// Requests whose domain or prefix is claimed by a registered collection (and
/// whose method and path match one of its routes) go through negotiation,
/// protection, rate limiting and formatting. Everything else is served by
/// plain routes with the body passed through unchanged.
pub struct Router {
    negotiator: AcceptParser,
    registry: RouteRegistry,
    plain: RouteCollection,
    formatters: FormatterRegistry,
    throttles: Option<ThrottleResolver>,
    authenticator: Option<Arc<dyn Authenticator>>,
    exception_handlers: ExceptionHandlers,
    middlewares: Vec<Arc<dyn Middleware>>,
    default_options: CollectionOptions,
    strict: bool,
    debug: bool,
    conditional_requests: bool,
}

impl Router {
    #[must_use]
    pub fn builder(negotiator: AcceptParser) -> RouterBuilder {
        RouterBuilder::new(negotiator)
    }

    #[must_use]
    pub fn negotiator(&self) -> &AcceptParser {
        &self.negotiator
    }

    #[must_use]
    pub fn registry(&self) -> &RouteRegistry {
        &self.registry
    }

    #[must_use]
    pub fn formatters(&self) -> &FormatterRegistry {
        &self.formatters
    }

    #[must_use]
    pub fn throttles(&self) -> Option<&ThrottleResolver> {
        self.throttles.as_ref()
    }

    /// Register a route collection for `version`.
    ///
    /// Options declaring neither a prefix nor a domain pick up the router's
    /// defaults.
    pub fn register_version(&mut self, version: &str, options: CollectionOptions, routes: Vec<Route>) {
        let mut options = options;
        if options.prefix.is_none() && options.domain.is_none() {
            options.prefix.clone_from(&self.default_options.prefix);
            options.domain.clone_from(&self.default_options.domain);
        }
        self.registry.register(version, options, routes);
    }

    /// Register a non-API route.
    pub fn route(&mut self, route: Route) {
        self.plain.add(&route);
    }

    /// URL of a named route, preferring the default version.
    pub fn url_for(&self, name: &str, params: &[(&str, &str)]) -> Result<String, ApiError> {
        self.registry
            .url_for(name, params, self.negotiator.default_version())
    }

    /// Start an internal call outside of a handler, within `scope`.
    pub fn internal<'a>(&'a self, scope: &'a mut RequestScope) -> InternalDispatcher<'a> {
        InternalDispatcher::new(self, scope)
    }

    /// Log every registered route.
    pub fn dump_routes(&self) {
        let collections = self
            .registry
            .collections()
            .chain(std::iter::once(&self.plain));
        for collection in collections {
            info!(
                version = %collection.version(),
                prefix = ?collection.prefix(),
                domain = ?collection.domain(),
                routes = collection.len(),
                "Route collection"
            );
            for route in collection.routes() {
                let methods: Vec<&str> = route.methods().iter().map(Method::as_str).collect();
                info!(
                    version = %collection.version(),
                    methods = ?methods,
                    path = %route.full_path(),
                    name = ?route.route_name(),
                    action = ?route.action_name(),
                    protected = route.is_protected(),
                    "Route"
                );
            }
        }
    }

    /// Whether `req` targets the versioned API.
    #[must_use]
    pub fn is_api_request(&self, req: &ApiRequest) -> bool {
        self.target(req).is_some()
    }

    /// The memoized API target of `req`, resolving it on first use.
    #[must_use]
    pub fn target(&self, req: &ApiRequest) -> Option<Arc<Target>> {
        req.target_cell()
            .get_or_init(|| self.resolve_target(req))
            .clone()
    }

    fn resolve_target(&self, req: &ApiRequest) -> Option<Arc<Target>> {
        let accept = self.negotiator.parse(req.accept_header());
        let host = req.host_name();
        let primary = self
            .registry
            .collection(&accept.version)
            .or_else(|| self.registry.collection(self.negotiator.default_version()));
        let primary_version = primary.map(RouteCollection::version);
        let others = self
            .registry
            .collections()
            .filter(|c| Some(c.version()) != primary_version);

        for collection in primary.into_iter().chain(others) {
            if !collection.matches_request(host.as_deref(), &req.path) {
                continue;
            }
            let lookup = collection.match_route(&req.method, &req.path, host.as_deref());
            if !matches!(lookup, Lookup::NotFound) {
                return Some(Arc::new(Target {
                    accept,
                    collection: collection.version().to_string(),
                    lookup,
                }));
            }
        }
        None
    }

    /// Dispatch an external request.
    pub fn dispatch(&self, req: ApiRequest) -> ApiResponse {
        self.dispatch_with(req, CancellationToken::new())
    }

    /// Dispatch an external request under a caller-supplied cancellation
    /// token.
    pub fn dispatch_with(&self, req: ApiRequest, cancel: CancellationToken) -> ApiResponse {
        let started = Instant::now();
        let early = self.middlewares.iter().find_map(|mw| mw.before(&req));
        let mut response = match early {
            Some(response) => response,
            None => {
                let mut scope = RequestScope::new(req.request_id, cancel);
                match self.target(&req) {
                    Some(target) => self.respond_api(&req, &target, &mut scope),
                    None => self.respond_plain(&req, &mut scope),
                }
            }
        };
        if let Ok(value) = HeaderValue::from_str(&req.request_id.to_string()) {
            response.headers.insert(REQUEST_ID_HEADER, value);
        }
        let latency = started.elapsed();
        for mw in &self.middlewares {
            mw.after(&req, &mut response, latency);
        }
        response
    }

    /// Re-enter the router for an internal sub-request. Errors are returned
    /// to the caller unrendered.
    pub(crate) fn dispatch_internal(
        &self,
        req: ApiRequest,
        scope: &mut RequestScope,
    ) -> Result<HandlerResponse, ApiError> {
        scope.cancellation().check()?;
        let result = match self.target(&req) {
            Some(target) => self.run_api(&req, &target, scope),
            None => self.run_plain(&req, scope),
        };
        match result {
            Ok(invoked) => Ok(invoked.response),
            Err(err) => {
                debug!(
                    request_id = %req.request_id,
                    method = %req.method,
                    path = %req.path,
                    internal = true,
                    error = %err,
                    "Internal request failed; returning error to caller"
                );
                Err(err)
            }
        }
    }

    fn respond_api(&self, req: &ApiRequest, target: &Target, scope: &mut RequestScope) -> ApiResponse {
        let format = target.accept.format.clone();
        let response = self
            .run_api(req, target, scope)
            .and_then(|invoked| self.render(req, &format, invoked));
        match response {
            Ok(response) => response,
            Err(err) => self.render_error(req, Some(&format), err, scope),
        }
    }

    fn respond_plain(&self, req: &ApiRequest, scope: &mut RequestScope) -> ApiResponse {
        match self.run_plain(req, scope) {
            Ok(Invoked { response, .. }) => {
                let bodiless = req.method == Method::HEAD || is_bodiless(req, &response);
                let headers = response.headers;
                let body = if bodiless {
                    ResponseBody::Empty
                } else {
                    ResponseBody::Raw(response.body)
                };
                ApiResponse::new(response.status, headers, body)
            }
            Err(err) => self.render_error(req, None, err, scope),
        }
    }

    fn run_api(
        &self,
        req: &ApiRequest,
        target: &Target,
        scope: &mut RequestScope,
    ) -> Result<Invoked, ApiError> {
        scope.cancellation().check()?;
        let accept = if self.strict {
            self.negotiator.parse_strict(req.accept_header())?
        } else {
            target.accept.clone()
        };
        log_stage(req, Some(&accept), "negotiated");

        let version = if self.registry.has_version(&accept.version) {
            accept.version.clone()
        } else if accept.source == AcceptSource::Default {
            target.collection.clone()
        } else {
            return Err(ApiError::UnknownVersion {
                version: accept.version,
            });
        };

        let host = req.host_name();
        let collection = self
            .registry
            .resolve_collection(host.as_deref(), &req.path, &version)
            .ok_or_else(|| ApiError::NotFound {
                path: req.path.clone(),
            })?;
        let lookup = if collection.version() == target.collection {
            target.lookup.clone()
        } else {
            collection.match_route(&req.method, &req.path, host.as_deref())
        };
        log_stage(req, Some(&accept), "resolved");

        if !req.is_internal() && self.formatters.get(&accept.format).is_none() {
            return Err(ApiError::NotAcceptable {
                format: accept.format,
            });
        }
        self.run_route(req, lookup, Some(&accept), scope)
    }

    fn run_plain(&self, req: &ApiRequest, scope: &mut RequestScope) -> Result<Invoked, ApiError> {
        scope.cancellation().check()?;
        let host = req.host_name();
        let lookup = self.plain.match_route(&req.method, &req.path, host.as_deref());
        self.run_route(req, lookup, None, scope)
    }

    fn run_route(
        &self,
        req: &ApiRequest,
        lookup: Lookup,
        accept: Option<&Accept>,
        scope: &mut RequestScope,
    ) -> Result<Invoked, ApiError> {
        let (route, params) = match lookup {
            Lookup::Found(route, params) => (route, params),
            Lookup::MethodNotAllowed(allowed) if req.method == Method::OPTIONS => {
                return Ok(Invoked {
                    response: HandlerResponse::new(StatusCode::OK, Value::Null)
                        .with_header(ALLOW.as_str(), &allow_header(&allowed)),
                    decision: None,
                });
            }
            Lookup::MethodNotAllowed(allowed) => {
                return Err(ApiError::MethodNotAllowed { allowed });
            }
            Lookup::NotFound => {
                return Err(ApiError::NotFound {
                    path: req.path.clone(),
                });
            }
        };

        // Plain routes skip authentication, authorization and throttling.
        let api = accept.is_some();
        let identity = if req.is_internal() {
            scope.effective_identity().cloned()
        } else if api {
            self.authenticator.as_ref().and_then(|a| a.identify(req))
        } else {
            None
        };
        if api {
            authorize(&route, identity.as_ref())?;
            log_stage(req, accept, "authorized");
        }

        let decision = match (&self.throttles, api && !req.is_internal()) {
            (Some(throttles), true) => {
                throttles.evaluate(req, identity.as_ref(), Some(route.as_ref()), scope.cancellation())?
            }
            _ => None,
        };
        if let Some(decision) = &decision {
            scope.record_throttle(decision.clone());
            if !decision.allowed {
                return Err(ApiError::RateLimitExceeded {
                    decision: decision.clone(),
                });
            }
        }

        if !req.is_internal() {
            scope.set_outer(identity.clone(), accept.map(|a| a.format.clone()));
        }
        scope.cancellation().check()?;
        log_stage(req, accept, "dispatching");

        let response = self.invoke(req, &route, &params, accept, identity.as_ref(), scope)?;
        Ok(Invoked { response, decision })
    }

    fn invoke(
        &self,
        req: &ApiRequest,
        route: &Arc<Route>,
        params: &ParamVec,
        accept: Option<&Accept>,
        identity: Option<&Identity>,
        scope: &mut RequestScope,
    ) -> Result<HandlerResponse, ApiError> {
        let started = Instant::now();
        let outcome = {
            let mut cx = Context {
                router: self,
                request: req,
                route,
                params,
                version: accept.map(|a| a.version.as_str()),
                format: accept.map(|a| a.format.as_str()),
                identity,
                scope: &mut *scope,
            };
            panic::catch_unwind(AssertUnwindSafe(|| route.handler().handle(&mut cx)))
        };
        let elapsed = started.elapsed();
        if elapsed > SLOW_HANDLER {
            warn!(
                request_id = %req.request_id,
                method = %req.method,
                path = %req.path,
                route = %route.full_path(),
                duration_us = elapsed.as_micros(),
                internal = req.is_internal(),
                "Slow handler invocation detected"
            );
        }

        match outcome {
            Ok(result) => result,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic payload".to_string());
                error!(
                    request_id = %req.request_id,
                    route = %route.full_path(),
                    panic = %message,
                    "Handler panicked"
                );
                Err(ApiError::Fatal(anyhow::anyhow!("handler panicked: {message}")))
            }
        }
    }

    /// Formatter for `format`, else the default format's, else JSON.
    fn formatter(&self, format: Option<&str>) -> &dyn Formatter {
        format
            .and_then(|f| self.formatters.get(f))
            .or_else(|| self.formatters.get(self.negotiator.default_format()))
            .map_or(&JsonFormatter as &dyn Formatter, |f| f.as_ref())
    }

    fn render(&self, req: &ApiRequest, format: &str, invoked: Invoked) -> Result<ApiResponse, ApiError> {
        let Invoked { response, decision } = invoked;
        let bodiless = is_bodiless(req, &response);
        let mut headers = response.headers;
        if let Some(decision) = &decision {
            decision.apply_headers(&mut headers);
        }
        let status = response.status;
        if bodiless {
            return Ok(ApiResponse::new(status, headers, ResponseBody::Empty));
        }

        let formatter = self.formatter(Some(format));
        let bytes = formatter.encode(&response.body, req)?;
        if !headers.contains_key(CONTENT_TYPE) {
            if let Ok(value) = HeaderValue::from_str(&formatter.content_type(req)) {
                headers.insert(CONTENT_TYPE, value);
            }
        }

        let cacheable = matches!(req.method, Method::GET | Method::HEAD) && status == StatusCode::OK;
        if self.conditional_requests && cacheable && !headers.contains_key(ETAG) {
            let tag = render::etag(&bytes);
            if let Ok(value) = HeaderValue::from_str(&tag) {
                headers.insert(ETAG, value);
            }
            if render::if_none_match(req.get_header(IF_NONE_MATCH.as_str()), &tag) {
                debug!(request_id = %req.request_id, etag = %tag, "Conditional request matched");
                headers.remove(CONTENT_TYPE);
                return Ok(ApiResponse::new(StatusCode::NOT_MODIFIED, headers, ResponseBody::Empty));
            }
        }

        let body = if req.method == Method::HEAD {
            ResponseBody::Empty
        } else {
            ResponseBody::Encoded(bytes)
        };
        log_stage(req, None, "responding");
        Ok(ApiResponse::new(status, headers, body))
    }

    /// Central error translation for external requests.
    ///
    /// Custom exception handlers get the first chance; their response is
    /// formatted like a handler result. `format` is `None` for plain
    /// requests, whose error body is passed through unformatted.
    fn render_error(
        &self,
        req: &ApiRequest,
        format: Option<&str>,
        err: ApiError,
        scope: &RequestScope,
    ) -> ApiResponse {
        log_error(req, &err);

        if let Some(handled) = self.exception_handlers.handle(&err) {
            let rendered = match format {
                Some(format) => self.render(
                    req,
                    format,
                    Invoked {
                        response: handled,
                        decision: scope.throttle_decision().cloned(),
                    },
                ),
                None => Ok(ApiResponse::new(
                    handled.status,
                    handled.headers,
                    ResponseBody::Raw(handled.body),
                )),
            };
            match rendered {
                Ok(response) => return response,
                Err(render_err) => {
                    error!(
                        request_id = %req.request_id,
                        error = %render_err,
                        "Custom exception handler response could not be rendered"
                    );
                }
            }
        }

        let status = err.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = render::error_body(&err, status, self.debug, scope.failed_call_stack());
        let mut headers = err.headers();
        if let Some(decision) = scope.throttle_decision() {
            decision.apply_headers(&mut headers);
        }
        let body = match format {
            None => ResponseBody::Raw(body),
            Some(format) => {
                let formatter = self.formatter(Some(format));
                let bytes = match formatter.encode(&body, req) {
                    Ok(bytes) => bytes,
                    Err(encode_err) => {
                        warn!(error = %encode_err, "Falling back to JSON error body");
                        serde_json::to_vec(&body).unwrap_or_default()
                    }
                };
                if let Ok(value) = HeaderValue::from_str(&formatter.content_type(req)) {
                    headers.insert(CONTENT_TYPE, value);
                }
                ResponseBody::Encoded(bytes)
            }
        };
        let body = if req.method == Method::HEAD {
            ResponseBody::Empty
        } else {
            body
        };
        ApiResponse::new(status, headers, body)
    }
}

/// Responses sent without a body whatever the format: 204, 304 and the
/// automatic OPTIONS answer.
fn is_bodiless(req: &ApiRequest, response: &HandlerResponse) -> bool {
    matches!(response.status, StatusCode::NO_CONTENT | StatusCode::NOT_MODIFIED)
        || (req.method == Method::OPTIONS && response.body.is_null())
}

/// Enforce `protected` and required scopes.
fn authorize(route: &Route, identity: Option<&Identity>) -> Result<(), ApiError> {
    let scopes = route.scope_list();
    if !route.is_protected() && scopes.is_empty() {
        return Ok(());
    }
    let Some(identity) = identity else {
        return Err(ApiError::unauthorized("Unauthenticated."));
    };
    let missing = identity.missing_scopes(scopes);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!(
            "Missing required scopes: {}",
            missing.join(", ")
        )))
    }
}

fn log_stage(req: &ApiRequest, accept: Option<&Accept>, stage: &'static str) {
    debug!(
        request_id = %req.request_id,
        method = %req.method,
        path = %req.path,
        version = accept.map(|a| a.version.as_str()),
        format = accept.map(|a| a.format.as_str()),
        internal = req.is_internal(),
        stage,
        "Router stage"
    );
}

fn log_error(req: &ApiRequest, err: &ApiError) {
    let status = err.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!(
            request_id = %req.request_id,
            method = %req.method,
            path = %req.path,
            status = status.as_u16(),
            kind = ?err.kind(),
            error = %err,
            "Request failed"
        );
    } else {
        warn!(
            request_id = %req.request_id,
            method = %req.method,
            path = %req.path,
            status = status.as_u16(),
            kind = ?err.kind(),
            error = %err,
            "Request rejected"
        );
    }
}

/// Builder for [`Router`].
pub struct RouterBuilder {
    negotiator: AcceptParser,
    default_options: CollectionOptions,
    versions: Vec<(String, CollectionOptions, Vec<Route>)>,
    plain: Vec<Route>,
    formatters: FormatterRegistry,
    throttles: Option<ThrottleResolver>,
    authenticator: Option<Arc<dyn Authenticator>>,
    exception_handlers: ExceptionHandlers,
    middlewares: Vec<Arc<dyn Middleware>>,
    strict: bool,
    debug: bool,
    conditional_requests: bool,
}

impl RouterBuilder {
    /// Builder with the `json` and `jsonp` formatters and conditional
    /// requests enabled.
    #[must_use]
    pub fn new(negotiator: AcceptParser) -> Self {
        Self {
            negotiator,
            default_options: CollectionOptions::default(),
            versions: Vec::new(),
            plain: Vec::new(),
            formatters: FormatterRegistry::with_defaults("callback"),
            throttles: None,
            authenticator: None,
            exception_handlers: ExceptionHandlers::new(),
            middlewares: Vec::new(),
            strict: false,
            debug: false,
            conditional_requests: true,
        }
    }

    /// Builder configured from an [`ApiConfig`]. Configured throttles are
    /// backed by an in-memory cache and the system clock.
    pub fn from_config(config: &ApiConfig) -> anyhow::Result<Self> {
        let negotiator = AcceptParser::with_tree(
            &config.standards_tree,
            &config.subtype,
            &config.default_version,
            &config.default_format,
        )?;
        let mut defaults = CollectionOptions::new();
        if let Some(prefix) = &config.prefix {
            defaults = defaults.prefix(prefix);
        }
        if let Some(domain) = &config.domain {
            defaults = defaults.domain(domain);
        }

        let mut resolver = ThrottleResolver::new(Arc::new(InMemoryCache::new()), Arc::new(SystemClock))
            .with_key_prefix(&config.rate_limit.key_prefix);
        for throttle in &config.rate_limit.throttles {
            let condition = match throttle.applies_to {
                AppliesTo::Always => ThrottleCondition::Always,
                AppliesTo::Authenticated => ThrottleCondition::Authenticated,
                AppliesTo::Unauthenticated => ThrottleCondition::Unauthenticated,
            };
            resolver.register(
                Throttle::new(&throttle.name, throttle.limit, throttle.window_secs).when(condition),
            );
        }

        let mut builder = Self::new(negotiator)
            .default_options(defaults)
            .strict(config.strict)
            .debug(config.debug)
            .conditional_requests(config.conditional_requests)
            .throttles(resolver);
        builder.formatters = FormatterRegistry::with_defaults(&config.jsonp_callback);
        Ok(builder)
    }

    /// Prefix/domain applied to collections that declare neither.
    #[must_use]
    pub fn default_options(mut self, options: CollectionOptions) -> Self {
        self.default_options = options;
        self
    }

    #[must_use]
    pub fn register_version(mut self, version: &str, options: CollectionOptions, routes: Vec<Route>) -> Self {
        self.versions.push((version.to_string(), options, routes));
        self
    }

    /// Add a non-API route.
    #[must_use]
    pub fn route(mut self, route: Route) -> Self {
        self.plain.push(route);
        self
    }

    #[must_use]
    pub fn formatter(mut self, format: &str, formatter: Arc<dyn Formatter>) -> Self {
        self.formatters.register(format, formatter);
        self
    }

    #[must_use]
    pub fn throttles(mut self, resolver: ThrottleResolver) -> Self {
        self.throttles = Some(resolver);
        self
    }

    #[must_use]
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    #[must_use]
    pub fn auth_provider(self, provider: crate::security::AuthProvider) -> Self {
        self.authenticator(Arc::new(provider))
    }

    #[must_use]
    pub fn exception_handler<F>(mut self, kind: ErrorKind, handler: F) -> Self
    where
        F: Fn(&ApiError) -> Option<HandlerResponse> + Send + Sync + 'static,
    {
        self.exception_handlers.register(kind, handler);
        self
    }

    #[must_use]
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn conditional_requests(mut self, enabled: bool) -> Self {
        self.conditional_requests = enabled;
        self
    }

    #[must_use]
    pub fn build(self) -> Router {
        let mut router = Router {
            negotiator: self.negotiator,
            registry: RouteRegistry::new(),
            plain: RouteCollection::new(PLAIN_VERSION, CollectionOptions::default()),
            formatters: self.formatters,
            throttles: self.throttles,
            authenticator: self.authenticator,
            exception_handlers: self.exception_handlers,
            middlewares: self.middlewares,
            default_options: self.default_options,
            strict: self.strict,
            debug: self.debug,
            conditional_requests: self.conditional_requests,
        };
        for (version, options, routes) in self.versions {
            router.register_version(&version, options, routes);
        }
        for route in self.plain {
            router.route(route);
        }
        let versions: Vec<&str> = router.registry.versions().collect();
        info!(
            vendor = %router.negotiator.vendor(),
            default_version = %router.negotiator.default_version(),
            versions = ?versions,
            plain_routes = router.plain.len(),
            formats = ?router.formatters.formats(),
            strict = router.strict,
            "Router built"
        );
        router
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("vendor", &self.negotiator.vendor())
            .field("versions", &self.registry.versions().collect::<Vec<_>>())
            .field("plain_routes", &self.plain.len())
            .field("strict", &self.strict)
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}
