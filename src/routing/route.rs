use std::fmt;
use std::sync::Arc;

use http::Method;

use super::collection::CollectionOptions;
use crate::error::ApiError;
use crate::handler::{Context, Handler};
use crate::response::HandlerResponse;

/// Rate-limit policy attached to a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrottleRef {
    /// A throttle registered with the resolver under this name.
    Named(String),
    /// Ad-hoc limit scoped to the route's path.
    Inline { limit: u64, window_secs: u64 },
}

/// A single endpoint definition.
///
/// Routes are built before serving and never mutated afterwards. Attributes
/// left unset (`protected`, `scopes`, `throttle`, `prefix`, `domain`) are
/// inherited from the owning collection when the route is registered.
#[derive(Clone)]
pub struct Route {
    methods: Vec<Method>,
    uri: String,
    handler: Arc<dyn Handler>,
    versions: Vec<String>,
    domain: Option<String>,
    prefix: Option<String>,
    protected: Option<bool>,
    scopes: Vec<String>,
    throttle: Option<ThrottleRef>,
    name: Option<String>,
    action: Option<String>,
}

impl Route {
    /// Route served by a closure or function. Use
    /// [`with_handler`](Self::with_handler) for other [`Handler`] types.
    pub fn new<F>(methods: impl IntoIterator<Item = Method>, uri: &str, handler: F) -> Self
    where
        F: Fn(&mut Context<'_>) -> Result<HandlerResponse, ApiError> + Send + Sync + 'static,
    {
        Self::with_handler(methods, uri, Arc::new(handler))
    }

    pub fn with_handler(
        methods: impl IntoIterator<Item = Method>,
        uri: &str,
        handler: Arc<dyn Handler>,
    ) -> Self {
        Self {
            methods: methods.into_iter().collect(),
            uri: normalize_uri(uri),
            handler,
            versions: Vec::new(),
            domain: None,
            prefix: None,
            protected: None,
            scopes: Vec::new(),
            throttle: None,
            name: None,
            action: None,
        }
    }

    pub fn get<F>(uri: &str, handler: F) -> Self
    where
        F: Fn(&mut Context<'_>) -> Result<HandlerResponse, ApiError> + Send + Sync + 'static,
    {
        Self::new([Method::GET], uri, handler)
    }

    pub fn post<F>(uri: &str, handler: F) -> Self
    where
        F: Fn(&mut Context<'_>) -> Result<HandlerResponse, ApiError> + Send + Sync + 'static,
    {
        Self::new([Method::POST], uri, handler)
    }

    pub fn put<F>(uri: &str, handler: F) -> Self
    where
        F: Fn(&mut Context<'_>) -> Result<HandlerResponse, ApiError> + Send + Sync + 'static,
    {
        Self::new([Method::PUT], uri, handler)
    }

    pub fn patch<F>(uri: &str, handler: F) -> Self
    where
        F: Fn(&mut Context<'_>) -> Result<HandlerResponse, ApiError> + Send + Sync + 'static,
    {
        Self::new([Method::PATCH], uri, handler)
    }

    pub fn delete<F>(uri: &str, handler: F) -> Self
    where
        F: Fn(&mut Context<'_>) -> Result<HandlerResponse, ApiError> + Send + Sync + 'static,
    {
        Self::new([Method::DELETE], uri, handler)
    }

    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Controller-style action identifier, e.g. `"UserController@show"`.
    #[must_use]
    pub fn action(mut self, action: &str) -> Self {
        self.action = Some(action.to_string());
        self
    }

    /// Additional versions this route belongs to.
    #[must_use]
    pub fn versions<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for version in versions {
            self.add_version(version.into());
        }
        self
    }

    #[must_use]
    pub fn domain(mut self, domain: &str) -> Self {
        self.domain = Some(domain.to_ascii_lowercase());
        self
    }

    #[must_use]
    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    #[must_use]
    pub fn protected(mut self, protected: bool) -> Self {
        self.protected = Some(protected);
        self
    }

    #[must_use]
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Inline limit of `limit` requests per `window_secs`.
    #[must_use]
    pub fn limit(mut self, limit: u64, window_secs: u64) -> Self {
        self.throttle = Some(ThrottleRef::Inline { limit, window_secs });
        self
    }

    /// Use the throttle registered under `name`.
    #[must_use]
    pub fn throttle(mut self, name: &str) -> Self {
        self.throttle = Some(ThrottleRef::Named(name.to_string()));
        self
    }

    pub(crate) fn add_version(&mut self, version: String) {
        if !self.versions.contains(&version) {
            self.versions.push(version);
        }
    }

    /// Copy of this route with unset attributes filled from `options`.
    pub(crate) fn inherit(&self, version: &str, options: &CollectionOptions) -> Route {
        let mut route = self.clone();
        route.add_version(version.to_string());
        if route.protected.is_none() {
            route.protected = Some(options.protected);
        }
        if route.scopes.is_empty() {
            route.scopes = options.scopes.clone();
        }
        if route.throttle.is_none() {
            route.throttle = options.throttle.clone();
        }
        if route.prefix.is_none() && route.domain.is_none() {
            route.prefix = options.prefix.clone();
            route.domain = options.domain.clone();
        }
        route
    }

    #[must_use]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// URI as registered, without any prefix.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Prefix plus URI: the path this route answers on.
    #[must_use]
    pub fn full_path(&self) -> String {
        match &self.prefix {
            Some(prefix) => super::join_prefix(prefix, &self.uri),
            None => self.uri.clone(),
        }
    }

    #[must_use]
    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    #[must_use]
    pub fn version_list(&self) -> &[String] {
        &self.versions
    }

    #[must_use]
    pub fn domain_name(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    #[must_use]
    pub fn prefix_path(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    #[must_use]
    pub fn is_protected(&self) -> bool {
        self.protected.unwrap_or(false)
    }

    #[must_use]
    pub fn scope_list(&self) -> &[String] {
        &self.scopes
    }

    #[must_use]
    pub fn throttle_ref(&self) -> Option<&ThrottleRef> {
        self.throttle.as_ref()
    }

    #[must_use]
    pub fn route_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn action_name(&self) -> Option<&str> {
        self.action.as_deref()
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("methods", &self.methods)
            .field("uri", &self.uri)
            .field("versions", &self.versions)
            .field("domain", &self.domain)
            .field("prefix", &self.prefix)
            .field("protected", &self.protected)
            .field("scopes", &self.scopes)
            .field("throttle", &self.throttle)
            .field("name", &self.name)
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}

fn normalize_uri(uri: &str) -> String {
    let trimmed = uri.trim_matches('/');
    format!("/{trimmed}")
}
