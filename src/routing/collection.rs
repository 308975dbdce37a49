use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use tracing::warn;

use super::radix::{Lookup, RadixTree};
use super::route::{Route, ThrottleRef};
use super::has_segment_prefix;

/// Per-version options shared by every route of a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionOptions {
    pub prefix: Option<String>,
    pub domain: Option<String>,
    /// Default for routes that do not set `protected` themselves.
    pub protected: bool,
    pub scopes: Vec<String>,
    pub throttle: Option<ThrottleRef>,
}

impl CollectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn prefix(mut self, prefix: &str) -> Self {
        let trimmed = prefix.trim_matches('/');
        self.prefix = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    #[must_use]
    pub fn domain(mut self, domain: &str) -> Self {
        self.domain = Some(domain.to_ascii_lowercase());
        self
    }

    #[must_use]
    pub fn protected(mut self, protected: bool) -> Self {
        self.protected = protected;
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

    #[must_use]
    pub fn limit(mut self, limit: u64, window_secs: u64) -> Self {
        self.throttle = Some(ThrottleRef::Inline { limit, window_secs });
        self
    }

    #[must_use]
    pub fn throttle(mut self, name: &str) -> Self {
        self.throttle = Some(ThrottleRef::Named(name.to_string()));
        self
    }
}

/// The routes of exactly one API version.
#[derive(Clone)]
pub struct RouteCollection {
    version: String,
    options: CollectionOptions,
    routes: Vec<Arc<Route>>,
    tree: RadixTree,
    names: HashMap<String, Arc<Route>>,
    actions: HashMap<String, Arc<Route>>,
}

impl RouteCollection {
    pub fn new(version: &str, options: CollectionOptions) -> Self {
        Self {
            version: version.to_string(),
            options,
            routes: Vec::new(),
            tree: RadixTree::new(),
            names: HashMap::new(),
            actions: HashMap::new(),
        }
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn options(&self) -> &CollectionOptions {
        &self.options
    }

    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.options.prefix.as_deref()
    }

    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.options.domain.as_deref()
    }

    /// Routes in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.routes.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Add a route, inheriting unset attributes from the collection options.
    ///
    /// A later route registered for the same method and path replaces the
    /// earlier one in the match tree.
    pub fn add(&mut self, route: &Route) -> Arc<Route> {
        let route = Arc::new(route.inherit(&self.version, &self.options));
        let path = route.full_path();
        for method in route.methods() {
            if self
                .tree
                .insert(method.clone(), &path, Arc::clone(&route))
                .is_some()
            {
                warn!(
                    version = %self.version,
                    method = %method,
                    path = %path,
                    "Route registered twice; later registration wins"
                );
            }
        }
        if let Some(name) = route.route_name() {
            self.names
                .entry(name.to_string())
                .or_insert_with(|| Arc::clone(&route));
        }
        if let Some(action) = route.action_name() {
            self.actions
                .entry(action.to_string())
                .or_insert_with(|| Arc::clone(&route));
        }
        self.routes.push(Arc::clone(&route));
        route
    }

    /// Whether this collection's domain or prefix scopes the request.
    ///
    /// A collection declaring neither matches any path.
    #[must_use]
    pub fn matches_request(&self, host: Option<&str>, path: &str) -> bool {
        match (self.domain(), self.prefix()) {
            (None, None) => true,
            (domain, prefix) => {
                domain.is_some_and(|d| host == Some(d))
                    || prefix.is_some_and(|p| has_segment_prefix(path, p))
            }
        }
    }

    /// Match a route by method and path.
    ///
    /// Routes pinned to a domain only match requests for that host.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str, host: Option<&str>) -> Lookup {
        match self.tree.lookup(method, path) {
            Lookup::Found(route, params) => match route.domain_name() {
                Some(domain) if host != Some(domain) => Lookup::NotFound,
                _ => Lookup::Found(route, params),
            },
            other => other,
        }
    }

    #[must_use]
    pub fn find_named(&self, name: &str) -> Option<&Arc<Route>> {
        self.names.get(name)
    }

    #[must_use]
    pub fn find_action(&self, action: &str) -> Option<&Arc<Route>> {
        self.actions.get(action)
    }
}
