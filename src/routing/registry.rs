use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::collection::{CollectionOptions, RouteCollection};
use super::route::Route;
use crate::error::ApiError;

/// Version string → collection. Exactly one collection per version; versions
/// compare case-sensitively and exactly.
#[derive(Clone, Default)]
pub struct RouteRegistry {
    collections: Vec<RouteCollection>,
    index: HashMap<String, usize>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `routes` under `version`.
    ///
    /// The first registration of a version fixes its options; later calls
    /// for the same version only add routes. Routes that list additional
    /// versions via [`Route::versions`] are registered into those too, using
    /// the same options when the collection does not exist yet.
    pub fn register(&mut self, version: &str, options: CollectionOptions, routes: Vec<Route>) {
        let count = routes.len();
        self.collection_entry(version, &options);
        for mut route in routes {
            route.add_version(version.to_string());
            for target in route.version_list().to_vec() {
                self.collection_entry(&target, &options).add(&route);
            }
        }
        debug!(version, routes = count, "Registered route collection");
    }

    fn collection_entry(&mut self, version: &str, options: &CollectionOptions) -> &mut RouteCollection {
        let idx = match self.index.get(version) {
            Some(idx) => *idx,
            None => {
                self.collections
                    .push(RouteCollection::new(version, options.clone()));
                let idx = self.collections.len() - 1;
                self.index.insert(version.to_string(), idx);
                idx
            }
        };
        &mut self.collections[idx]
    }

    #[must_use]
    pub fn collection(&self, version: &str) -> Option<&RouteCollection> {
        self.index.get(version).map(|idx| &self.collections[*idx])
    }

    #[must_use]
    pub fn has_version(&self, version: &str) -> bool {
        self.index.contains_key(version)
    }

    /// Collections in registration order.
    pub fn collections(&self) -> impl Iterator<Item = &RouteCollection> {
        self.collections.iter()
    }

    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.collections.iter().map(RouteCollection::version)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// The collection for `version` if its domain or prefix scopes the request.
    #[must_use]
    pub fn resolve_collection(
        &self,
        host: Option<&str>,
        path: &str,
        version: &str,
    ) -> Option<&RouteCollection> {
        self.collection(version)
            .filter(|c| c.matches_request(host, path))
    }

    /// Find a named route, preferring `version` and then every collection in
    /// registration order.
    #[must_use]
    pub fn find_named(&self, name: &str, version: &str) -> Option<(&RouteCollection, Arc<Route>)> {
        self.find_with(version, |c| c.find_named(name))
    }

    /// Find a route by controller action, with the same fallback as
    /// [`find_named`](Self::find_named).
    #[must_use]
    pub fn find_action(&self, action: &str, version: &str) -> Option<(&RouteCollection, Arc<Route>)> {
        self.find_with(version, |c| c.find_action(action))
    }

    fn find_with<'a, F>(&'a self, version: &str, find: F) -> Option<(&'a RouteCollection, Arc<Route>)>
    where
        F: Fn(&'a RouteCollection) -> Option<&'a Arc<Route>>,
    {
        if let Some(collection) = self.collection(version) {
            if let Some(route) = find(collection) {
                return Some((collection, Arc::clone(route)));
            }
        }
        self.collections
            .iter()
            .find_map(|c| find(c).map(|route| (c, Arc::clone(route))))
    }

    /// Build the URL of a named route.
    ///
    /// `{param}` placeholders are replaced by percent-encoded values; params
    /// with no matching placeholder become the query string.
    pub fn url_for(&self, name: &str, params: &[(&str, &str)], version: &str) -> Result<String, ApiError> {
        let (_, route) = self
            .find_named(name, version)
            .ok_or_else(|| ApiError::NotFound {
                path: format!("route named '{name}'"),
            })?;
        Ok(fill_placeholders(&route.full_path(), params))
    }
}

pub(crate) fn fill_placeholders(path: &str, params: &[(&str, &str)]) -> String {
    let mut used = vec![false; params.len()];
    let segments: Vec<String> = path
        .split('/')
        .map(|segment| {
            let Some(key) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
                return segment.to_string();
            };
            match params.iter().position(|(k, _)| *k == key) {
                Some(i) => {
                    used[i] = true;
                    urlencoding::encode(params[i].1).into_owned()
                }
                None => segment.to_string(),
            }
        })
        .collect();
    let mut url = segments.join("/");

    let query: Vec<String> = params
        .iter()
        .zip(&used)
        .filter(|(_, used)| !**used)
        .map(|((k, v), _)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect();
    if !query.is_empty() {
        url.push('?');
        url.push_str(&query.join("&"));
    }
    url
}
