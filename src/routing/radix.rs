//! Segment radix tree for per-collection route matching.
//!
//! Each node represents one path segment. Static segments match exactly,
//! `{name}` segments match any single segment, and routes are stored at
//! terminal nodes keyed by HTTP method. Static children are tried before
//! parameter children, with backtracking.
//!
//! Unlike a plain "found / not found" lookup, [`RadixTree::lookup`] reports
//! the methods available on a path when the requested method is missing, so
//! the router can answer 405 with an `Allow` header and synthesize OPTIONS.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;

use super::route::Route;
use crate::request::ParamVec;

/// Outcome of matching a method and path against a tree.
#[derive(Debug, Clone)]
pub enum Lookup {
    Found(Arc<Route>, ParamVec),
    /// The path exists but not for the requested method.
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

#[derive(Clone, Default)]
struct RadixNode {
    segment: String,
    routes: HashMap<Method, Arc<Route>>,
    param_name: Option<Arc<str>>,
    children: Vec<RadixNode>,
    /// Routes with different parameter names at the same position get
    /// separate children (`/users/{id}/posts` vs `/users/{user_id}/tags`).
    param_children: Vec<RadixNode>,
}

impl RadixNode {
    fn new(segment: &str) -> Self {
        Self {
            segment: segment.to_string(),
            ..Self::default()
        }
    }

    fn new_param(name: &str) -> Self {
        Self {
            param_name: Some(Arc::from(name)),
            ..Self::default()
        }
    }

    /// Returns the route previously stored for `method`, if any.
    fn insert(&mut self, segments: &[&str], method: Method, route: Arc<Route>) -> Option<Arc<Route>> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.routes.insert(method, route);
        };

        if let Some(name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            if let Some(child) = self
                .param_children
                .iter_mut()
                .find(|c| c.param_name.as_deref() == Some(name))
            {
                return child.insert(remaining, method, route);
            }
            let mut child = RadixNode::new_param(name);
            child.insert(remaining, method, route);
            self.param_children.push(child);
            return None;
        }

        if let Some(child) = self.children.iter_mut().find(|c| c.segment == *segment) {
            return child.insert(remaining, method, route);
        }
        let mut child = RadixNode::new(segment);
        child.insert(remaining, method, route);
        self.children.push(child);
        None
    }

    fn search(&self, segments: &[&str], method: &Method, params: &mut ParamVec) -> Option<Arc<Route>> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.routes.get(method).cloned();
        };

        for child in self.children.iter().filter(|c| c.segment == *segment) {
            if let Some(route) = child.search(remaining, method, params) {
                return Some(route);
            }
        }

        for child in &self.param_children {
            if let Some(name) = &child.param_name {
                params.push((Arc::clone(name), (*segment).to_string()));
                if let Some(route) = child.search(remaining, method, params) {
                    return Some(route);
                }
                params.pop();
            }
        }

        None
    }

    /// Collect the methods of every terminal node matching `segments`.
    fn collect_methods(&self, segments: &[&str], out: &mut Vec<Method>) {
        let Some((segment, remaining)) = segments.split_first() else {
            out.extend(self.routes.keys().cloned());
            return;
        };
        for child in self.children.iter().filter(|c| c.segment == *segment) {
            child.collect_methods(remaining, out);
        }
        for child in &self.param_children {
            child.collect_methods(remaining, out);
        }
    }
}

/// Radix tree holding the routes of one collection.
#[derive(Clone, Default)]
pub struct RadixTree {
    root: RadixNode,
}

impl RadixTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `route` under `path` for `method`, returning any route it replaced.
    pub fn insert(&mut self, method: Method, path: &str, route: Arc<Route>) -> Option<Arc<Route>> {
        let segments = split_segments(path);
        self.root.insert(&segments, method, route)
    }

    /// Match `method` and `path`. A HEAD request falls back to the GET route.
    pub fn lookup(&self, method: &Method, path: &str) -> Lookup {
        let segments = split_segments(path);
        let mut params = ParamVec::new();

        if let Some(route) = self.root.search(&segments, method, &mut params) {
            return Lookup::Found(route, params);
        }
        if *method == Method::HEAD {
            params.clear();
            if let Some(route) = self.root.search(&segments, &Method::GET, &mut params) {
                return Lookup::Found(route, params);
            }
        }

        let mut allowed = Vec::new();
        self.root.collect_methods(&segments, &mut allowed);
        if allowed.is_empty() {
            Lookup::NotFound
        } else {
            Lookup::MethodNotAllowed(canonical_methods(allowed))
        }
    }
}

/// Split a path on `/`, dropping empty segments.
pub(crate) fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

const METHOD_ORDER: [Method; 8] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
    Method::TRACE,
];

/// Dedup and order methods for an `Allow` header. GET implies HEAD.
pub(crate) fn canonical_methods(mut methods: Vec<Method>) -> Vec<Method> {
    if methods.contains(&Method::GET) && !methods.contains(&Method::HEAD) {
        methods.push(Method::HEAD);
    }
    methods.sort_by_key(|m| {
        METHOD_ORDER
            .iter()
            .position(|o| o == m)
            .unwrap_or(METHOD_ORDER.len())
    });
    methods.dedup();
    methods
}
