//! # Routing Module
//!
//! Versioned route collections and per-collection route matching.
//!
//! A [`RouteRegistry`] owns one [`RouteCollection`] per API version. Each
//! collection may be scoped by a `domain` (matched against the Host header)
//! or a `prefix` (matched segment-wise against the path) and stores its
//! routes in a segment radix tree.
//!
//! Prefix matching compares whole segments: prefix `api` matches `/api/foo`
//! and `/api` but never `/apifoo`.

mod collection;
mod radix;
mod registry;
mod route;
#[cfg(test)]
mod tests;

pub use collection::{CollectionOptions, RouteCollection};
pub use radix::Lookup;
pub(crate) use radix::canonical_methods;
pub(crate) use registry::fill_placeholders;
pub use registry::RouteRegistry;
pub use route::{Route, ThrottleRef};

/// Whether `prefix` is a leading segment slice of `path`.
///
/// Empty segments are ignored on both sides, so an empty prefix matches
/// every path.
#[must_use]
pub fn has_segment_prefix(path: &str, prefix: &str) -> bool {
    let mut path_segments = path.split('/').filter(|s| !s.is_empty());
    prefix
        .split('/')
        .filter(|s| !s.is_empty())
        .all(|p| path_segments.next() == Some(p))
}

/// Prepend `prefix` to `uri` unless `uri` already starts with it.
#[must_use]
pub fn join_prefix(prefix: &str, uri: &str) -> String {
    let (path, query) = match uri.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (uri, None),
    };
    let prefix = prefix.trim_matches('/');
    let path = path.trim_start_matches('/');

    let mut joined = if prefix.is_empty() || has_segment_prefix(path, prefix) {
        format!("/{path}")
    } else if path.is_empty() {
        format!("/{prefix}")
    } else {
        format!("/{prefix}/{path}")
    };
    if joined.len() > 1 && joined.ends_with('/') {
        joined.pop();
    }
    if let Some(query) = query {
        joined.push('?');
        joined.push_str(query);
    }
    joined
}
