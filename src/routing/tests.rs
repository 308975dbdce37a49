use http::Method;
use serde_json::json;

use super::*;
use crate::handler::Context;
use crate::response::HandlerResponse;

fn ok(_cx: &mut Context<'_>) -> Result<HandlerResponse, crate::error::ApiError> {
    Ok(HandlerResponse::ok(json!("bar")))
}

fn found(lookup: Lookup) -> (std::sync::Arc<Route>, crate::request::ParamVec) {
    match lookup {
        Lookup::Found(route, params) => (route, params),
        other => panic!("expected a route, got {other:?}"),
    }
}

#[test]
fn test_segment_prefix() {
    assert!(has_segment_prefix("/api/foo", "api"));
    assert!(has_segment_prefix("/api", "/api/"));
    assert!(has_segment_prefix("//api//foo", "api"));
    assert!(!has_segment_prefix("/apifoo", "api"));
    assert!(!has_segment_prefix("/foo/api", "api"));
    assert!(has_segment_prefix("/api/v1/x", "api/v1"));
    assert!(has_segment_prefix("/anything", ""));
}

#[test]
fn test_join_prefix_exactly_once() {
    assert_eq!(join_prefix("api", "/foo"), "/api/foo");
    assert_eq!(join_prefix("/api/", "api/foo"), "/api/foo");
    assert_eq!(join_prefix("api", "/apifoo"), "/api/apifoo");
    assert_eq!(join_prefix("api", "/"), "/api");
    assert_eq!(join_prefix("api", "/foo?x=1"), "/api/foo?x=1");
    assert_eq!(join_prefix("", "/foo"), "/foo");
}

#[test]
fn test_collection_matches_domain_or_prefix() {
    let any = RouteCollection::new("v1", CollectionOptions::new());
    assert!(any.matches_request(None, "/whatever"));

    let prefixed = RouteCollection::new("v1", CollectionOptions::new().prefix("api"));
    assert!(prefixed.matches_request(None, "/api/foo"));
    assert!(!prefixed.matches_request(None, "/apifoo"));

    let domained = RouteCollection::new("v1", CollectionOptions::new().domain("API.acme.test"));
    assert!(domained.matches_request(Some("api.acme.test"), "/foo"));
    assert!(!domained.matches_request(Some("www.acme.test"), "/foo"));
}

#[test]
fn test_routes_inherit_collection_prefix() {
    let mut collection = RouteCollection::new("v1", CollectionOptions::new().prefix("api"));
    collection.add(&Route::get("/users/{id}", ok));

    let (route, params) = found(collection.match_route(&Method::GET, "/api/users/7", None));
    assert_eq!(route.uri(), "/users/{id}");
    assert_eq!(route.full_path(), "/api/users/{id}");
    assert_eq!(crate::request::find_param(&params, "id"), Some("7"));
    assert!(matches!(
        collection.match_route(&Method::GET, "/users/7", None),
        Lookup::NotFound
    ));
}

#[test]
fn test_method_not_allowed_lists_methods() {
    let mut collection = RouteCollection::new("v1", CollectionOptions::new());
    collection.add(&Route::get("/items", ok));
    collection.add(&Route::post("/items", ok));

    match collection.match_route(&Method::DELETE, "/items", None) {
        Lookup::MethodNotAllowed(allowed) => {
            assert_eq!(allowed, vec![Method::GET, Method::HEAD, Method::POST]);
        }
        other => panic!("expected 405, got {other:?}"),
    }
}

#[test]
fn test_head_falls_back_to_get() {
    let mut collection = RouteCollection::new("v1", CollectionOptions::new());
    collection.add(&Route::get("/items", ok));
    let (route, _) = found(collection.match_route(&Method::HEAD, "/items", None));
    assert_eq!(route.methods(), &[Method::GET]);
}

#[test]
fn test_static_segments_win_over_params() {
    let mut collection = RouteCollection::new("v1", CollectionOptions::new());
    collection.add(&Route::get("/users/{id}", ok).name("show"));
    collection.add(&Route::get("/users/me", ok).name("me"));

    let (route, params) = found(collection.match_route(&Method::GET, "/users/me", None));
    assert_eq!(route.route_name(), Some("me"));
    assert!(params.is_empty());
}

#[test]
fn test_route_attributes_inherit_from_options() {
    let options = CollectionOptions::new()
        .protected(true)
        .scopes(["read"])
        .throttle("standard");
    let mut collection = RouteCollection::new("v1", options);
    let inherited = collection.add(&Route::get("/a", ok));
    let explicit = collection.add(&Route::get("/b", ok).protected(false).limit(5, 60));

    assert!(inherited.is_protected());
    assert_eq!(inherited.scope_list(), &["read".to_string()]);
    assert_eq!(inherited.throttle_ref(), Some(&ThrottleRef::Named("standard".into())));
    assert_eq!(inherited.version_list(), &["v1".to_string()]);

    assert!(!explicit.is_protected());
    assert_eq!(
        explicit.throttle_ref(),
        Some(&ThrottleRef::Inline { limit: 5, window_secs: 60 })
    );
}

#[test]
fn test_route_pinned_to_domain() {
    let mut collection = RouteCollection::new("v1", CollectionOptions::new());
    collection.add(&Route::get("/x", ok).domain("admin.acme.test"));
    assert!(matches!(
        collection.match_route(&Method::GET, "/x", Some("www.acme.test")),
        Lookup::NotFound
    ));
    found(collection.match_route(&Method::GET, "/x", Some("admin.acme.test")));
}

#[test]
fn test_registry_one_collection_per_version() {
    let mut registry = RouteRegistry::new();
    registry.register("v1", CollectionOptions::new().prefix("api"), vec![Route::get("/a", ok)]);
    registry.register("v1", CollectionOptions::new().prefix("other"), vec![Route::get("/b", ok)]);

    assert_eq!(registry.versions().collect::<Vec<_>>(), vec!["v1"]);
    let collection = registry.collection("v1").unwrap();
    assert_eq!(collection.len(), 2);
    assert_eq!(collection.prefix(), Some("api"));
    assert!(registry.collection("V1").is_none());
}

#[test]
fn test_route_registered_into_every_listed_version() {
    let mut registry = RouteRegistry::new();
    registry.register(
        "v1",
        CollectionOptions::new(),
        vec![Route::get("/shared", ok).versions(["v2"])],
    );
    assert!(registry.has_version("v2"));
    let route = registry.collection("v2").unwrap().routes().next().unwrap();
    assert_eq!(route.version_list(), &["v2".to_string(), "v1".to_string()]);
}

#[test]
fn test_resolve_collection_is_deterministic() {
    let mut registry = RouteRegistry::new();
    registry.register("v1", CollectionOptions::new().prefix("api"), vec![Route::get("/a", ok)]);
    for _ in 0..3 {
        let c = registry.resolve_collection(None, "/api/a", "v1").unwrap();
        assert_eq!(c.version(), "v1");
    }
    assert!(registry.resolve_collection(None, "/web/a", "v1").is_none());
    assert!(registry.resolve_collection(None, "/api/a", "v9").is_none());
}

#[test]
fn test_named_route_cross_version_fallback() {
    let mut registry = RouteRegistry::new();
    registry.register("v1", CollectionOptions::new().prefix("api"), vec![Route::get("/legacy", ok).name("legacy")]);
    registry.register("v2", CollectionOptions::new().prefix("api"), vec![Route::get("/users/{id}", ok).name("user")]);
    registry.register("v3", CollectionOptions::new().prefix("api"), vec![Route::get("/old", ok).name("legacy")]);

    let (collection, route) = registry.find_named("legacy", "v2").unwrap();
    assert_eq!(collection.version(), "v1");
    assert_eq!(route.uri(), "/legacy");

    let (collection, _) = registry.find_named("legacy", "v3").unwrap();
    assert_eq!(collection.version(), "v3");
    assert!(registry.find_named("missing", "v1").is_none());
}

#[test]
fn test_url_for_fills_placeholders() {
    let mut registry = RouteRegistry::new();
    registry.register(
        "v1",
        CollectionOptions::new().prefix("api"),
        vec![Route::get("/users/{id}/posts", ok).name("posts")],
    );
    let url = registry
        .url_for("posts", &[("id", "a b"), ("page", "2")], "v1")
        .unwrap();
    assert_eq!(url, "/api/users/a%20b/posts?page=2");
    assert!(registry.url_for("nope", &[], "v1").is_err());
}
