#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use http::StatusCode;
use serde_json::json;
use vnd_api::cancel::CancellationToken;
use vnd_api::clock::ManualClock;
use vnd_api::dispatcher::{RequestScope, MAX_CALL_DEPTH};
use vnd_api::ids::RequestId;
use vnd_api::security::Identity;
use vnd_api::{ApiError, ApiRequest, CollectionOptions, ErrorKind, HandlerResponse, Route, Router};

use common::{manual_resolver, negotiator, reply, whoami, V1};

fn router() -> Router {
    Router::builder(negotiator())
        .register_version(
            "v1",
            CollectionOptions::new().prefix("api"),
            vec![
                Route::get("/whoami", whoami).protected(true),
                Route::get("/users/{id}", |cx| {
                    Ok(HandlerResponse::ok(json!({ "id": cx.param("id") })))
                })
                .name("users.show"),
                Route::get("/search", |cx| {
                    Ok(HandlerResponse::ok(json!({ "q": cx.query("q") })))
                }),
                Route::post("/echo", |cx| {
                    Ok(HandlerResponse::created(cx.body().cloned().unwrap_or_default()))
                }),
                Route::get("/stack", |cx| Ok(HandlerResponse::ok(json!(cx.call_stack())))),
                Route::get("/chain", |cx| {
                    cx.be(Identity::new("bob"));
                    cx.internal().get("/whoami")
                }),
                Route::get("/chain-fail", |cx| {
                    cx.be(Identity::new("bob"));
                    Err(ApiError::http(StatusCode::CONFLICT, "inner failure"))
                }),
                Route::get("/outer", |cx| {
                    let inner = cx.internal().be(Identity::new("alice")).get("/chain")?;
                    let after = cx.internal().get("/whoami")?;
                    let failed = cx.internal().get("/chain-fail").is_err();
                    let after_error = cx.internal().get("/whoami")?;
                    Ok(HandlerResponse::ok(json!([
                        inner.body,
                        after.body,
                        failed,
                        after_error.body
                    ])))
                }),
                Route::get("/relay", |cx| {
                    let user = cx.internal().get("/api/users/5")?;
                    Ok(HandlerResponse::ok(user.body))
                }),
                Route::get("/missing", |cx| match cx.internal().get("/nope") {
                    Err(ApiError::NotFound { path }) => Ok(HandlerResponse::ok(path)),
                    Err(other) => Err(other),
                    Ok(_) => Ok(HandlerResponse::ok("unexpected")),
                }),
                Route::get("/fresh", |cx| {
                    let fresh = cx.internal().route("fresh", &[])?;
                    Ok(HandlerResponse::ok(fresh.body))
                }),
                Route::get("/me", whoami),
                Route::get("/switch", |cx| {
                    let admin = cx.internal().be(Identity::new("admin")).get("/me")?;
                    let bob = cx.internal().be(Identity::new("bob")).once().get("/me")?;
                    let back = cx.internal().get("/me")?;
                    Ok(HandlerResponse::ok(json!([admin.body, bob.body, back.body])))
                }),
            ],
        )
        .register_version(
            "v2",
            CollectionOptions::new().prefix("api"),
            vec![Route::get("/fresh", reply("from v2")).name("fresh")],
        )
        .build()
}

fn scope() -> RequestScope {
    RequestScope::new(RequestId::new(), CancellationToken::new())
}

#[test]
fn test_pretense_restored_after_nested_calls() {
    let router = router();
    let res = router.dispatch(ApiRequest::get("/api/outer").accept(V1));
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json().unwrap(), json!(["bob", "alice", true, "alice"]));
}

#[test]
fn test_internal_errors_are_returned_to_caller() {
    let router = router();
    let res = router.dispatch(ApiRequest::get("/api/missing").accept(V1));
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json().unwrap(), json!({"message": "/api/nope"}));

    let mut scope = scope();
    let err = router.internal(&mut scope).get("/whoami").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(scope.depth(), 0);
}

#[test]
fn test_prefix_applied_exactly_once() {
    let router = router();
    let res = router.dispatch(ApiRequest::get("/api/relay").accept(V1));
    assert_eq!(res.json().unwrap(), json!({"id": "5"}));

    let mut scope = scope();
    let direct = router.internal(&mut scope).get("users/6").unwrap();
    assert_eq!(direct.body, json!({"id": "6"}));
}

#[test]
fn test_params_go_to_query_or_body() {
    let router = router();
    let mut scope = scope();
    let found = router
        .internal(&mut scope)
        .with([("q", "rust")])
        .get("/search")
        .unwrap();
    assert_eq!(found.body, json!({"q": "rust"}));

    let created = router
        .internal(&mut scope)
        .json(json!({"name": "widget"}))
        .with([("count", 3)])
        .post("/echo")
        .unwrap();
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body, json!({"name": "widget", "count": 3}));
}

#[test]
fn test_named_route_found_in_other_version() {
    let router = router();
    let res = router.dispatch(ApiRequest::get("/api/fresh").accept(V1));
    assert_eq!(res.json().unwrap(), json!({"message": "from v2"}));

    let mut scope = scope();
    let shown = router
        .internal(&mut scope)
        .route("users.show", &[("id", "9")])
        .unwrap();
    assert_eq!(shown.body, json!({"id": "9"}));

    let missing = router.internal(&mut scope).route("nope", &[]).unwrap_err();
    assert_eq!(missing.status(), Some(StatusCode::NOT_FOUND));
}

#[test]
fn test_once_pretense_covers_a_single_call() {
    let router = router();
    let mut scope = scope();
    let first = router
        .internal(&mut scope)
        .be(Identity::new("admin"))
        .once()
        .get("/whoami")
        .unwrap();
    assert_eq!(first.body, json!("admin"));

    let second = router.internal(&mut scope).get("/whoami").unwrap_err();
    assert_eq!(second.kind(), ErrorKind::Unauthorized);
}

#[test]
fn test_once_pretense_does_not_clear_persistent_one() {
    let router = router();
    let res = router.dispatch(ApiRequest::get("/api/switch").accept(V1));
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json().unwrap(), json!(["admin", "bob", "admin"]));
}

#[test]
fn test_persistent_pretense_covers_later_calls() {
    let router = router();
    let mut scope = scope();
    router
        .internal(&mut scope)
        .be(Identity::new("service"))
        .get("/whoami")
        .unwrap();
    let again = router.internal(&mut scope).get("/whoami").unwrap();
    assert_eq!(again.body, json!("service"));

    scope.forget_pretense();
    assert!(router.internal(&mut scope).get("/whoami").is_err());
}

#[test]
fn test_call_stack_visible_to_handler() {
    let router = router();
    let mut scope = scope();
    let res = router.internal(&mut scope).get("/stack").unwrap();
    assert_eq!(res.body, json!(["GET /api/stack"]));
    assert!(scope.call_stack().is_empty());
}

#[test]
fn test_internal_calls_skip_rate_limits() {
    let clock = ManualClock::new(0);
    let router = Router::builder(negotiator())
        .register_version(
            "v1",
            CollectionOptions::new().prefix("api"),
            vec![Route::get("/limited", reply("ok")).limit(1, 60)],
        )
        .throttles(manual_resolver(&clock))
        .build();
    let mut scope = scope();
    for _ in 0..3 {
        let res = router.internal(&mut scope).get("/limited").unwrap();
        assert_eq!(res.status, StatusCode::OK);
    }
}

#[test]
fn test_unknown_version_for_internal_call() {
    let router = router();
    let mut scope = scope();
    let err = router.internal(&mut scope).version("v9").get("/whoami").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownVersion);
}

#[test]
fn test_runaway_recursion_is_stopped() {
    let router = Router::builder(negotiator())
        .register_version(
            "v1",
            CollectionOptions::new().prefix("api"),
            vec![Route::get("/loop", |cx| cx.internal().get("/loop"))],
        )
        .debug(true)
        .build();
    let res = router.dispatch(ApiRequest::get("/api/loop").accept(V1));
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = res.json().unwrap();
    let stack = body["debug"]["call_stack"].as_array().unwrap();
    assert_eq!(stack.len(), MAX_CALL_DEPTH);
    assert_eq!(stack[0], "GET /api/loop");
}

#[test]
fn test_cancelled_scope_stops_internal_calls() {
    let router = router();
    let cancel = CancellationToken::new();
    let mut scope = RequestScope::new(RequestId::new(), cancel.clone());
    cancel.cancel();
    let err = router.internal(&mut scope).get("/users/1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}
