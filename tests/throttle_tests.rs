#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;

use http::StatusCode;
use vnd_api::cancel::CancellationToken;
use vnd_api::clock::ManualClock;
use vnd_api::security::{AuthProvider, Identity, TokenAuth};
use vnd_api::throttle::{
    consumer_by_identity, Throttle, ThrottleCondition, HEADER_LIMIT, HEADER_REMAINING, HEADER_RESET,
};
use vnd_api::{ApiRequest, CollectionOptions, Route, Router};

use common::{client, get_v1, manual_resolver, negotiator, reply};

#[test]
fn test_largest_matching_limit_is_selected() {
    let clock = ManualClock::new(0);
    let resolver = manual_resolver(&clock)
        .throttle(Throttle::authenticated(100, 60))
        .throttle(Throttle::unauthenticated(10, 60))
        .throttle(Throttle::new("everyone", 50, 60));
    let request = ApiRequest::get("/api/foo");
    let user = Identity::new("1");

    let anonymous = resolver.select(&request, None, None).unwrap();
    assert_eq!(anonymous.name(), "everyone");
    let member = resolver.select(&request, Some(&user), None).unwrap();
    assert_eq!(member.name(), "authenticated");
}

#[test]
fn test_window_resets_on_manual_clock() {
    let clock = ManualClock::new(10_000);
    let router = Router::builder(negotiator())
        .register_version(
            "v1",
            CollectionOptions::new().prefix("api"),
            vec![Route::get("/foo", reply("bar"))],
        )
        .throttles(manual_resolver(&clock).throttle(Throttle::new("burst", 2, 30)))
        .build();

    let first = router.dispatch(get_v1("/api/foo"));
    assert_eq!(first.get_header(HEADER_RESET), Some("10030"));
    assert_eq!(router.dispatch(get_v1("/api/foo")).status, StatusCode::OK);
    assert_eq!(router.dispatch(get_v1("/api/foo")).status, StatusCode::TOO_MANY_REQUESTS);

    clock.advance(29);
    assert_eq!(router.dispatch(get_v1("/api/foo")).status, StatusCode::TOO_MANY_REQUESTS);

    clock.advance(1);
    let fresh = router.dispatch(get_v1("/api/foo"));
    assert_eq!(fresh.status, StatusCode::OK);
    assert_eq!(fresh.get_header(HEADER_REMAINING), Some("1"));
    assert_eq!(fresh.get_header(HEADER_RESET), Some("10060"));
}

#[test]
fn test_clients_have_separate_counters() {
    let clock = ManualClock::new(0);
    let router = Router::builder(negotiator())
        .register_version(
            "v1",
            CollectionOptions::new().prefix("api"),
            vec![Route::get("/foo", reply("bar"))],
        )
        .throttles(manual_resolver(&clock).throttle(Throttle::new("single", 1, 60)))
        .build();

    assert_eq!(router.dispatch(get_v1("/api/foo")).status, StatusCode::OK);
    assert_eq!(router.dispatch(get_v1("/api/foo")).status, StatusCode::TOO_MANY_REQUESTS);
    let other = router.dispatch(get_v1("/api/foo").remote_addr(client(2)));
    assert_eq!(other.status, StatusCode::OK);
}

#[test]
fn test_identity_keyed_consumers() {
    let clock = ManualClock::new(0);
    let resolver = manual_resolver(&clock)
        .with_consumer_resolver(Arc::new(consumer_by_identity))
        .throttle(Throttle::authenticated(1, 60));
    let auth = AuthProvider::Token(TokenAuth::api_key_header("X-API-Key").token("k1", Identity::new("7")));
    let router = Router::builder(negotiator())
        .register_version(
            "v1",
            CollectionOptions::new().prefix("api"),
            vec![Route::get("/foo", reply("bar"))],
        )
        .throttles(resolver)
        .auth_provider(auth)
        .build();

    // Same key from two addresses shares one counter.
    let first = router.dispatch(get_v1("/api/foo").header("X-API-Key", "k1"));
    assert_eq!(first.status, StatusCode::OK);
    let second = router.dispatch(get_v1("/api/foo").remote_addr(client(9)).header("X-API-Key", "k1"));
    assert_eq!(second.status, StatusCode::TOO_MANY_REQUESTS);

    // Anonymous requests match no throttle at all.
    let anonymous = router.dispatch(get_v1("/api/foo"));
    assert_eq!(anonymous.status, StatusCode::OK);
    assert!(anonymous.get_header(HEADER_LIMIT).is_none());
}

#[test]
fn test_custom_condition() {
    let clock = ManualClock::new(0);
    let resolver = manual_resolver(&clock).throttle(
        Throttle::new("writes", 5, 60).when(ThrottleCondition::Custom(Arc::new(
            |req: &ApiRequest, _: Option<&Identity>| req.method != http::Method::GET,
        ))),
    );
    let cancel = CancellationToken::new();
    assert!(resolver
        .evaluate(&ApiRequest::get("/api/foo"), None, None, &cancel)
        .unwrap()
        .is_none());
    let decision = resolver
        .evaluate(&ApiRequest::post("/api/foo"), None, None, &cancel)
        .unwrap()
        .unwrap();
    assert_eq!(decision.limit, 5);
    assert_eq!(decision.remaining, 4);
}

#[test]
fn test_concurrent_requests_are_all_counted() {
    let clock = ManualClock::new(0);
    let router = Arc::new(
        Router::builder(negotiator())
            .register_version(
                "v1",
                CollectionOptions::new().prefix("api"),
                vec![Route::get("/foo", reply("bar"))],
            )
            .throttles(manual_resolver(&clock).throttle(Throttle::new("shared", 40, 60)))
            .build(),
    );

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let router = Arc::clone(&router);
            std::thread::spawn(move || {
                (0..10)
                    .filter(|_| router.dispatch(get_v1("/api/foo")).status == StatusCode::OK)
                    .count()
            })
        })
        .collect();
    let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(allowed, 40);
}
