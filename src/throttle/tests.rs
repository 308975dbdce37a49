use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use super::*;
use crate::cancel::CancellationToken;
use crate::clock::ManualClock;
use crate::request::ApiRequest;
use crate::response::HandlerResponse;
use crate::routing::Route;
use crate::security::Identity;

fn resolver(clock: &ManualClock) -> ThrottleResolver {
    let clock: Arc<dyn crate::clock::Clock> = Arc::new(clock.clone());
    ThrottleResolver::new(Arc::new(InMemoryCache::with_clock(Arc::clone(&clock))), clock)
}

fn request() -> ApiRequest {
    ApiRequest::get("/api/foo").remote_addr(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)))
}

fn limited_route(limit: u64, window: u64) -> Route {
    Route::get("/foo", |_cx: &mut crate::handler::Context<'_>| {
        Ok(HandlerResponse::ok("bar"))
    })
    .limit(limit, window)
}

fn eval(resolver: &ThrottleResolver, route: Option<&Route>, identity: Option<&Identity>) -> ThrottleDecision {
    resolver
        .evaluate(&request(), identity, route, &CancellationToken::new())
        .unwrap()
        .expect("a throttle applies")
}

#[test]
fn test_count_then_compare() {
    let clock = ManualClock::new(1_000);
    let resolver = resolver(&clock);
    let route = limited_route(1, 60);

    let first = eval(&resolver, Some(&route), None);
    assert!(first.allowed);
    assert_eq!(first.remaining, 0);
    assert_eq!(first.reset_at, 1_060);

    let second = eval(&resolver, Some(&route), None);
    assert!(!second.allowed);
    assert_eq!(second.remaining, 0);
    assert_eq!(second.reset_at, 1_060);
}

#[test]
fn test_window_resets_after_expiry() {
    let clock = ManualClock::new(1_000);
    let resolver = resolver(&clock);
    let route = limited_route(2, 60);

    eval(&resolver, Some(&route), None);
    eval(&resolver, Some(&route), None);
    assert!(!eval(&resolver, Some(&route), None).allowed);

    clock.advance(60);
    let fresh = eval(&resolver, Some(&route), None);
    assert!(fresh.allowed);
    assert_eq!(fresh.remaining, 1);
    assert_eq!(fresh.reset_at, 1_120);
}

#[test]
fn test_changed_window_discards_counters() {
    let clock = ManualClock::new(0);
    let resolver = resolver(&clock);

    eval(&resolver, Some(&limited_route(1, 60)), None);
    let rejected = eval(&resolver, Some(&limited_route(1, 60)), None);
    assert!(!rejected.allowed);

    let reconfigured = eval(&resolver, Some(&limited_route(1, 30)), None);
    assert!(reconfigured.allowed);
    assert_eq!(reconfigured.reset_at, 30);
}

#[test]
fn test_largest_limit_wins() {
    let clock = ManualClock::new(0);
    let resolver = resolver(&clock)
        .throttle(Throttle::new("everyone", 10, 60))
        .throttle(Throttle::authenticated(100, 60));

    let user = Identity::new("42");
    assert_eq!(eval(&resolver, None, Some(&user)).limit, 100);
    assert_eq!(eval(&resolver, None, None).limit, 10);
}

#[test]
fn test_ties_go_to_first_registered() {
    let resolver = resolver(&ManualClock::new(0))
        .throttle(Throttle::new("first", 10, 60))
        .throttle(Throttle::new("second", 10, 60));
    let chosen = resolver.select(&request(), None, None).unwrap();
    assert_eq!(chosen.name(), "first");
}

#[test]
fn test_route_throttle_beats_generic() {
    let resolver = resolver(&ManualClock::new(0))
        .throttle(Throttle::new("generous", 1_000, 60))
        .throttle(Throttle::new("strict", 2, 60));

    let inline = limited_route(1, 60);
    assert_eq!(resolver.select(&request(), None, Some(&inline)).unwrap().limit(), 1);

    let named = Route::get("/x", |_cx: &mut crate::handler::Context<'_>| {
        Ok(HandlerResponse::ok("x"))
    })
    .throttle("strict");
    assert_eq!(resolver.select(&request(), None, Some(&named)).unwrap().name(), "strict");
}

#[test]
fn test_no_matching_throttle_skips_limiting() {
    let resolver = resolver(&ManualClock::new(0)).throttle(Throttle::authenticated(5, 60));
    let decision = resolver
        .evaluate(&request(), None, None, &CancellationToken::new())
        .unwrap();
    assert!(decision.is_none());
}

#[test]
fn test_zero_limit_disables() {
    let resolver = resolver(&ManualClock::new(0))
        .throttle(Throttle::new("strict", 5, 60))
        .throttle(Throttle::new("internal-network", 0, 60));
    let decision = resolver
        .evaluate(&request(), None, None, &CancellationToken::new())
        .unwrap();
    assert!(decision.is_none());
}

#[test]
fn test_disabled_throttle_wins_in_any_order() {
    let disabled_first = resolver(&ManualClock::new(0))
        .throttle(Throttle::new("internal-network", 0, 60))
        .throttle(Throttle::new("strict", 5, 60));
    assert_eq!(disabled_first.select(&request(), None, None).unwrap().name(), "internal-network");
    assert!(disabled_first
        .evaluate(&request(), None, None, &CancellationToken::new())
        .unwrap()
        .is_none());
}

#[test]
fn test_consumers_are_counted_separately() {
    let resolver = resolver(&ManualClock::new(0));
    let route = limited_route(1, 60);
    let other = ApiRequest::get("/api/foo").remote_addr(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)));

    assert!(eval(&resolver, Some(&route), None).allowed);
    let decision = resolver
        .evaluate(&other, None, Some(&route), &CancellationToken::new())
        .unwrap()
        .unwrap();
    assert!(decision.allowed);
}

#[test]
fn test_cancelled_before_cache() {
    let resolver = resolver(&ManualClock::new(0));
    let token = CancellationToken::new();
    token.cancel();
    let err = resolver
        .evaluate(&request(), None, Some(&limited_route(1, 60)), &token)
        .unwrap_err();
    assert!(matches!(err, crate::error::ApiError::Cancelled));
}

#[test]
fn test_decision_headers() {
    let decision = ThrottleDecision {
        allowed: false,
        limit: 5,
        remaining: 0,
        reset_at: 1_700_000_000,
        throttle: "t".into(),
    };
    let mut headers = http::HeaderMap::new();
    decision.apply_headers(&mut headers);
    assert_eq!(headers.get("X-RateLimit-Limit").unwrap(), "5");
    assert_eq!(headers.get("X-RateLimit-Remaining").unwrap(), "0");
    assert_eq!(headers.get("X-RateLimit-Reset").unwrap(), "1700000000");
}

#[test]
fn test_increment_is_atomic_across_threads() {
    let cache = InMemoryCache::with_clock(Arc::new(ManualClock::new(0)));
    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for _ in 0..250 {
                    cache.increment("k", 60).unwrap();
                }
            });
        }
    });
    assert_eq!(cache.get("k").unwrap(), Some(2_000));
}

#[test]
fn test_cache_ttl_and_put_if_absent() {
    let clock = ManualClock::new(0);
    let cache = InMemoryCache::with_clock(Arc::new(clock.clone()));
    assert!(cache.put_if_absent("k", 7, 10).unwrap());
    assert!(!cache.put_if_absent("k", 9, 10).unwrap());
    assert_eq!(cache.get("k").unwrap(), Some(7));

    clock.advance(10);
    assert_eq!(cache.get("k").unwrap(), None);
    assert!(cache.put_if_absent("k", 9, 10).unwrap());
    assert_eq!(cache.get("k").unwrap(), Some(9));

    cache.forget("k").unwrap();
    assert_eq!(cache.get("k").unwrap(), None);
    cache.purge_expired();
}

#[test]
fn test_policy_change_under_concurrency_counts_every_request() {
    let clock = ManualClock::new(0);
    let resolver = resolver(&clock);
    eval(&resolver, Some(&limited_route(100, 60)), None);
    eval(&resolver, Some(&limited_route(100, 60)), None);

    // Every thread sees the old window and races to reopen it.
    let route = limited_route(40, 30);
    let allowed: usize = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    (0..10)
                        .filter(|_| eval(&resolver, Some(&route), None).allowed)
                        .count()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });
    assert_eq!(allowed, 40);
    assert_eq!(eval(&resolver, Some(&route), None).reset_at, 30);
}

/// Store exposing only the primitive operations.
struct PrimitivesOnly(InMemoryCache);

impl RateLimitCache for PrimitivesOnly {
    fn get(&self, key: &str) -> anyhow::Result<Option<u64>> {
        self.0.get(key)
    }

    fn put_if_absent(&self, key: &str, value: u64, ttl_secs: u64) -> anyhow::Result<bool> {
        self.0.put_if_absent(key, value, ttl_secs)
    }

    fn increment(&self, key: &str, ttl_secs: u64) -> anyhow::Result<u64> {
        self.0.increment(key, ttl_secs)
    }

    fn forget(&self, key: &str) -> anyhow::Result<()> {
        self.0.forget(key)
    }
}

#[test]
fn test_default_window_bookkeeping() {
    let clock = ManualClock::new(100);
    let shared: Arc<dyn crate::clock::Clock> = Arc::new(clock.clone());
    let cache = PrimitivesOnly(InMemoryCache::with_clock(Arc::clone(&shared)));
    let keys = WindowKeys {
        requests: "api:requests:t:c".into(),
        reset: "api:reset:t:c".into(),
        expires: "api:expires:t:c".into(),
    };

    assert_eq!(cache.increment_window(&keys, 60, 100).unwrap(), (1, 160));
    assert_eq!(cache.increment_window(&keys, 60, 100).unwrap(), (2, 160));
    assert_eq!(cache.increment_window(&keys, 30, 100).unwrap(), (1, 130));

    clock.advance(30);
    assert_eq!(cache.increment_window(&keys, 30, 130).unwrap(), (1, 160));
}

#[test]
fn test_in_memory_window_mirrors_reset_and_policy() {
    let cache = InMemoryCache::with_clock(Arc::new(ManualClock::new(0)));
    let keys = WindowKeys {
        requests: "r".into(),
        reset: "s".into(),
        expires: "e".into(),
    };
    assert_eq!(cache.increment_window(&keys, 60, 0).unwrap(), (1, 60));
    assert_eq!(cache.get("s").unwrap(), Some(60));
    assert_eq!(cache.get("e").unwrap(), Some(60));
    assert_eq!(cache.increment_window(&keys, 20, 0).unwrap(), (1, 20));
    assert_eq!(cache.get("e").unwrap(), Some(20));
}
