use std::fmt;
use std::sync::Arc;

use http::{HeaderMap, HeaderValue};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::cache::{RateLimitCache, WindowKeys};
use crate::cancel::CancellationToken;
use crate::clock::Clock;
use crate::error::ApiError;
use crate::request::ApiRequest;
use crate::routing::{Route, ThrottleRef};
use crate::security::Identity;

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";

/// Predicate deciding whether a throttle governs a request.
#[derive(Clone)]
pub enum ThrottleCondition {
    Always,
    /// The consumer has an identity.
    Authenticated,
    Unauthenticated,
    Custom(Arc<dyn Fn(&ApiRequest, Option<&Identity>) -> bool + Send + Sync>),
}

impl ThrottleCondition {
    fn matches(&self, request: &ApiRequest, identity: Option<&Identity>) -> bool {
        match self {
            ThrottleCondition::Always => true,
            ThrottleCondition::Authenticated => identity.is_some(),
            ThrottleCondition::Unauthenticated => identity.is_none(),
            ThrottleCondition::Custom(f) => f(request, identity),
        }
    }
}

impl fmt::Debug for ThrottleCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThrottleCondition::Always => f.write_str("Always"),
            ThrottleCondition::Authenticated => f.write_str("Authenticated"),
            ThrottleCondition::Unauthenticated => f.write_str("Unauthenticated"),
            ThrottleCondition::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A rate-limit policy: `limit` requests per `window_secs` for requests the
/// condition selects. A limit of zero disables rate limiting for them.
#[derive(Debug, Clone)]
pub struct Throttle {
    name: String,
    limit: u64,
    window_secs: u64,
    condition: ThrottleCondition,
    key: Option<String>,
}

impl Throttle {
    pub fn new(name: &str, limit: u64, window_secs: u64) -> Self {
        Self {
            name: name.to_string(),
            limit,
            window_secs,
            condition: ThrottleCondition::Always,
            key: None,
        }
    }

    pub fn authenticated(limit: u64, window_secs: u64) -> Self {
        Self::new("authenticated", limit, window_secs).when(ThrottleCondition::Authenticated)
    }

    pub fn unauthenticated(limit: u64, window_secs: u64) -> Self {
        Self::new("unauthenticated", limit, window_secs).when(ThrottleCondition::Unauthenticated)
    }

    /// Ad-hoc throttle for a route's inline limit, keyed by a hash of its path.
    pub fn for_route(path: &str, limit: u64, window_secs: u64) -> Self {
        let digest = Sha256::digest(path.as_bytes());
        let hash: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        Self {
            key: Some(format!("route:{hash}")),
            ..Self::new("route", limit, window_secs)
        }
    }

    #[must_use]
    pub fn when(mut self, condition: ThrottleCondition) -> Self {
        self.condition = condition;
        self
    }

    /// Override the cache key segment (defaults to the name).
    #[must_use]
    pub fn key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    #[must_use]
    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    #[must_use]
    pub fn cache_key(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.name)
    }

    #[must_use]
    pub fn matches(&self, request: &ApiRequest, identity: Option<&Identity>) -> bool {
        self.condition.matches(request, identity)
    }
}

/// Outcome of one rate-limit evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleDecision {
    pub allowed: bool,
    pub limit: u64,
    /// Requests left in the window, never negative.
    pub remaining: u64,
    /// Epoch seconds at which the window resets.
    pub reset_at: u64,
    pub throttle: String,
}

impl ThrottleDecision {
    /// Add the `X-RateLimit-*` headers.
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert(HEADER_LIMIT, HeaderValue::from(self.limit));
        headers.insert(HEADER_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(HEADER_RESET, HeaderValue::from(self.reset_at));
    }
}

/// Maps a request to the identity its counters are tracked under.
pub type ConsumerResolver = Arc<dyn Fn(&ApiRequest, Option<&Identity>) -> String + Send + Sync>;

/// Client IP, or `"unknown"`.
pub fn consumer_by_ip(request: &ApiRequest, _identity: Option<&Identity>) -> String {
    request
        .remote_addr
        .map_or_else(|| "unknown".to_string(), |ip| ip.to_string())
}

/// Authenticated identity id, falling back to the client IP.
pub fn consumer_by_identity(request: &ApiRequest, identity: Option<&Identity>) -> String {
    match identity {
        Some(identity) => format!("user:{}", identity.id),
        None => consumer_by_ip(request, None),
    }
}

/// Selects a throttle for a request and tracks usage in a [`RateLimitCache`].
pub struct ThrottleResolver {
    throttles: Vec<Arc<Throttle>>,
    cache: Arc<dyn RateLimitCache>,
    clock: Arc<dyn Clock>,
    key_prefix: String,
    consumer: ConsumerResolver,
}

impl ThrottleResolver {
    pub fn new(cache: Arc<dyn RateLimitCache>, clock: Arc<dyn Clock>) -> Self {
        Self {
            throttles: Vec::new(),
            cache,
            clock,
            key_prefix: "api".to_string(),
            consumer: Arc::new(consumer_by_ip),
        }
    }

    #[must_use]
    pub fn with_key_prefix(mut self, prefix: &str) -> Self {
        self.key_prefix = prefix.to_string();
        self
    }

    #[must_use]
    pub fn with_consumer_resolver(mut self, resolver: ConsumerResolver) -> Self {
        self.consumer = resolver;
        self
    }

    /// Register a throttle. Registration order breaks limit ties.
    pub fn register(&mut self, throttle: Throttle) {
        self.throttles.push(Arc::new(throttle));
    }

    #[must_use]
    pub fn throttle(mut self, throttle: Throttle) -> Self {
        self.register(throttle);
        self
    }

    pub fn throttles(&self) -> impl Iterator<Item = &Throttle> {
        self.throttles.iter().map(AsRef::as_ref)
    }

    #[must_use]
    pub fn named(&self, name: &str) -> Option<Arc<Throttle>> {
        self.throttles.iter().find(|t| t.name() == name).cloned()
    }

    /// Pick the throttle governing this request.
    ///
    /// A throttle attached to the route always wins. Otherwise the matching
    /// registered throttle with the largest limit is chosen, the earliest
    /// registered one on ties. `None` means the request is not rate limited.
    #[must_use]
    pub fn select(
        &self,
        request: &ApiRequest,
        identity: Option<&Identity>,
        route: Option<&Route>,
    ) -> Option<Arc<Throttle>> {
        if let Some(route) = route {
            match route.throttle_ref() {
                Some(ThrottleRef::Inline { limit, window_secs }) => {
                    return Some(Arc::new(Throttle::for_route(
                        &route.full_path(),
                        *limit,
                        *window_secs,
                    )));
                }
                Some(ThrottleRef::Named(name)) => match self.named(name) {
                    Some(throttle) => return Some(throttle),
                    None => warn!(throttle = %name, "Route references unknown throttle"),
                },
                None => {}
            }
        }

        let mut best: Option<&Arc<Throttle>> = None;
        for throttle in self.throttles.iter().filter(|t| t.matches(request, identity)) {
            // Any matching disabled throttle exempts the request, wherever it
            // was registered.
            if throttle.limit() == 0 {
                return Some(Arc::clone(throttle));
            }
            if best.map_or(true, |b| throttle.limit() > b.limit()) {
                best = Some(throttle);
            }
        }
        best.cloned()
    }

    /// Count this request against its throttle.
    ///
    /// Returns `None` when no throttle applies or the selected one is
    /// disabled. The request is counted before it is compared to the limit,
    /// so the request that crosses the threshold is counted and rejected.
    pub fn evaluate(
        &self,
        request: &ApiRequest,
        identity: Option<&Identity>,
        route: Option<&Route>,
        cancel: &CancellationToken,
    ) -> Result<Option<ThrottleDecision>, ApiError> {
        let Some(throttle) = self.select(request, identity, route) else {
            return Ok(None);
        };
        if throttle.limit() == 0 {
            return Ok(None);
        }
        cancel.check()?;

        let consumer = (self.consumer)(request, identity);
        let key = |kind: &str| {
            format!(
                "{}:{}:{}:{}",
                self.key_prefix,
                kind,
                throttle.cache_key(),
                consumer
            )
        };
        let keys = WindowKeys {
            requests: key("requests"),
            reset: key("reset"),
            expires: key("expires"),
        };
        let now = self.clock.now();
        let (count, reset_at) = self.cache.increment_window(&keys, throttle.window_secs(), now)?;
        if count == 1 {
            debug!(throttle = %throttle.name(), consumer = %consumer, reset_at, "Opened rate-limit window");
        }

        let decision = ThrottleDecision {
            allowed: count <= throttle.limit(),
            limit: throttle.limit(),
            remaining: throttle.limit().saturating_sub(count),
            reset_at,
            throttle: throttle.name().to_string(),
        };
        if !decision.allowed {
            warn!(
                request_id = %request.request_id,
                throttle = %decision.throttle,
                consumer = %consumer,
                limit = decision.limit,
                "Rate limit exceeded"
            );
        }
        Ok(Some(decision))
    }
}
