#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use vnd_api::clock::{Clock, ManualClock};
use vnd_api::negotiation::AcceptParser;
use vnd_api::throttle::{InMemoryCache, ThrottleResolver};
use vnd_api::{ApiError, ApiRequest, Context, HandlerResponse};

pub const V1: &str = "application/vnd.acme.v1+json";
pub const V2: &str = "application/vnd.acme.v2+json";

/// `acme` vendor, `v1` and `json` by default.
pub fn negotiator() -> AcceptParser {
    AcceptParser::new("acme", "v1", "json").unwrap()
}

/// Handler answering 200 with a fixed string body.
pub fn reply(
    text: &'static str,
) -> impl Fn(&mut Context<'_>) -> Result<HandlerResponse, ApiError> + Send + Sync + 'static {
    move |_cx| Ok(HandlerResponse::ok(text))
}

/// Handler echoing the id of the identity it runs as, or `"anonymous"`.
pub fn whoami(cx: &mut Context<'_>) -> Result<HandlerResponse, ApiError> {
    let id = cx
        .identity()
        .map_or_else(|| "anonymous".to_string(), |i| i.id.clone());
    Ok(HandlerResponse::ok(id))
}

/// Resolver whose cache and windows follow `clock`.
pub fn manual_resolver(clock: &ManualClock) -> ThrottleResolver {
    let clock: Arc<dyn Clock> = Arc::new(clock.clone());
    ThrottleResolver::new(Arc::new(InMemoryCache::with_clock(Arc::clone(&clock))), clock)
}

pub fn client(last_octet: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(192, 168, 0, last_octet))
}

pub fn get_v1(uri: &str) -> ApiRequest {
    ApiRequest::get(uri).accept(V1).remote_addr(client(1))
}
