//! # Throttle Module
//!
//! Per-consumer rate limiting.
//!
//! A [`ThrottleResolver`] picks at most one [`Throttle`] per request: a
//! throttle attached to the matched route if there is one, else the matching
//! registered throttle with the largest limit. Usage is tracked in a
//! [`RateLimitCache`] under keys of the form
//! `<prefix>:<requests|reset|expires>:<throttle-key>:<consumer>`.
//!
//! Every request is counted first and compared second: with `limit = 1` the
//! first request in a window leaves `remaining = 0` and the second is
//! rejected while still being counted.

mod cache;
mod core;
#[cfg(test)]
mod tests;

pub use cache::{InMemoryCache, RateLimitCache, WindowKeys};
pub use core::{
    consumer_by_identity, consumer_by_ip, ConsumerResolver, Throttle, ThrottleCondition,
    ThrottleDecision, ThrottleResolver, HEADER_LIMIT, HEADER_REMAINING, HEADER_RESET,
};
