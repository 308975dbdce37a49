//! # Negotiation Module
//!
//! Content negotiation for versioned APIs.
//!
//! Clients select an API version and a response format through a vendor media
//! type in the `Accept` header:
//!
//! ```text
//! Accept: application/vnd.acme.v2+json
//!                     ─┬─ ─┬── ─┬ ─┬──
//!                      │   │    │  └─ format  → formatter registry
//!                      │   │    └──── version → route collection
//!                      │   └───────── vendor (literal, case-sensitive)
//!                      └───────────── standards tree
//! ```
//!
//! A missing or non-matching header is not an error: negotiation falls back
//! to the configured default version and format so an API can be explored
//! from a browser. Strict mode turns that fallback into a 400.
//!
//! ## Example
//!
//! ```rust
//! use vnd_api::negotiation::{AcceptParser, AcceptSource};
//!
//! let parser = AcceptParser::new("acme", "v1", "json").unwrap();
//! let accept = parser.parse(Some("application/vnd.acme.v2.0.1+xml"));
//! assert_eq!(accept.version, "v2.0.1");
//! assert_eq!(accept.format, "xml");
//!
//! let fallback = parser.parse(None);
//! assert_eq!(fallback.source, AcceptSource::Default);
//! assert_eq!(parser.build("v2", "json"), "application/vnd.acme.v2+json");
//! ```

mod accept;
mod formatter;
#[cfg(test)]
mod tests;

pub use accept::{build_accept, Accept, AcceptParser, AcceptSource};
pub use formatter::{Formatter, FormatterRegistry, JsonFormatter, JsonpFormatter};
