//! # vnd-api
//!
//! **vnd-api** is an API versioning and dispatch layer: it negotiates the
//! API version and response format from vendor media types in the `Accept`
//! header, routes requests to per-version route collections, lets handlers
//! call their own API internally, and rate-limits consumers.
//!
//! ## Overview
//!
//! ```text
//! Accept: application/vnd.acme.v2+json
//!            │
//!            ▼
//!   negotiation ──► routing ──► router ──► handler ──► formatter
//!   (version,       (collection  (auth,      (Context,    (json, jsonp)
//!    format)         per version) throttle)   internal())
//! ```
//!
//! ## Architecture
//!
//! - **[`negotiation`]** - Accept header parsing/building and the formatter registry
//! - **[`routing`]** - Routes, per-version collections and the route registry
//! - **[`router`]** - The request pipeline and central error translation
//! - **[`dispatcher`]** - Internal self-calls with a per-request call stack
//! - **[`throttle`]** - Throttle selection and count-then-compare rate limiting
//! - **[`security`]** - Consumer identification for protected routes
//! - **[`middleware`]** - Before/after hooks, tracing and metrics
//! - **[`config`]** / **[`logging`]** - File/env configuration and subscriber setup
//!
//! ## Quick Start
//!
//! ```rust
//! use vnd_api::negotiation::AcceptParser;
//! use vnd_api::request::ApiRequest;
//! use vnd_api::response::HandlerResponse;
//! use vnd_api::router::Router;
//! use vnd_api::routing::{CollectionOptions, Route};
//! use serde_json::json;
//!
//! let router = Router::builder(AcceptParser::new("acme", "v1", "json").unwrap())
//!     .register_version(
//!         "v1",
//!         CollectionOptions::new().prefix("api"),
//!         vec![Route::get("/users/{id}", |cx| {
//!             Ok(HandlerResponse::ok(json!({ "id": cx.param("id") })))
//!         })
//!         .name("users.show")],
//!     )
//!     .build();
//!
//! let res = router.dispatch(ApiRequest::get("/api/users/7").accept("application/vnd.acme.v1+json"));
//! assert_eq!(res.json().unwrap(), json!({ "id": "7" }));
//! assert_eq!(router.url_for("users.show", &[("id", "8")]).unwrap(), "/api/users/8");
//! ```
//!
//! ## Concurrency
//!
//! A [`router::Router`] is built once and shared read-only across threads.
//! Each external request runs synchronously on the calling thread and owns
//! its [`dispatcher::RequestScope`]; the rate-limit counters are the only
//! shared mutable state and are updated through atomic increments.

pub mod cancel;
pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod negotiation;
pub mod request;
pub mod response;
pub mod router;
pub mod routing;
pub mod security;
pub mod throttle;

pub use config::ApiConfig;
pub use error::{ApiError, ErrorKind};
pub use handler::{Context, Handler};
pub use request::ApiRequest;
pub use response::{ApiResponse, HandlerResponse, ResponseBody};
pub use router::{Router, RouterBuilder};
pub use routing::{CollectionOptions, Route};
