//! # Router Module
//!
//! The top-level request pipeline: decides whether a request targets the
//! versioned API, negotiates version and format, resolves the route
//! collection, enforces protection and rate limits, invokes the handler and
//! translates every failure into a structured response in one place.
//!
//! ## Pipeline
//!
//! ```text
//! Idle → Negotiating → Resolving → Dispatching → Succeeded | Failed → Responding
//! ```
//!
//! - **Negotiating**: the Accept header is parsed (strictly when configured).
//!   Requests not claimed by any collection skip the pipeline and are served
//!   by plain routes.
//! - **Resolving**: the collection for the negotiated version is matched by
//!   domain or path prefix; a path match with the wrong method is a 405
//!   carrying `Allow`, or a 200 `Allow` answer for OPTIONS.
//! - **Dispatching**: protection, scopes and the rate limit are checked, then
//!   the handler runs with panics caught.
//! - **Failed**: external requests get custom exception handlers, then the
//!   default `{message, errors?, code?}` body. Internal requests get the
//!   error back unrendered.
//! - **Responding**: the handler result is encoded by the formatter for the
//!   negotiated format, with `ETag`/`304` handling for GET.
//!
//! ## Example
//!
//! ```rust
//! use vnd_api::negotiation::AcceptParser;
//! use vnd_api::request::ApiRequest;
//! use vnd_api::response::HandlerResponse;
//! use vnd_api::router::Router;
//! use vnd_api::routing::{CollectionOptions, Route};
//!
//! let router = Router::builder(AcceptParser::new("acme", "v1", "json").unwrap())
//!     .register_version(
//!         "v1",
//!         CollectionOptions::new().prefix("api"),
//!         vec![Route::get("/foo", |_cx| Ok(HandlerResponse::ok("bar")))],
//!     )
//!     .build();
//!
//! let res = router.dispatch(ApiRequest::get("/api/foo").accept("application/vnd.acme.v1+json"));
//! assert_eq!(res.status, 200);
//! assert_eq!(res.json().unwrap()["message"], "bar");
//! ```

mod core;
mod exception;
mod render;

pub use core::{Router, RouterBuilder, Target};
pub use exception::{ExceptionHandlerFn, ExceptionHandlers};
