//! # Dispatcher Module
//!
//! Internal self-calls: application code invoking its own API endpoints as if
//! they were external HTTP requests.
//!
//! Every external request owns a [`RequestScope`]. An internal call pushes a
//! [`Frame`] (keyed `"METHOD URI"`) onto the scope's call stack, re-enters
//! the router in internal mode and pops the frame when the returned
//! [`FrameGuard`] drops, whether the call succeeded, failed or panicked.
//! Internal mode differs from external dispatch in two ways only: errors are
//! returned to the caller instead of being rendered, and rate limiting is
//! skipped.
//!
//! ## Nested calls
//!
//! ```text
//! GET /api/dashboard             (external, depth 0)
//! └─ GET /api/users/me           (internal, depth 1)
//!    └─ GET /api/users/me/teams  (internal, depth 2)
//! ```
//!
//! Identity pretense changed by an inner handler never leaks back to its
//! caller: each frame restores the overrides it saw when it was pushed.

mod core;
mod stack;

pub use core::InternalDispatcher;
pub use stack::{Frame, FrameGuard, Overrides, RequestScope, MAX_CALL_DEPTH};
