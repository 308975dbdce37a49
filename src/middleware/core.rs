use std::time::Duration;

use crate::request::ApiRequest;
use crate::response::ApiResponse;

/// Hooks around external API dispatch.
///
/// `before` may short-circuit by returning a response; the handler then never
/// runs but `after` still sees the short-circuit response. Internal
/// sub-requests bypass middleware.
pub trait Middleware: Send + Sync {
    fn before(&self, _req: &ApiRequest) -> Option<ApiResponse> {
        None
    }
    fn after(&self, _req: &ApiRequest, _res: &mut ApiResponse, _latency: Duration) {}
}
