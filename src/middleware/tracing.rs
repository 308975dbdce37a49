use std::time::Duration;

use tracing::{debug, info, warn};

use super::Middleware;
use crate::request::ApiRequest;
use crate::response::ApiResponse;

/// Logs every external request with its outcome and latency.
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn before(&self, req: &ApiRequest) -> Option<ApiResponse> {
        debug!(
            request_id = %req.request_id,
            method = %req.method,
            path = %req.path,
            accept = req.accept_header().unwrap_or(""),
            "Request received"
        );
        None
    }

    fn after(&self, req: &ApiRequest, res: &mut ApiResponse, latency: Duration) {
        let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        if res.status.is_server_error() {
            warn!(
                request_id = %req.request_id,
                method = %req.method,
                path = %req.path,
                status = res.status.as_u16(),
                latency_ms,
                "Request failed"
            );
        } else {
            info!(
                request_id = %req.request_id,
                method = %req.method,
                path = %req.path,
                status = res.status.as_u16(),
                latency_ms,
                "Request completed"
            );
        }
    }
}
