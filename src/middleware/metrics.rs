use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use http::StatusCode;

use super::Middleware;
use crate::request::ApiRequest;
use crate::response::ApiResponse;

/// Request counters and latency, collected with relaxed atomics.
///
/// Counters are eventually consistent and never block a request.
#[derive(Default)]
pub struct MetricsMiddleware {
    request_count: AtomicUsize,
    total_latency_ns: AtomicU64,
    client_errors: AtomicUsize,
    server_errors: AtomicUsize,
    rate_limited: AtomicUsize,
    auth_failures: AtomicUsize,
}

impl MetricsMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Mean processing time; zero before the first request.
    pub fn average_latency(&self) -> Duration {
        let count = self.request_count.load(Ordering::Relaxed) as u64;
        if count == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }

    /// 4xx responses, including rate-limit and auth rejections.
    pub fn client_errors(&self) -> usize {
        self.client_errors.load(Ordering::Relaxed)
    }

    pub fn server_errors(&self) -> usize {
        self.server_errors.load(Ordering::Relaxed)
    }

    /// 429 responses.
    pub fn rate_limited(&self) -> usize {
        self.rate_limited.load(Ordering::Relaxed)
    }

    /// 401 and 403 responses.
    pub fn auth_failures(&self) -> usize {
        self.auth_failures.load(Ordering::Relaxed)
    }
}

impl Middleware for MetricsMiddleware {
    fn before(&self, _req: &ApiRequest) -> Option<ApiResponse> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn after(&self, _req: &ApiRequest, res: &mut ApiResponse, latency: Duration) {
        self.total_latency_ns.fetch_add(
            u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX),
            Ordering::Relaxed,
        );
        let status = res.status;
        if status.is_client_error() {
            self.client_errors.fetch_add(1, Ordering::Relaxed);
        } else if status.is_server_error() {
            self.server_errors.fetch_add(1, Ordering::Relaxed);
        }
        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                self.rate_limited.fetch_add(1, Ordering::Relaxed);
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                self.auth_failures.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }
}
