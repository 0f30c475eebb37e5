//! Request metrics stage.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tonic::{Code, Status};

/// Metric names for the gRPC surface.
pub mod names {
    /// Total requests by method and status code.
    pub const REQUESTS_TOTAL: &str = "keel_grpc_requests_total";
    /// Request latency in seconds by method.
    pub const REQUEST_DURATION_SECONDS: &str = "keel_grpc_request_duration_seconds";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        names::REQUESTS_TOTAL,
        "Total number of gRPC requests by method and status code"
    );
    describe_histogram!(
        names::REQUEST_DURATION_SECONDS,
        Unit::Seconds,
        "gRPC request latency in seconds"
    );
}

/// Records request counts and latencies through the `metrics` facade.
#[derive(Debug, Clone, Copy)]
pub struct RequestMetrics {
    enabled: bool,
}

impl RequestMetrics {
    /// Creates a recorder. With `enabled` false every call is a no-op.
    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// A recorder that records nothing.
    #[must_use]
    pub const fn disabled() -> Self {
        Self::new(false)
    }

    /// Records one finished call.
    pub fn record(&self, method: &'static str, code: Code, elapsed: Duration) {
        if !self.enabled {
            return;
        }
        counter!(
            names::REQUESTS_TOTAL,
            "method" => method,
            "code" => format!("{code:?}")
        )
        .increment(1);
        histogram!(names::REQUEST_DURATION_SECONDS, "method" => method)
            .record(elapsed.as_secs_f64());
    }

    /// Times `next` and records its outcome.
    pub async fn measure<T, F>(&self, method: &'static str, next: F) -> Result<T, Status>
    where
        F: Future<Output = Result<T, Status>>,
    {
        let start = Instant::now();
        let result = next.await;
        let code = result.as_ref().map_or_else(Status::code, |_| Code::Ok);
        self.record(method, code, start.elapsed());
        result
    }
}

impl Default for RequestMetrics {
    fn default() -> Self {
        Self::disabled()
    }
}
