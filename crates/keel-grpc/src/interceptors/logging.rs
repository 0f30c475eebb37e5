//! Request logging stage.

use std::future::Future;
use tokio::time::Instant;
use tonic::{Code, Status};
use tracing::info;

/// Logs method, outcome and latency of every call.
pub async fn log<T, F>(method: &'static str, next: F) -> Result<T, Status>
where
    F: Future<Output = Result<T, Status>>,
{
    let start = Instant::now();
    let result = next.await;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    let code = result.as_ref().map_or_else(Status::code, |_| Code::Ok);
    info!(
        method,
        code = ?code,
        elapsed_ms,
        error = result.is_err(),
        "grpc request"
    );

    result
}
