//! Cross-cutting request pipeline.
//!
//! Each stage is an async function that takes the next stage's future and
//! returns a wrapped one. [`InterceptorChain::call`] composes them with
//! logging outermost and recovery innermost, so a panic is converted into a
//! status before metrics and logging observe the outcome.

pub mod logging;
pub mod metrics;
pub mod recovery;

pub use self::metrics::RequestMetrics;

use std::future::Future;
use tonic::Status;

/// Ordered interceptor pipeline applied to every unary call.
#[derive(Debug, Clone, Default)]
pub struct InterceptorChain {
    metrics: RequestMetrics,
}

impl InterceptorChain {
    /// Creates a chain recording through `metrics`.
    #[must_use]
    pub fn new(metrics: RequestMetrics) -> Self {
        Self { metrics }
    }

    /// Runs `handler` for `method` through logging, metrics and recovery.
    pub async fn call<T, F>(&self, method: &'static str, handler: F) -> Result<T, Status>
    where
        F: Future<Output = Result<T, Status>>,
    {
        logging::log(
            method,
            self.metrics.measure(method, recovery::recover(method, handler)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[tokio::test]
    async fn test_chain_passes_success_through() {
        let chain = InterceptorChain::default();
        let result = chain.call("/test/Ok", async { Ok::<_, Status>(5) }).await;
        assert_eq!(result.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_chain_passes_status_through() {
        let chain = InterceptorChain::default();
        let result: Result<(), Status> = chain
            .call("/test/NotFound", async { Err(Status::not_found("gone")) })
            .await;
        let status = result.unwrap_err();
        assert_eq!(status.code(), Code::NotFound);
        assert_eq!(status.message(), "gone");
    }

    #[tokio::test]
    async fn test_chain_converts_panic_to_internal() {
        let chain = InterceptorChain::default();
        let result: Result<(), Status> = chain
            .call("/test/Panic", async {
                let items: Vec<u8> = Vec::new();
                let _ = items[3];
                Ok(())
            })
            .await;
        let status = result.unwrap_err();
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), "internal server error");
    }
}
