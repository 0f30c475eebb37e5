//! Panic recovery stage.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tonic::Status;
use tracing::error;

/// Runs `next`, converting a panic into an internal status.
///
/// A panicking handler must not take the process down with it. Its state
/// is dropped, which is safe because handlers share nothing mutable beyond
/// the pools.
pub async fn recover<T, F>(method: &'static str, next: F) -> Result<T, Status>
where
    F: Future<Output = Result<T, Status>>,
{
    match AssertUnwindSafe(next).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            error!(method, panic = %panic_message(panic.as_ref()), "panic recovered");
            Err(Status::internal("internal server error"))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic payload"
    }
}
