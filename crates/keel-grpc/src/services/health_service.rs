//! gRPC health service implementation.

use crate::proto::health::{
    health_check_response::ServingStatus, health_server::Health, HealthCheckRequest,
    HealthCheckResponse,
};
use std::pin::Pin;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt};
use tonic::{Request, Response, Status};
use tracing::{debug, info};

/// Fully qualified name of the user service as seen by health clients.
pub const USER_SERVICE_NAME: &str = "keel.user.v1.UserService";

/// Health service backed by a shared serving flag.
#[derive(Debug, Clone)]
pub struct HealthServiceImpl {
    serving: watch::Receiver<bool>,
}

/// Flips the serving flag observed by [`HealthServiceImpl`].
#[derive(Debug, Clone)]
pub struct HealthReporter {
    tx: std::sync::Arc<watch::Sender<bool>>,
}

impl HealthReporter {
    /// Marks the process as serving.
    pub fn set_serving(&self) {
        self.tx.send_replace(true);
    }

    /// Marks the process as draining. Watchers see `NOT_SERVING`.
    pub fn set_not_serving(&self) {
        if self.tx.send_replace(false) {
            info!("Health status set to NOT_SERVING");
        }
    }
}

impl HealthServiceImpl {
    /// Creates a service that starts out serving, plus its reporter.
    #[must_use]
    pub fn new() -> (Self, HealthReporter) {
        let (tx, rx) = watch::channel(true);
        (
            Self { serving: rx },
            HealthReporter {
                tx: std::sync::Arc::new(tx),
            },
        )
    }

    fn status_for(service: &str, serving: bool) -> ServingStatus {
        match service {
            "" | USER_SERVICE_NAME if serving => ServingStatus::Serving,
            "" | USER_SERVICE_NAME => ServingStatus::NotServing,
            _ => ServingStatus::ServiceUnknown,
        }
    }

    fn response(status: ServingStatus) -> HealthCheckResponse {
        HealthCheckResponse {
            status: status.into(),
        }
    }
}

type HealthStream = Pin<Box<dyn Stream<Item = Result<HealthCheckResponse, Status>> + Send>>;

#[tonic::async_trait]
impl Health for HealthServiceImpl {
    async fn check(
        &self,
        request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        let service = request.into_inner().service;
        let status = Self::status_for(&service, *self.serving.borrow());
        debug!(service = %service, status = ?status, "Health check");
        Ok(Response::new(Self::response(status)))
    }

    type WatchStream = HealthStream;

    async fn watch(
        &self,
        request: Request<HealthCheckRequest>,
    ) -> Result<Response<Self::WatchStream>, Status> {
        let service = request.into_inner().service;
        debug!(service = %service, "Health watch");

        let stream = WatchStream::new(self.serving.clone())
            .map(move |serving| Ok(Self::response(Self::status_for(&service, serving))));
        Ok(Response::new(Box::pin(stream)))
    }
}
