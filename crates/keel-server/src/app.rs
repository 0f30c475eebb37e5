//! Application wiring and lifecycle.

use crate::{admin, startup};
use keel_config::AppConfig;
use keel_core::telemetry::Telemetry;
use keel_core::{CancelSource, KeelError, KeelResult};
use keel_grpc::interceptors::metrics::register_metrics;
use keel_grpc::interceptors::RequestMetrics;
use keel_grpc::{GrpcServer, HealthReporter, HealthServiceImpl, InterceptorChain, UserGrpcService};
use keel_repository::{DatabasePool, PgUserRepository};
use keel_service::{CacheInterface, RedisCacheService, UserServiceImpl};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

/// The assembled server process.
pub struct App {
    config: AppConfig,
    telemetry: Telemetry,
}

impl App {
    /// Creates an application from loaded configuration.
    #[must_use]
    pub fn new(config: AppConfig, telemetry: Telemetry) -> Self {
        Self { config, telemetry }
    }

    /// Connects the backends and serves until `signal` resolves.
    ///
    /// # Errors
    ///
    /// Fails if Postgres or (when enabled) Redis cannot be reached at
    /// startup, if a listener cannot bind, or if a server exits with an
    /// error.
    pub async fn run<F>(self, signal: F) -> KeelResult<()>
    where
        F: Future<Output = ()> + Send,
    {
        let config = self.config;

        let db_pool = DatabasePool::connect(&config.database).await?;
        if config.database.run_migrations {
            db_pool.run_migrations().await?;
        }

        let cache: Arc<dyn CacheInterface> = if config.redis.enabled {
            Arc::new(RedisCacheService::connect(&config.redis).await?)
        } else {
            warn!("Redis disabled, serving reads from the store only");
            Arc::new(RedisCacheService::disabled())
        };

        let user_service = Arc::new(UserServiceImpl::new(
            Arc::new(PgUserRepository::new(db_pool.clone())),
            cache,
            config.cache.user_ttl(),
        ));

        let metrics_enabled = self.telemetry.prometheus().is_some();
        if metrics_enabled {
            register_metrics();
        }

        let in_flight = CancelSource::new();
        let stop = CancelSource::new();

        let user_grpc = UserGrpcService::new(user_service)
            .with_chain(InterceptorChain::new(RequestMetrics::new(metrics_enabled)))
            .with_request_timeout(config.server.request_timeout())
            .with_shutdown(in_flight.token());
        let (health, reporter) = HealthServiceImpl::new();
        let grpc_server = GrpcServer::new(&config.server, user_grpc, health)?;

        let admin_addr = config.observability.admin_addr();
        let listener = tokio::net::TcpListener::bind(&admin_addr)
            .await
            .map_err(|e| KeelError::internal(format!("Failed to bind admin listener: {e}")))?;

        startup::print_startup_info(&config.server.grpc_addr(), &admin_addr);

        let grpc_stop = stop.token();
        let admin_stop = stop.token();
        let servers = async {
            tokio::try_join!(
                grpc_server.serve_with_shutdown(async move { grpc_stop.cancelled().await }),
                async {
                    axum::serve(listener, admin::router(self.telemetry))
                        .with_graceful_shutdown(async move { admin_stop.cancelled().await })
                        .await
                        .map_err(|e| KeelError::internal(format!("Admin server error: {e}")))
                },
            )
            .map(|_| ())
        };

        let result = supervise(
            servers,
            signal,
            &Shutdown {
                reporter,
                stop,
                in_flight,
                grace: config.server.shutdown_grace(),
            },
        )
        .await;

        db_pool.close().await;
        info!("Server shutdown complete");
        result
    }
}

/// Handles used to drain the process.
pub struct Shutdown {
    pub reporter: HealthReporter,
    /// Stops the listeners from accepting.
    pub stop: CancelSource,
    /// Cancels requests still running after the grace period.
    pub in_flight: CancelSource,
    pub grace: Duration,
}

/// Drives `servers` until `signal` resolves, then drains them.
///
/// On signal the health status flips to `NOT_SERVING` and the listeners
/// stop accepting. Requests still running after `grace` are cancelled.
pub async fn supervise<S, G>(servers: S, signal: G, shutdown: &Shutdown) -> KeelResult<()>
where
    S: Future<Output = KeelResult<()>>,
    G: Future<Output = ()>,
{
    tokio::pin!(servers);

    tokio::select! {
        result = &mut servers => {
            if let Err(e) = &result {
                error!(error = %e, "Server exited before shutdown signal");
            }
            return result;
        }
        () = signal => {}
    }

    info!(grace_secs = shutdown.grace.as_secs(), "Draining in-flight requests");
    shutdown.reporter.set_not_serving();
    shutdown.stop.cancel();

    match tokio::time::timeout(shutdown.grace, &mut servers).await {
        Ok(result) => result,
        Err(_) => {
            warn!("Grace period elapsed, cancelling in-flight requests");
            shutdown.in_flight.cancel();
            servers.await
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        () = terminate => {
            info!("Received terminate signal, initiating graceful shutdown...");
        }
    }
}
