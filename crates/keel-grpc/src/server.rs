//! gRPC server setup.

use crate::proto::{health::health_server::HealthServer, user::user_service_server::UserServiceServer};
use crate::services::{HealthServiceImpl, UserGrpcService};
use keel_config::ServerConfig;
use keel_core::{KeelError, KeelResult};
use std::future::Future;
use std::net::SocketAddr;
use tonic::transport::server::Router;
use tonic::transport::Server;
use tracing::info;

/// gRPC server exposing the user and health services.
pub struct GrpcServer {
    addr: SocketAddr,
    user_service: UserGrpcService,
    health_service: HealthServiceImpl,
}

impl GrpcServer {
    /// Creates a new gRPC server bound to `config.grpc_addr()`.
    pub fn new(
        config: &ServerConfig,
        user_service: UserGrpcService,
        health_service: HealthServiceImpl,
    ) -> KeelResult<Self> {
        let addr = config
            .grpc_addr()
            .parse()
            .map_err(|e| KeelError::Configuration(format!("Invalid gRPC address: {e}")))?;

        Ok(Self {
            addr,
            user_service,
            health_service,
        })
    }

    /// Returns the address the server will listen on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Builds the tonic router without binding a listener.
    #[must_use]
    pub fn into_router(self) -> Router {
        Server::builder()
            .add_service(HealthServer::new(self.health_service))
            .add_service(UserServiceServer::new(self.user_service))
    }

    /// Serves until `signal` resolves, then stops accepting and drains
    /// in-flight calls.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> KeelResult<()>
    where
        F: Future<Output = ()> + Send,
    {
        let addr = self.addr;
        info!(%addr, "Starting gRPC server");

        self.into_router()
            .serve_with_shutdown(addr, signal)
            .await
            .map_err(|e| KeelError::internal(format!("gRPC server error: {e}")))?;

        info!("gRPC server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::ErrorKind;
    use std::sync::Arc;

    fn user_service() -> UserGrpcService {
        let users = keel_service::UserServiceImpl::new(
            Arc::new(keel_repository::InMemoryUserRepository::new()),
            Arc::new(keel_service::MemoryCache::new()),
            std::time::Duration::from_secs(60),
        );
        UserGrpcService::new(Arc::new(users))
    }

    #[test]
    fn test_new_parses_address() {
        let config = ServerConfig {
            grpc_host: "127.0.0.1".to_string(),
            grpc_port: 6000,
            ..ServerConfig::default()
        };
        let (health, _reporter) = HealthServiceImpl::new();
        let server = GrpcServer::new(&config, user_service(), health).unwrap();
        assert_eq!(server.addr(), "127.0.0.1:6000".parse().unwrap());
    }

    #[test]
    fn test_new_rejects_bad_host() {
        let config = ServerConfig {
            grpc_host: "not a host".to_string(),
            ..ServerConfig::default()
        };
        let (health, _reporter) = HealthServiceImpl::new();
        let err = GrpcServer::new(&config, user_service(), health).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.to_string().contains("Invalid gRPC address"));
    }
}
