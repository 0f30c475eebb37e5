//! Server startup utilities.

use tracing::info;

/// Prints the startup banner.
pub fn print_banner() {
    info!(r"
    __ __          __
   / //_/__  ___  / /
  / ,< / _ \/ _ \/ /
 /_/|_|\___/\___/_/

      user service
    ");
}

/// Prints the listening endpoints.
pub fn print_startup_info(grpc_addr: &str, admin_addr: &str) {
    let separator = "=".repeat(60);
    info!("{}", separator);
    info!("gRPC API:  http://{}", grpc_addr);
    info!("Health:    http://{}/health", admin_addr);
    info!("Metrics:   http://{}/metrics", admin_addr);
    info!("{}", separator);
}
