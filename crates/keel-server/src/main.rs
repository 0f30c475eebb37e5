//! # Keel Server
//!
//! Main entry point for the Keel user service.

use keel_config::ConfigLoader;
use keel_core::telemetry::{self, TelemetryConfig};
use keel_server::app::{shutdown_signal, App};
use keel_server::startup;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match ConfigLoader::from_default_location().load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let telemetry = match telemetry::init(&TelemetryConfig::from(&config.observability)) {
        Ok(telemetry) => telemetry,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {e}");
            std::process::exit(1);
        }
    };

    startup::print_banner();
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Environment: {}", config.app.environment);

    if let Err(e) = App::new(config, telemetry).run(shutdown_signal()).await {
        error!(error = ?e, "Application error");
        std::process::exit(1);
    }
}
