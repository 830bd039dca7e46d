//! soapwire server.
//!
//! Serves the bundled echo SOAP service until SIGINT/SIGTERM.
//!
//! ```text
//!   client ──▶ net::Listener ──▶ http::HttpServer ──▶ soap::SoapHttpServicer
//!                                                          │
//!                      100 Continue every interval ◀───────┤ method task
//!                      final 200 (result | fault)  ◀───────┘
//! ```
//!
//! Usage: `soapwire [config.toml]`

use std::path::Path;
use std::sync::Arc;

use soapwire::config::{load_config, SoapwireConfig};
use soapwire::lifecycle::{self, signals};
use soapwire::observability::{logging, metrics};
use soapwire::soap::EchoService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => load_config(Path::new(&path))?,
        None => SoapwireConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "soapwire starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        continue_interval_ms = config.soap.continue_interval_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let service = Arc::new(EchoService::new(
        config.soap.service_uri.clone(),
        config.soap.wsdl_path.clone(),
    ));
    let server = lifecycle::start(&config, service).await?;

    signals::wait_for_shutdown().await?;
    server.stop().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
