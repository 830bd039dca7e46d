//! Startup orchestration.
//!
//! # Responsibilities
//! - Bind the listener from validated configuration
//! - Wire the SOAP servicer into an HTTP server task
//! - Hand back a handle that can stop the server and wait for it
//!
//! # Design Decisions
//! - Fail fast: a bad address or bind error is returned before any task starts
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::SoapwireConfig;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::net::{Listener, ListenerError};
use crate::soap::{SoapHttpServicer, SoapWebService};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cannot listen on {address:?}: {source}")]
    Listen {
        address: String,
        #[source]
        source: ListenerError,
    },
}

/// A server task that is accepting connections.
pub struct RunningServer {
    local_addr: SocketAddr,
    shutdown: Shutdown,
    handle: JoinHandle<std::io::Result<()>>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Coordinator that stops this server when triggered.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Stop accepting, drain open connections and wait for the task.
    pub async fn stop(self) -> std::io::Result<()> {
        self.shutdown.trigger();
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(std::io::Error::new(std::io::ErrorKind::Other, e)),
        }
    }
}

/// Bind `config.listener` and serve `service` on it.
pub async fn start(
    config: &SoapwireConfig,
    service: Arc<dyn SoapWebService>,
) -> Result<RunningServer, StartupError> {
    let failed = |source| StartupError::Listen {
        address: config.listener.bind_address.clone(),
        source,
    };
    let listener = Listener::bind(&config.listener).await.map_err(failed)?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| failed(ListenerError::Bind(e)))?;

    let servicer = SoapHttpServicer::new(
        service,
        Duration::from_millis(config.soap.continue_interval_ms),
    );
    let server = HttpServer::new(Arc::new(servicer));
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tracing::info!(address = %local_addr, "SOAP service listening");
    Ok(RunningServer {
        local_addr,
        shutdown,
        handle,
    })
}
