//! Outbound connection establishment with bounded retries.
//!
//! # Responsibilities
//! - Resolve an endpoint and open a TCP connection within a timeout
//! - Upgrade to TLS for secure endpoints
//! - Retry sequentially, `retries + 1` attempts in total
//!
//! # Design Decisions
//! - Headless: the connector does not log; callers decide what to report
//! - Cancellation is cooperative and only observed between attempts
//! - A failed attempt never leaks a half-built connection

use std::io;
use std::time::Duration;

use rustls::pki_types::ServerName;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;

use crate::net::connection::{Connection, Transport};
use crate::net::endpoint::Endpoint;
use crate::net::tls::{client_config, TlsError, TlsTrust};
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

/// Why a connection could not be produced.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("could not connect to {endpoint} after {attempts} attempt(s): {source}")]
    Exhausted {
        endpoint: String,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    #[error("connecting to {endpoint} cancelled after {attempts} attempt(s)")]
    Cancelled { endpoint: String, attempts: u32 },
}

impl ConnectError {
    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            ConnectError::Exhausted { attempts, .. } | ConnectError::Cancelled { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Delay policy between attempts.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryDelay {
    /// Base delay; zero retries immediately.
    pub base_ms: u64,
    /// Upper bound on the delay.
    pub max_ms: u64,
}

/// Opens [`Connection`]s to endpoints.
#[derive(Clone)]
pub struct TransportConnector {
    tls: TlsConnector,
    retry_delay: RetryDelay,
}

impl TransportConnector {
    /// Create a connector. TLS trust must be chosen by the caller.
    pub fn new(trust: TlsTrust) -> Result<Self, TlsError> {
        Ok(Self {
            tls: TlsConnector::from(client_config(&trust)?),
            retry_delay: RetryDelay::default(),
        })
    }

    /// Wait between attempts according to `delay`.
    pub fn with_retry_delay(mut self, delay: RetryDelay) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Connect to `endpoint`, attempting `retries + 1` times.
    pub async fn connect(
        &self,
        endpoint: &Endpoint,
        timeout: Duration,
        retries: u32,
        cancel: Option<&CancellationToken>,
    ) -> Result<Connection, ConnectError> {
        let mut attempts = 0;
        let mut last_error = None;

        while attempts <= retries {
            if attempts > 0 {
                if cancel.is_some_and(|c| c.is_cancelled()) {
                    return Err(ConnectError::Cancelled {
                        endpoint: endpoint.to_string(),
                        attempts,
                    });
                }
                if self.retry_delay.base_ms > 0 {
                    tokio::time::sleep(calculate_backoff(
                        attempts,
                        self.retry_delay.base_ms,
                        self.retry_delay.max_ms,
                    ))
                    .await;
                }
            }

            attempts += 1;
            metrics::record_connect_attempt(endpoint.is_secure());

            match self.attempt(endpoint, timeout).await {
                Ok(connection) => return Ok(connection),
                Err(e) => last_error = Some(e),
            }
        }

        Err(ConnectError::Exhausted {
            endpoint: endpoint.to_string(),
            attempts,
            source: last_error
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "no attempt made")),
        })
    }

    /// One bounded attempt: TCP connect, then TLS when the endpoint is secure.
    async fn attempt(&self, endpoint: &Endpoint, timeout: Duration) -> io::Result<Connection> {
        let authority = endpoint.authority();
        let stream = tokio::time::timeout(timeout, TcpStream::connect(authority.as_str()))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
        let remote_addr = stream.peer_addr()?;
        stream.set_nodelay(true)?;

        let transport = if endpoint.is_secure() {
            let server_name = ServerName::try_from(endpoint.host().to_string())
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            let tls = tokio::time::timeout(timeout, self.tls.connect(server_name, stream))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "TLS handshake timed out"))??;
            Transport::Tls(Box::new(tls))
        } else {
            Transport::Plain(stream)
        };

        Ok(Connection::new(transport, remote_addr, endpoint.host()))
    }
}

impl std::fmt::Debug for TransportConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConnector")
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}
