//! Bounded accept loop for inbound connections.
//!
//! Each accepted socket becomes a tracked [`Connection`] plus a permit from
//! the `max_connections` semaphore; accepting waits while no permit is free.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;
use crate::net::connection::{Connection, ConnectionTracker};

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind: {0}")]
    Bind(std::io::Error),
    #[error("failed to accept: {0}")]
    Accept(std::io::Error),
    #[error("listener closed")]
    Closed,
}

pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
    tracker: ConnectionTracker,
}

impl Listener {
    /// Bind to the configured address with connection limits.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
            ListenerError::Bind(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;

        let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        Ok(Self::from_listener(listener, config.max_connections))
    }

    /// Wrap an already bound listener.
    pub fn from_listener(listener: TcpListener, max_connections: usize) -> Self {
        if let Ok(local_addr) = listener.local_addr() {
            tracing::info!(
                address = %local_addr,
                max_connections,
                "Listener bound"
            );
        }

        Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(max_connections)),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Next inbound connection and the permit to hold while serving it.
    pub async fn accept(&self) -> Result<(Connection, ConnectionPermit), ListenerError> {
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        // Interim keep-alives are tiny writes that must not sit in Nagle's buffer.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(peer_addr = %addr, error = %e, "Could not disable Nagle");
        }

        let connection = Connection::inbound(stream, addr, self.tracker.track());

        tracing::debug!(
            peer_addr = %addr,
            connection_id = %connection.id(),
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((connection, ConnectionPermit { _permit: permit }))
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Free connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    /// Live connection accounting for graceful shutdown.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }
}

/// One slot of the connection limit, released on drop.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn permits_are_held_per_connection() {
        let config = ListenerConfig {
            bind_address: "127.0.0.1:0".into(),
            max_connections: 2,
        };
        let listener = Listener::bind(&config).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let _c1 = TcpStream::connect(addr).await.unwrap();
        let (conn, permit) = listener.accept().await.unwrap();
        assert_eq!(listener.available_permits(), 1);
        assert_eq!(listener.tracker().active_count(), 1);

        drop(permit);
        drop(conn);
        assert_eq!(listener.available_permits(), 2);
        assert_eq!(listener.tracker().active_count(), 0);
    }

    #[tokio::test]
    async fn bad_bind_address() {
        let config = ListenerConfig {
            bind_address: "not-an-address".into(),
            max_connections: 1,
        };
        assert!(matches!(
            Listener::bind(&config).await,
            Err(ListenerError::Bind(_))
        ));
    }
}
