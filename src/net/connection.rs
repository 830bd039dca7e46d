//! Connection ownership and lifecycle tracking.
//!
//! # Responsibilities
//! - Own exactly one transport socket per logical request/response cycle
//! - Generate unique connection IDs for tracing
//! - Count live inbound connections for graceful shutdown
//!
//! A [`Connection`] is never pooled or reused: it has no reconnect method and
//! is torn down with [`Connection::disconnect`] once its exchange is over.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufStream, ReadBuf};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_rustls::client::TlsStream;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection number, shown as `conn-<n>` in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The byte stream under a connection.
#[derive(Debug)]
pub enum Transport {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for Transport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Transport {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Transport::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(s) => Pin::new(s).poll_flush(cx),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// One open transport connection and its peer.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    stream: Option<BufStream<Transport>>,
    remote_addr: SocketAddr,
    remote_host: String,
    _guard: Option<ConnectionGuard>,
}

impl Connection {
    /// Wrap an established transport.
    pub fn new(transport: Transport, remote_addr: SocketAddr, remote_host: impl Into<String>) -> Self {
        Self {
            id: ConnectionId::next(),
            stream: Some(BufStream::new(transport)),
            remote_addr,
            remote_host: remote_host.into(),
            _guard: None,
        }
    }

    /// Wrap an accepted inbound socket, counted by `guard` until dropped.
    pub fn inbound(stream: TcpStream, remote_addr: SocketAddr, guard: ConnectionGuard) -> Self {
        Self {
            id: guard.id(),
            stream: Some(BufStream::new(Transport::Plain(stream))),
            remote_addr,
            remote_host: remote_addr.ip().to_string(),
            _guard: Some(guard),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Host name the connection was opened to (or the peer IP for inbound).
    pub fn remote_host(&self) -> &str {
        &self.remote_host
    }

    pub fn remote_port(&self) -> u16 {
        self.remote_addr.port()
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Buffered stream, or `NotConnected` after [`disconnect`](Self::disconnect).
    pub fn stream(&mut self) -> io::Result<&mut BufStream<Transport>> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "connection closed"))
    }

    /// Close the connection. Safe to call any number of times.
    pub async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            // Pending bytes are best effort at this point.
            let _ = stream.flush().await;
            let _ = stream.shutdown().await;
            tracing::trace!(connection_id = %self.id, remote_addr = %self.remote_addr, "Disconnected");
        }
    }
}

/// Live inbound connection count. Clones share the count.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    live: Arc<watch::Sender<usize>>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        let (live, _) = watch::channel(0);
        Self { live: Arc::new(live) }
    }

    /// Count one more connection until the returned guard drops.
    pub fn track(&self) -> ConnectionGuard {
        self.live.send_modify(|n| *n += 1);
        ConnectionGuard {
            live: Arc::clone(&self.live),
            id: ConnectionId::next(),
        }
    }

    pub fn active_count(&self) -> usize {
        *self.live.borrow()
    }

    /// Resolves once no tracked connection is left.
    pub async fn wait_for_idle(&self) {
        let mut live = self.live.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = live.wait_for(|n| *n == 0).await;
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds one slot of a [`ConnectionTracker`].
#[derive(Debug)]
pub struct ConnectionGuard {
    live: Arc<watch::Sender<usize>>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.live.send_modify(|n| *n = n.saturating_sub(1));
        tracing::trace!(connection_id = %self.id, "Connection released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn ids_increase() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert!(b > a);
        assert_eq!(a.to_string(), format!("conn-{}", a.as_u64()));
    }

    #[tokio::test]
    async fn idle_after_last_guard_drops() {
        let tracker = ConnectionTracker::new();
        tracker.wait_for_idle().await;

        let first = tracker.track();
        let second = tracker.clone().track();
        assert_eq!(tracker.active_count(), 2);
        assert_ne!(first.id(), second.id());

        let waiter = tokio::spawn({
            let tracker = tracker.clone();
            async move { tracker.wait_for_idle().await }
        });
        drop(first);
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(second);
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stream = TcpStream::connect(addr).await.unwrap();

        let mut conn = Connection::new(Transport::Plain(stream), addr, "127.0.0.1");
        assert!(conn.is_connected());
        assert_eq!(conn.remote_port(), addr.port());

        conn.disconnect().await;
        conn.disconnect().await;
        assert!(!conn.is_connected());
        assert_eq!(
            conn.stream().unwrap_err().kind(),
            io::ErrorKind::NotConnected
        );
    }

    #[tokio::test]
    async fn inbound_connection_releases_guard_on_drop() {
        let tracker = ConnectionTracker::new();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _client = TcpStream::connect(addr).await.unwrap();
        let (socket, peer) = listener.accept().await.unwrap();

        let conn = Connection::inbound(socket, peer, tracker.track());
        assert_eq!(tracker.active_count(), 1);
        assert_eq!(conn.remote_host(), "127.0.0.1");
        drop(conn);
        assert_eq!(tracker.active_count(), 0);
    }
}
