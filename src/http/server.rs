//! Inbound HTTP serving.
//!
//! # Responsibilities
//! - Accept connections under the configured connection limit
//! - Read one request head per connection and hand it to a [`RequestServicer`]
//! - Answer unparsable request heads with a canned 400
//! - Stop accepting on shutdown and drain in-flight connections
//!
//! # Design Decisions
//! - One task per accepted connection, one request per connection
//! - The servicer owns the rest of the exchange (body, interim and final
//!   responses) through an [`HttpTransaction`]

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::http::body::Body;
use crate::http::exchange::{ExchangeError, MessageExchange};
use crate::http::request::RequestHeader;
use crate::http::response::{CannedResponse, ResponseHeader};
use crate::net::{Connection, Listener, ListenerError};
use crate::observability::metrics;

/// How long in-flight connections may take to finish after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Handles one inbound request.
#[async_trait]
pub trait RequestServicer: Send + Sync {
    async fn service(&self, transaction: &mut HttpTransaction<'_>);
}

/// One inbound request and the response being prepared for it.
pub struct HttpTransaction<'c> {
    pub request: RequestHeader,
    /// Pending final response, pre-set to `200 OK` with `Connection: close`.
    pub response: ResponseHeader,
    remote_addr: SocketAddr,
    exchange: MessageExchange<'c>,
}

impl<'c> HttpTransaction<'c> {
    pub fn new(request: RequestHeader, remote_addr: SocketAddr, exchange: MessageExchange<'c>) -> Self {
        let mut response = ResponseHeader::new(200);
        response.fields.set_connection("close");
        Self {
            request,
            response,
            remote_addr,
            exchange,
        }
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn remote_ip(&self) -> IpAddr {
        self.remote_addr.ip()
    }

    pub fn exchange(&mut self) -> &mut MessageExchange<'c> {
        &mut self.exchange
    }

    /// The request body decoded as text.
    pub async fn receive_body_string(&mut self) -> Result<String, ExchangeError> {
        self.exchange.receive_body_string(&self.request.fields).await
    }

    /// An interim `100 Continue`.
    pub async fn send_continue(&mut self) -> Result<(), ExchangeError> {
        self.exchange.send_canned(CannedResponse::Continue).await
    }

    pub async fn send_canned(&mut self, canned: CannedResponse) -> Result<(), ExchangeError> {
        metrics::record_exchange("server", canned.status());
        self.exchange.send_canned(canned).await
    }

    /// Send the pending response header with `body`, declaring its length.
    pub async fn send_response(&mut self, body: Vec<u8>) -> Result<(), ExchangeError> {
        self.response.fields.set_content_length(body.len() as u64);
        metrics::record_exchange("server", self.response.status);
        self.exchange.send_header(&self.response).await?;
        self.exchange
            .send_body(&self.response.fields, Body::from(body))
            .await?;
        Ok(())
    }
}

/// Accept loop dispatching each connection to a [`RequestServicer`].
pub struct HttpServer {
    servicer: Arc<dyn RequestServicer>,
}

impl HttpServer {
    pub fn new(servicer: Arc<dyn RequestServicer>) -> Self {
        Self { servicer }
    }

    /// Serve until `shutdown` fires, then wait for open connections to finish.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let tracker = listener.tracker();
        tracing::info!(address = %listener.local_addr()?, "HTTP server starting");

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((connection, permit)) => {
                        let servicer = Arc::clone(&self.servicer);
                        tokio::spawn(async move {
                            let _permit = permit;
                            handle_connection(servicer.as_ref(), connection).await;
                        });
                    }
                    Err(ListenerError::Closed) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
            }
        }

        let active = tracker.active_count();
        if active > 0 {
            tracing::info!(active, "Draining connections");
            if tokio::time::timeout(DRAIN_TIMEOUT, tracker.wait_for_idle())
                .await
                .is_err()
            {
                tracing::warn!(
                    remaining = tracker.active_count(),
                    "Drain timeout elapsed, abandoning connections"
                );
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn handle_connection(servicer: &dyn RequestServicer, mut connection: Connection) {
    let connection_id = connection.id();
    let remote_addr = connection.remote_addr();

    {
        let mut exchange = MessageExchange::new(&mut connection);
        match exchange.receive_request_header().await {
            Ok(request) => {
                tracing::debug!(
                    %connection_id,
                    %remote_addr,
                    method = %request.method,
                    path = %request.path,
                    "Request received"
                );
                let mut transaction = HttpTransaction::new(request, remote_addr, exchange);
                servicer.service(&mut transaction).await;
            }
            Err(ExchangeError::Closed) => {
                tracing::trace!(%connection_id, "Peer closed before sending a request");
            }
            Err(e) => {
                tracing::debug!(%connection_id, %remote_addr, error = %e, "Bad request head");
                metrics::record_exchange("server", CannedResponse::BadRequest.status());
                if let Err(e) = exchange.send_canned(CannedResponse::BadRequest).await {
                    tracing::debug!(%connection_id, error = %e, "Could not send 400");
                }
            }
        }
    }

    connection.disconnect().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ListenerConfig;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    struct Hello;

    #[async_trait]
    impl RequestServicer for Hello {
        async fn service(&self, transaction: &mut HttpTransaction<'_>) {
            let body = format!("hello {}", transaction.request.path);
            transaction.response.fields.set_content_type("text/plain");
            let _ = transaction.send_response(body.into_bytes()).await;
        }
    }

    async fn start() -> (SocketAddr, broadcast::Sender<()>, tokio::task::JoinHandle<()>) {
        let config = ListenerConfig {
            bind_address: "127.0.0.1:0".into(),
            max_connections: 8,
        };
        let listener = Listener::bind(&config).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = broadcast::channel(1);
        let server = HttpServer::new(Arc::new(Hello));
        let handle = tokio::spawn(async move {
            server.run(listener, rx).await.unwrap();
        });
        (addr, tx, handle)
    }

    async fn roundtrip(addr: SocketAddr, raw: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw).await.unwrap();
        let mut reply = String::new();
        stream.read_to_string(&mut reply).await.unwrap();
        reply
    }

    #[tokio::test]
    async fn serves_one_request_per_connection() {
        let (addr, tx, handle) = start().await;

        let reply = roundtrip(addr, b"GET /world HTTP/1.1\r\nHost: x\r\n\r\n").await;
        assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(reply.contains("Connection: close\r\n"));
        assert!(reply.contains("Content-Length: 12\r\n"));
        assert!(reply.ends_with("\r\n\r\nhello /world"));

        tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn malformed_head_gets_400() {
        let (addr, tx, handle) = start().await;

        let reply = roundtrip(addr, b"garbage\r\n\r\n").await;
        assert!(reply.starts_with("HTTP/1.1 400 Bad Request\r\n"));

        tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
