//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound:
//!     URL text
//!     → endpoint.rs (host, port, plain|secure)
//!     → connector.rs (bounded connect, retries, cancellation)
//!     → tls.rs (optional TLS upgrade with explicit trust)
//!     → connection.rs (one socket, one exchange)
//!
//! Inbound:
//!     listener.rs (accept loop, connection limits)
//!     → connection.rs (tracked for graceful shutdown)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - One connection carries exactly one request/response cycle
//! - Bounded accept queue prevents resource exhaustion
//! - TLS trust is never an implicit global default

pub mod connection;
pub mod connector;
pub mod endpoint;
pub mod listener;
pub mod tls;

pub use connection::{Connection, ConnectionId, ConnectionTracker};
pub use connector::{ConnectError, RetryDelay, TransportConnector};
pub use endpoint::{Endpoint, EndpointError, Scheme};
pub use listener::{Listener, ListenerError};
pub use tls::{Keystore, TlsError, TlsTrust};
