//! HTTP message exchange subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound (client.rs):
//!     URL → net::TransportConnector → Connection
//!     → request.rs (start line + header.rs fields)
//!     → exchange.rs (send header, send body, drain 1xx, receive final header + body)
//!     → body as text, or saved to a file
//!
//! Inbound (server.rs):
//!     net::Listener → Connection
//!     → exchange.rs (receive request head)
//!     → RequestServicer (e.g. soap::SoapHttpServicer)
//!     → response.rs (interim / canned / final responses)
//! ```

pub mod body;
pub mod client;
pub mod exchange;
pub mod header;
pub mod request;
pub mod response;
pub mod server;

pub use body::Body;
pub use client::{ClientError, HttpClient};
pub use exchange::{ExchangeError, MessageExchange};
pub use header::{HeaderError, HeaderFields, MessageHeader};
pub use request::{Request, RequestHeader};
pub use response::{CannedResponse, ResponseHeader};
pub use server::{HttpServer, HttpTransaction, RequestServicer};
