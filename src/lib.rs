//! HTTP message exchange engine with a SOAP-over-HTTP servicing layer.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod soap;
pub mod transform;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::SoapwireConfig;
pub use http::{HttpClient, HttpServer};
pub use lifecycle::Shutdown;
pub use net::{Connection, Endpoint, TransportConnector};
pub use soap::{EchoService, SoapHttpServicer};
