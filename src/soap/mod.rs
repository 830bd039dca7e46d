//! SOAP-over-HTTP servicing subsystem.
//!
//! # Data Flow
//! ```text
//! http::HttpServer → servicer.rs (SoapHttpServicer)
//!     GET  → service description by path, or 404
//!     POST → [Expect: 100-continue → SOAPAction check → 100 Continue]
//!          → message.rs (envelope → SoapMessage, or client fault)
//!          → dispatcher.rs (method task + keep-alives → result or fault)
//!          → final 200 response, gzip-encoded when negotiated
//! ```

pub mod dispatcher;
pub mod message;
pub mod service;
pub mod servicer;

pub use dispatcher::{DispatchReport, DispatchState, SoapAsyncDispatcher, CONTINUE_TIME};
pub use message::{FaultCode, SoapError, SoapFault, SoapMessage, SoapPayload};
pub use service::{EchoService, ServiceError, SoapCall, SoapWebService};
pub use servicer::SoapHttpServicer;
