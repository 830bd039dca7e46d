//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured key/value fields)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, filtered)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Library code only emits; binaries install subscribers and recorders
//! - Invocation failures are logged in full but never sent to clients

pub mod logging;
pub mod metrics;
