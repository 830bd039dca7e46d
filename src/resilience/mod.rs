//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound connect:
//!     → connector attempt fails
//!     → backoff.rs (optional jittered delay)
//!     → next attempt, until retries + 1 attempts were made
//! ```
//!
//! # Design Decisions
//! - Retries are sequential and blocking; no fan-out
//! - Jittered backoff prevents thundering herd

pub mod backoff;
