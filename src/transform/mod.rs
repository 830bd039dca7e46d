//! Content transform pipeline.
//!
//! # Data Flow
//! ```text
//! inner reader (arbitrary chunk sizes)
//!     → boundary.rs (decides when a logical unit is complete)
//!     → Transformer (gzip, identity, ...) per completed unit
//!     → reader.rs (hands transformed bytes out in order, supports skip)
//! ```
//!
//! # Design Decisions
//! - Physical read sizes never leak into the transformer's view of units
//! - The last unit is always delivered with `last = true`, even when empty,
//!   so stateful transformers can flush

use std::io;

pub mod boundary;
pub mod gzip;
pub mod reader;

pub use boundary::{FixedBlock, WholeStream};
pub use gzip::{GzipDecode, GzipEncode};
pub use reader::TransformReader;

/// Outcome of inspecting the bytes accumulated for the current unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// The accumulated bytes are exactly one unit.
    Complete,
    /// This many more bytes are needed before the unit is complete.
    NeedMore(usize),
    /// The unit is complete and its trailing `n` bytes start the next one.
    CompleteWithExcess(usize),
}

/// Decides where logical units end.
pub trait BoundaryNegotiator {
    /// `unit` holds everything accumulated so far; `appended` is how many of
    /// those bytes arrived with the latest read.
    fn negotiate(&mut self, unit: &[u8], appended: usize) -> Boundary;
}

/// Transforms completed units.
pub trait Transformer {
    fn transform(&mut self, unit: &[u8], last: bool) -> io::Result<Vec<u8>>;
}

/// Passes units through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Transformer for Identity {
    fn transform(&mut self, unit: &[u8], _last: bool) -> io::Result<Vec<u8>> {
        Ok(unit.to_vec())
    }
}
