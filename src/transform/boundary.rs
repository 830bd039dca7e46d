//! Boundary negotiators.

use crate::transform::{Boundary, BoundaryNegotiator};

/// Units of exactly `size` bytes (the final unit may be shorter).
#[derive(Debug, Clone, Copy)]
pub struct FixedBlock(pub usize);

impl BoundaryNegotiator for FixedBlock {
    fn negotiate(&mut self, unit: &[u8], _appended: usize) -> Boundary {
        let size = self.0.max(1);
        match unit.len() {
            len if len < size => Boundary::NeedMore(size - len),
            len if len == size => Boundary::Complete,
            len => Boundary::CompleteWithExcess(len - size),
        }
    }
}

/// The whole stream is a single unit, completed at end of input.
#[derive(Debug, Clone, Copy, Default)]
pub struct WholeStream;

/// Read size requested while waiting for end of input.
const WHOLE_STREAM_READ: usize = 8 * 1024;

impl BoundaryNegotiator for WholeStream {
    fn negotiate(&mut self, _unit: &[u8], _appended: usize) -> Boundary {
        Boundary::NeedMore(WHOLE_STREAM_READ)
    }
}
