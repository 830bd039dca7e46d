//! Pull-based transform over any [`Read`].

use std::io::{self, Read};

use crate::transform::{Boundary, BoundaryNegotiator, Transformer};

/// Largest single read from the inner source.
const MAX_READ: usize = 16 * 1024;

/// Reads `inner`, cuts it into units with `N` and yields the output of `T`.
pub struct TransformReader<R, N, T> {
    inner: R,
    negotiator: N,
    transformer: T,
    unit: Vec<u8>,
    want: usize,
    output: Vec<u8>,
    pos: usize,
    finished: bool,
}

impl<R: Read, N: BoundaryNegotiator, T: Transformer> TransformReader<R, N, T> {
    pub fn new(inner: R, negotiator: N, transformer: T) -> Self {
        Self {
            inner,
            negotiator,
            transformer,
            unit: Vec::new(),
            want: MAX_READ,
            output: Vec::new(),
            pos: 0,
            finished: false,
        }
    }

    /// Discard up to `n` bytes of output. Returns how many were discarded,
    /// which is less than `n` only at end of stream.
    pub fn skip(&mut self, n: u64) -> io::Result<u64> {
        let mut remaining = n;
        while remaining > 0 {
            let available = (self.output.len() - self.pos) as u64;
            if available > 0 {
                let step = available.min(remaining);
                self.pos += step as usize;
                remaining -= step;
                continue;
            }
            if self.finished {
                break;
            }
            self.fill()?;
        }
        Ok(n - remaining)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read once from the inner source and transform every unit the
    /// accumulated bytes now complete.
    fn fill(&mut self) -> io::Result<()> {
        self.output.clear();
        self.pos = 0;

        let mut chunk = vec![0; self.want.clamp(1, MAX_READ)];
        let read = loop {
            match self.inner.read(&mut chunk) {
                Ok(read) => break read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };

        if read == 0 {
            let unit = std::mem::take(&mut self.unit);
            self.emit(&unit, true)?;
            self.finished = true;
            return Ok(());
        }

        self.unit.extend_from_slice(&chunk[..read]);
        let mut appended = read;
        loop {
            match self.negotiator.negotiate(&self.unit, appended) {
                Boundary::NeedMore(more) => {
                    self.want = more;
                    return Ok(());
                }
                Boundary::Complete => {
                    let unit = std::mem::take(&mut self.unit);
                    self.emit(&unit, false)?;
                    self.want = MAX_READ;
                    return Ok(());
                }
                Boundary::CompleteWithExcess(excess) => {
                    let split = self.unit.len() - excess.min(self.unit.len());
                    let rest = self.unit.split_off(split);
                    let unit = std::mem::replace(&mut self.unit, rest);
                    self.emit(&unit, false)?;
                    // The excess is a fresh unit that may itself be complete.
                    appended = self.unit.len();
                    if appended == 0 {
                        self.want = MAX_READ;
                        return Ok(());
                    }
                }
            }
        }
    }

    fn emit(&mut self, unit: &[u8], last: bool) -> io::Result<()> {
        let transformed = self.transformer.transform(unit, last)?;
        self.output.extend_from_slice(&transformed);
        Ok(())
    }
}

impl<R: Read, N: BoundaryNegotiator, T: Transformer> Read for TransformReader<R, N, T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let available = &self.output[self.pos..];
            if !available.is_empty() {
                let n = available.len().min(buf.len());
                buf[..n].copy_from_slice(&available[..n]);
                self.pos += n;
                return Ok(n);
            }
            if self.finished {
                return Ok(0);
            }
            self.fill()?;
        }
    }
}
