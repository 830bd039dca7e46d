//! Gzip content coding.
//!
//! [`encode`] and [`decode`] are what the HTTP layer uses for message
//! bodies; both run the body through a [`TransformReader`].

use std::io::{self, Read, Write};

use flate2::write::{GzDecoder as GzWriteDecoder, GzEncoder};
use flate2::Compression;

use crate::transform::{FixedBlock, TransformReader, Transformer, WholeStream};

/// Unit size fed to the compressor.
const ENCODE_BLOCK: usize = 16 * 1024;

/// Compress a complete body.
pub fn encode(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut packed = Vec::with_capacity(data.len() / 2);
    TransformReader::new(data, FixedBlock(ENCODE_BLOCK), GzipEncode::default())
        .read_to_end(&mut packed)?;
    Ok(packed)
}

/// Decompress a complete body.
pub fn decode(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 2);
    TransformReader::new(data, WholeStream, GzipDecode::default()).read_to_end(&mut out)?;
    Ok(out)
}

/// Streaming compressor; emits whatever the encoder has produced so far.
pub struct GzipEncode {
    encoder: Option<GzEncoder<Vec<u8>>>,
}

impl GzipEncode {
    pub fn new(level: Compression) -> Self {
        Self {
            encoder: Some(GzEncoder::new(Vec::new(), level)),
        }
    }
}

impl Default for GzipEncode {
    fn default() -> Self {
        Self::new(Compression::default())
    }
}

impl Transformer for GzipEncode {
    fn transform(&mut self, unit: &[u8], last: bool) -> io::Result<Vec<u8>> {
        let Some(encoder) = self.encoder.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::Other, "gzip stream already finished"));
        };
        encoder.write_all(unit)?;
        if !last {
            return Ok(std::mem::take(encoder.get_mut()));
        }
        match self.encoder.take() {
            Some(encoder) => encoder.finish(),
            None => Ok(Vec::new()),
        }
    }
}

/// Streaming decompressor.
pub struct GzipDecode {
    decoder: Option<GzWriteDecoder<Vec<u8>>>,
}

impl GzipDecode {
    pub fn new() -> Self {
        Self {
            decoder: Some(GzWriteDecoder::new(Vec::new())),
        }
    }
}

impl Default for GzipDecode {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer for GzipDecode {
    fn transform(&mut self, unit: &[u8], last: bool) -> io::Result<Vec<u8>> {
        let Some(decoder) = self.decoder.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::Other, "gzip stream already finished"));
        };
        decoder.write_all(unit)?;
        if !last {
            return Ok(std::mem::take(decoder.get_mut()));
        }
        match self.decoder.take() {
            Some(decoder) => decoder.finish(),
            None => Ok(Vec::new()),
        }
    }
}
