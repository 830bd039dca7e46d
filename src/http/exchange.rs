//! Header and body framing over one connection.
//!
//! # Responsibilities
//! - Write start line, fields and body with declared-length framing
//! - Read request and response heads, bounded by [`MAX_HEADER_BYTES`]
//! - Drain informational (1xx) responses so callers only see final ones
//! - Read bodies by declared length, or until the peer closes
//!
//! # Design Decisions
//! - No chunked transfer coding; a body is either declared or runs to EOF
//! - Every send is flushed so interim responses reach the peer immediately

use std::io;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::http::body::Body;
use crate::http::header::{HeaderError, HeaderFields, MessageHeader, MAX_HEADER_BYTES};
use crate::http::request::RequestHeader;
use crate::http::response::{CannedResponse, ResponseHeader};
use crate::net::Connection;
use crate::transform::gzip;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),

    #[error("malformed header: {0}")]
    Header(#[from] HeaderError),

    #[error("connection closed before a header arrived")]
    Closed,

    #[error("body sent before its header")]
    HeaderNotSent,

    #[error("body length {actual} does not match declared Content-Length {declared}")]
    LengthMismatch { declared: u64, actual: u64 },

    #[error("body ended after {received} of {declared} bytes")]
    Truncated { declared: u64, received: u64 },
}

pub type Result<T> = std::result::Result<T, ExchangeError>;

/// One request/response cycle over a borrowed [`Connection`].
pub struct MessageExchange<'c> {
    connection: &'c mut Connection,
    header_sent: bool,
    informational_drained: usize,
}

impl<'c> MessageExchange<'c> {
    pub fn new(connection: &'c mut Connection) -> Self {
        Self {
            connection,
            header_sent: false,
            informational_drained: 0,
        }
    }

    pub fn connection(&self) -> &Connection {
        self.connection
    }

    /// Interim responses skipped by [`receive_response_header`](Self::receive_response_header).
    pub fn informational_drained(&self) -> usize {
        self.informational_drained
    }

    /// Serialize and flush a start line and its fields.
    pub async fn send_header(&mut self, header: &impl MessageHeader) -> Result<()> {
        let wire = header.to_wire();
        let stream = self.connection.stream()?;
        stream.write_all(wire.as_bytes()).await?;
        stream.flush().await?;
        self.header_sent = true;
        Ok(())
    }

    /// Send `body` after its header. A declared `Content-Length` must match
    /// the body exactly; streamed bodies are cut at the declared length.
    pub async fn send_body(&mut self, fields: &HeaderFields, body: Body) -> Result<u64> {
        if !self.header_sent {
            return Err(ExchangeError::HeaderNotSent);
        }
        let declared = fields.content_length();
        if let (Some(declared), Some(actual)) = (declared, body.known_len()) {
            if declared != actual {
                return Err(ExchangeError::LengthMismatch { declared, actual });
            }
        }

        let stream = self.connection.stream()?;
        let written = match body {
            Body::Empty => 0,
            Body::Bytes(bytes) => {
                stream.write_all(&bytes).await?;
                bytes.len() as u64
            }
            Body::Text(text) => {
                stream.write_all(text.as_bytes()).await?;
                text.len() as u64
            }
            Body::Reader(reader) => match declared {
                Some(declared) => {
                    let mut limited = reader.take(declared);
                    let copied = tokio::io::copy(&mut limited, stream).await?;
                    if copied != declared {
                        return Err(ExchangeError::LengthMismatch {
                            declared,
                            actual: copied,
                        });
                    }
                    copied
                }
                None => {
                    let mut reader = reader;
                    tokio::io::copy(&mut reader, stream).await?
                }
            },
        };
        stream.flush().await?;
        Ok(written)
    }

    /// Header and body of a canned server response.
    pub async fn send_canned(&mut self, canned: CannedResponse) -> Result<()> {
        let header = canned.header();
        self.send_header(&header).await?;
        if let Some(body) = canned.body() {
            self.send_body(&header.fields, Body::Text(body)).await?;
        }
        Ok(())
    }

    pub async fn receive_request_header(&mut self) -> Result<RequestHeader> {
        let head = self.read_head().await?;
        Ok(RequestHeader::parse(&head)?)
    }

    /// One response header, which may be informational.
    pub async fn receive_header(&mut self) -> Result<ResponseHeader> {
        let head = self.read_head().await?;
        Ok(ResponseHeader::parse(&head)?)
    }

    /// The first non-1xx response header. Each informational header's body
    /// (empty unless declared) is drained and discarded.
    pub async fn receive_response_header(&mut self) -> Result<ResponseHeader> {
        loop {
            let header = self.receive_header().await?;
            if !header.is_informational() {
                return Ok(header);
            }
            if let Some(length) = header.fields.content_length() {
                self.read_exact_into(length, &mut tokio::io::sink()).await?;
            }
            self.informational_drained += 1;
            tracing::trace!(
                connection_id = %self.connection.id(),
                status = header.status,
                "Drained informational response"
            );
        }
    }

    /// Copy the body into `sink`: the declared length, or everything up to
    /// the peer closing when only a `Content-Type` was declared. A message
    /// declaring neither has no body.
    pub async fn receive_body<W>(&mut self, fields: &HeaderFields, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        match fields.content_length() {
            Some(length) => self.read_exact_into(length, sink).await,
            None if fields.content_type().is_none() => Ok(0),
            None => {
                let stream = self.connection.stream()?;
                Ok(tokio::io::copy(stream, sink).await?)
            }
        }
    }

    pub async fn receive_body_bytes(&mut self, fields: &HeaderFields) -> Result<Vec<u8>> {
        let mut body = Vec::with_capacity(fields.content_length().unwrap_or(0).min(1 << 20) as usize);
        self.receive_body(fields, &mut body).await?;
        Ok(body)
    }

    /// Body as text: gzip content coding is undone, then the declared
    /// charset is applied (UTF-8 when absent or unknown).
    pub async fn receive_body_string(&mut self, fields: &HeaderFields) -> Result<String> {
        let mut body = self.receive_body_bytes(fields).await?;
        if fields.content_encoding_contains("gzip") {
            body = gzip::decode(&body)?;
        }
        Ok(decode_text(body, fields.charset().as_deref()))
    }

    async fn read_exact_into<W>(&mut self, length: u64, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let stream = self.connection.stream()?;
        let mut limited = stream.take(length);
        let received = tokio::io::copy(&mut limited, sink).await?;
        if received < length {
            return Err(ExchangeError::Truncated {
                declared: length,
                received,
            });
        }
        Ok(received)
    }

    /// Read lines up to the blank line ending a header block. Blank lines
    /// before the start line are skipped.
    async fn read_head(&mut self) -> Result<String> {
        let stream = self.connection.stream()?;
        let mut head = String::new();
        let mut line = Vec::new();
        let mut total = 0;

        loop {
            line.clear();
            // One byte past the limit is enough to know the head is too large.
            let budget = (MAX_HEADER_BYTES - total + 1) as u64;
            let read = (&mut *stream)
                .take(budget)
                .read_until(b'\n', &mut line)
                .await?;
            if read == 0 {
                if head.is_empty() {
                    return Err(ExchangeError::Closed);
                }
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "header truncated").into());
            }
            total += read;
            if total > MAX_HEADER_BYTES {
                return Err(HeaderError::TooLarge(MAX_HEADER_BYTES).into());
            }

            let text = latin1_or_utf8(&line);
            let text = text.trim_end_matches(&['\r', '\n'][..]);
            if text.is_empty() {
                if head.is_empty() {
                    continue;
                }
                return Ok(head);
            }
            head.push_str(text);
            head.push_str("\r\n");
        }
    }
}

/// Header bytes are normally ASCII; anything else is taken as UTF-8 when
/// valid and as ISO-8859-1 otherwise.
fn latin1_or_utf8(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn decode_text(bytes: Vec<u8>, charset: Option<&str>) -> String {
    match charset.map(str::to_ascii_lowercase).as_deref() {
        Some("iso-8859-1" | "latin1" | "latin-1" | "us-ascii" | "ascii") => {
            bytes.iter().map(|&b| b as char).collect()
        }
        _ => match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        },
    }
}
