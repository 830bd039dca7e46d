//! Outbound body sources.

use bytes::Bytes;
use tokio::io::AsyncRead;

/// Where a message body comes from when it is sent.
pub enum Body {
    Empty,
    Bytes(Bytes),
    Text(String),
    /// A stream; its length must be declared in the header.
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl Body {
    /// Length when it is known without reading.
    pub fn known_len(&self) -> Option<u64> {
        match self {
            Body::Empty => Some(0),
            Body::Bytes(b) => Some(b.len() as u64),
            Body::Text(t) => Some(t.len() as u64),
            Body::Reader(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.known_len() == Some(0)
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Empty => f.write_str("Body::Empty"),
            Body::Bytes(b) => write!(f, "Body::Bytes({} bytes)", b.len()),
            Body::Text(t) => write!(f, "Body::Text({} bytes)", t.len()),
            Body::Reader(_) => f.write_str("Body::Reader"),
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(bytes.into())
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}
