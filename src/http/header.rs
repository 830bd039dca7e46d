//! Header field storage, parsing and serialization.
//!
//! The fields every exchange cares about are promoted to typed slots; all
//! others live in an ordered extension list that keeps their wire case.
//! Lookup by name is case-insensitive either way.

use std::borrow::Cow;

use thiserror::Error;

pub const CRLF: &str = "\r\n";

/// Upper bound on a header block (start line + fields).
pub const MAX_HEADER_BYTES: usize = 64 * 1024;

pub const HTTP_1_1: &str = "HTTP/1.1";

/// Framing failures while parsing a header block.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("malformed start line: {0:?}")]
    StartLine(String),

    #[error("malformed header field: {0:?}")]
    Field(String),

    #[error("invalid Content-Length: {0:?}")]
    ContentLength(String),

    #[error("header block exceeds {0} bytes")]
    TooLarge(usize),
}

/// Fields with a typed slot, in the order they are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Promoted {
    Host,
    UserAgent,
    ContentType,
    ContentLength,
    ContentEncoding,
    AcceptEncoding,
    Connection,
}

impl Promoted {
    const ALL: [Promoted; 7] = [
        Promoted::Host,
        Promoted::UserAgent,
        Promoted::ContentType,
        Promoted::ContentLength,
        Promoted::ContentEncoding,
        Promoted::AcceptEncoding,
        Promoted::Connection,
    ];

    fn name(self) -> &'static str {
        match self {
            Promoted::Host => "Host",
            Promoted::UserAgent => "User-Agent",
            Promoted::ContentType => "Content-Type",
            Promoted::ContentLength => "Content-Length",
            Promoted::ContentEncoding => "Content-Encoding",
            Promoted::AcceptEncoding => "Accept-Encoding",
            Promoted::Connection => "Connection",
        }
    }

    fn lookup(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }
}

/// Header fields of a request or response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFields {
    host: Option<String>,
    user_agent: Option<String>,
    content_type: Option<String>,
    content_length: Option<u64>,
    content_encoding: Option<String>,
    accept_encoding: Option<String>,
    connection: Option<String>,
    extensions: Vec<(String, String)>,
}

impl HeaderFields {
    pub fn new() -> Self {
        Self::default()
    }

    fn text_slot(&mut self, field: Promoted) -> Option<&mut Option<String>> {
        match field {
            Promoted::Host => Some(&mut self.host),
            Promoted::UserAgent => Some(&mut self.user_agent),
            Promoted::ContentType => Some(&mut self.content_type),
            Promoted::ContentEncoding => Some(&mut self.content_encoding),
            Promoted::AcceptEncoding => Some(&mut self.accept_encoding),
            Promoted::Connection => Some(&mut self.connection),
            Promoted::ContentLength => None,
        }
    }

    fn promoted(&self, field: Promoted) -> Option<Cow<'_, str>> {
        let text = match field {
            Promoted::Host => &self.host,
            Promoted::UserAgent => &self.user_agent,
            Promoted::ContentType => &self.content_type,
            Promoted::ContentEncoding => &self.content_encoding,
            Promoted::AcceptEncoding => &self.accept_encoding,
            Promoted::Connection => &self.connection,
            Promoted::ContentLength => {
                return self.content_length.map(|n| Cow::Owned(n.to_string()))
            }
        };
        text.as_deref().map(Cow::Borrowed)
    }

    /// Value of the first field called `name`.
    pub fn get(&self, name: &str) -> Option<Cow<'_, str>> {
        match Promoted::lookup(name) {
            Some(field) => self.promoted(field),
            None => self
                .extensions
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| Cow::Borrowed(v.as_str())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replace every field called `name` with a single value.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<(), HeaderError> {
        let value = value.into();
        match Promoted::lookup(name) {
            Some(Promoted::ContentLength) => {
                self.content_length = Some(parse_content_length(&value)?);
            }
            Some(field) => {
                if let Some(slot) = self.text_slot(field) {
                    *slot = Some(value);
                }
            }
            None => {
                match self
                    .extensions
                    .iter()
                    .position(|(n, _)| n.eq_ignore_ascii_case(name))
                {
                    Some(first) => {
                        self.extensions[first].1 = value;
                        let mut index = 0;
                        self.extensions.retain(|(n, _)| {
                            let keep = index <= first || !n.eq_ignore_ascii_case(name);
                            index += 1;
                            keep
                        });
                    }
                    None => self.extensions.push((name.to_string(), value)),
                }
            }
        }
        Ok(())
    }

    /// Append a field. Repeated promoted fields are folded into one
    /// comma-separated value.
    pub fn add(&mut self, name: &str, value: impl Into<String>) -> Result<(), HeaderError> {
        let value = value.into();
        match Promoted::lookup(name) {
            Some(Promoted::ContentLength) => {
                let length = parse_content_length(&value)?;
                match self.content_length {
                    Some(existing) if existing != length => {
                        return Err(HeaderError::ContentLength(value))
                    }
                    _ => self.content_length = Some(length),
                }
            }
            Some(field) => {
                if let Some(slot) = self.text_slot(field) {
                    *slot = Some(match slot.take() {
                        Some(existing) => format!("{existing}, {value}"),
                        None => value,
                    });
                }
            }
            None => self.extensions.push((name.to_string(), value)),
        }
        Ok(())
    }

    /// Remove every field called `name`.
    pub fn remove(&mut self, name: &str) {
        match Promoted::lookup(name) {
            Some(Promoted::ContentLength) => self.content_length = None,
            Some(field) => {
                if let Some(slot) = self.text_slot(field) {
                    *slot = None;
                }
            }
            None => self.extensions.retain(|(n, _)| !n.eq_ignore_ascii_case(name)),
        }
    }

    /// All fields in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Cow<'_, str>)> + '_ {
        Promoted::ALL
            .into_iter()
            .filter_map(move |field| self.promoted(field).map(|v| (field.name(), v)))
            .chain(
                self.extensions
                    .iter()
                    .map(|(n, v)| (n.as_str(), Cow::Borrowed(v.as_str()))),
            )
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append every field as `Name: value` CRLF lines.
    pub fn write_to(&self, out: &mut String) {
        for (name, value) in self.iter() {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(&value);
            out.push_str(CRLF);
        }
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn set_host(&mut self, host: impl Into<String>) {
        self.host = Some(host.into());
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub fn set_user_agent(&mut self, agent: impl Into<String>) {
        self.user_agent = Some(agent.into());
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = Some(content_type.into());
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn set_content_length(&mut self, length: u64) {
        self.content_length = Some(length);
    }

    pub fn content_encoding(&self) -> Option<&str> {
        self.content_encoding.as_deref()
    }

    pub fn set_content_encoding(&mut self, encoding: Option<String>) {
        self.content_encoding = encoding;
    }

    pub fn accept_encoding(&self) -> Option<&str> {
        self.accept_encoding.as_deref()
    }

    pub fn set_accept_encoding(&mut self, encoding: impl Into<String>) {
        self.accept_encoding = Some(encoding.into());
    }

    pub fn connection(&self) -> Option<&str> {
        self.connection.as_deref()
    }

    pub fn set_connection(&mut self, connection: impl Into<String>) {
        self.connection = Some(connection.into());
    }

    /// Whether the content coding list names `coding` (e.g. `gzip`).
    pub fn content_encoding_contains(&self, coding: &str) -> bool {
        list_contains(self.content_encoding(), coding)
    }

    /// Whether the accepted codings name `coding`.
    pub fn accepts_encoding(&self, coding: &str) -> bool {
        list_contains(self.accept_encoding(), coding)
    }

    /// A parameter of the `Content-Disposition` field, e.g. `filename`.
    pub fn content_disposition_param(&self, param: &str) -> Option<String> {
        self.get("Content-Disposition")
            .and_then(|value| param_value(&value, param))
    }

    /// The `charset` parameter of the content type.
    pub fn charset(&self) -> Option<String> {
        self.content_type().and_then(|value| param_value(value, "charset"))
    }

    /// Parse `Name: value` lines, folding continuation lines into the
    /// preceding field.
    pub fn parse_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Result<Self, HeaderError> {
        let mut raw: Vec<(String, String)> = Vec::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            if line.starts_with(' ') || line.starts_with('\t') {
                let (_, value) = raw
                    .last_mut()
                    .ok_or_else(|| HeaderError::Field(line.to_string()))?;
                value.push(' ');
                value.push_str(line.trim());
                continue;
            }

            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| HeaderError::Field(line.to_string()))?;
            if name.is_empty() || name.contains(|c: char| c.is_whitespace()) {
                return Err(HeaderError::Field(line.to_string()));
            }
            raw.push((name.to_string(), value.trim().to_string()));
        }

        let mut fields = HeaderFields::new();
        for (name, value) in raw {
            fields.add(&name, value)?;
        }
        Ok(fields)
    }
}

fn parse_content_length(value: &str) -> Result<u64, HeaderError> {
    value
        .trim()
        .parse()
        .map_err(|_| HeaderError::ContentLength(value.to_string()))
}

fn list_contains(list: Option<&str>, item: &str) -> bool {
    list.is_some_and(|list| {
        list.split(',')
            .map(|entry| entry.split(';').next().unwrap_or("").trim())
            .any(|entry| entry.eq_ignore_ascii_case(item))
    })
}

/// Extract `param` from a `value; a=b; c="d"` style field.
pub fn param_value(value: &str, param: &str) -> Option<String> {
    value.split(';').skip(1).find_map(|part| {
        let (name, raw) = part.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case(param) {
            return None;
        }
        let raw = raw.trim();
        let unquoted = raw
            .strip_prefix('"')
            .and_then(|r| r.strip_suffix('"'))
            .unwrap_or(raw);
        Some(unquoted.to_string())
    })
}

/// A start line plus fields, serializable to the wire.
pub trait MessageHeader {
    fn start_line(&self) -> String;

    fn fields(&self) -> &HeaderFields;

    /// Start line, fields and the terminating blank line.
    fn to_wire(&self) -> String {
        let mut out = self.start_line();
        out.push_str(CRLF);
        self.fields().write_to(&mut out);
        out.push_str(CRLF);
        out
    }
}

/// Split a header block into its start line and field lines.
pub(crate) fn split_head(text: &str) -> Result<(&str, impl Iterator<Item = &str>), HeaderError> {
    if text.len() > MAX_HEADER_BYTES {
        return Err(HeaderError::TooLarge(MAX_HEADER_BYTES));
    }
    let mut lines = text.lines();
    let start = lines
        .next()
        .filter(|line| !line.trim().is_empty())
        .ok_or_else(|| HeaderError::StartLine(String::new()))?;
    Ok((start, lines))
}
