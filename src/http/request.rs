//! Request start line and outbound request construction.
//!
//! # Responsibilities
//! - Parse `METHOD path VERSION` start lines (exactly three tokens)
//! - Build GET and POST requests for the client
//! - Expose the request fields the SOAP servicer negotiates on

use crate::http::body::Body;
use crate::http::header::{split_head, HeaderError, HeaderFields, MessageHeader, HTTP_1_1};

pub const GET: &str = "GET";
pub const POST: &str = "POST";

/// Start line plus fields of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    pub method: String,
    pub path: String,
    pub version: String,
    pub fields: HeaderFields,
}

impl RequestHeader {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            version: HTTP_1_1.to_string(),
            fields: HeaderFields::new(),
        }
    }

    /// Parse a full header block (without the terminating blank line).
    pub fn parse(text: &str) -> Result<Self, HeaderError> {
        let (start, lines) = split_head(text)?;

        let tokens: Vec<&str> = start.split_whitespace().collect();
        let [method, path, version] = tokens.as_slice() else {
            return Err(HeaderError::StartLine(start.to_string()));
        };
        if !version.starts_with("HTTP/") {
            return Err(HeaderError::StartLine(start.to_string()));
        }

        Ok(Self {
            method: method.to_string(),
            path: path.to_string(),
            version: version.to_string(),
            fields: HeaderFields::parse_lines(lines)?,
        })
    }

    pub fn is_method(&self, method: &str) -> bool {
        self.method.eq_ignore_ascii_case(method)
    }

    /// Path without its query string.
    pub fn path_only(&self) -> &str {
        self.path.split('?').next().unwrap_or(&self.path)
    }

    /// Whether the client waits for `100 Continue` before sending its body.
    pub fn expects_continue(&self) -> bool {
        self.fields
            .get("Expect")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("100-continue"))
    }

    /// The `SOAPAction` field with surrounding quotes removed.
    pub fn soap_action(&self) -> Option<String> {
        self.fields
            .get("SOAPAction")
            .map(|v| v.trim().trim_matches('"').to_string())
    }

    /// Media type of the body, without parameters, lowercased.
    pub fn media_type(&self) -> Option<String> {
        self.fields
            .content_type()
            .map(|v| v.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
    }
}

impl MessageHeader for RequestHeader {
    fn start_line(&self) -> String {
        format!("{} {} {}", self.method, self.path, self.version)
    }

    fn fields(&self) -> &HeaderFields {
        &self.fields
    }
}

/// A request ready to be sent over one connection.
#[derive(Debug)]
pub struct Request {
    pub header: RequestHeader,
    pub body: Body,
}

impl Request {
    /// `GET path` with the fields every outbound request carries.
    pub fn get(path: &str, host: &str, user_agent: &str) -> Self {
        Self {
            header: outbound(GET, path, host, user_agent),
            body: Body::Empty,
        }
    }

    /// `POST path` carrying `body` with a declared length.
    pub fn post(
        path: &str,
        host: &str,
        user_agent: &str,
        content_type: &str,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        let body: Vec<u8> = body.into();
        let mut header = outbound(POST, path, host, user_agent);
        header.fields.set_content_type(content_type);
        header.fields.set_content_length(body.len() as u64);
        Self {
            header,
            body: Body::Bytes(body.into()),
        }
    }
}

fn outbound(method: &str, path: &str, host: &str, user_agent: &str) -> RequestHeader {
    let path = if path.is_empty() { "/" } else { path };
    let mut header = RequestHeader::new(method, path);
    header.fields.set_host(host);
    header.fields.set_user_agent(user_agent);
    header.fields.set_accept_encoding("gzip");
    header.fields.set_connection("close");
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_request_head() {
        let head = "POST /echo HTTP/1.1\r\n\
                    Host: localhost\r\n\
                    Content-Type: text/xml; charset=utf-8\r\n\
                    Content-Length: 12\r\n\
                    Expect: 100-continue\r\n\
                    SOAPAction: \"urn:soapwire:echo#echo\"\r\n";
        let request = RequestHeader::parse(head).unwrap();

        assert!(request.is_method("post"));
        assert_eq!(request.path, "/echo");
        assert_eq!(request.fields.host(), Some("localhost"));
        assert_eq!(request.fields.content_length(), Some(12));
        assert_eq!(request.media_type().as_deref(), Some("text/xml"));
        assert!(request.expects_continue());
        assert_eq!(
            request.soap_action().as_deref(),
            Some("urn:soapwire:echo#echo")
        );
    }

    #[test]
    fn start_line_needs_three_tokens() {
        for bad in ["GET /", "GET / HTTP/1.1 extra", "GET / FTP/1.0", ""] {
            assert!(
                matches!(RequestHeader::parse(bad), Err(HeaderError::StartLine(_))),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn get_builder_serializes() {
        let request = Request::get("", "example.org", "agent/1");
        assert_eq!(
            request.header.to_wire(),
            "GET / HTTP/1.1\r\n\
             Host: example.org\r\n\
             User-Agent: agent/1\r\n\
             Accept-Encoding: gzip\r\n\
             Connection: close\r\n\r\n"
        );
    }

    #[test]
    fn post_builder_declares_length() {
        let request = Request::post("/svc?x=1", "h", "a", "text/plain", "hello");
        assert_eq!(request.header.fields.content_length(), Some(5));
        assert_eq!(request.header.path_only(), "/svc");
        assert_eq!(request.body.known_len(), Some(5));
    }
}
