//! Response status lines and canned server responses.
//!
//! # Responsibilities
//! - Parse `VERSION code reason` status lines
//! - Classify status codes (informational, success)
//! - Provide the fixed responses the server side sends on its error paths

use crate::http::header::{split_head, HeaderError, HeaderFields, MessageHeader, HTTP_1_1};

/// Start line plus fields of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHeader {
    pub version: String,
    pub status: u16,
    pub reason: String,
    pub fields: HeaderFields,
}

impl ResponseHeader {
    /// A response with the canonical reason phrase for `status`.
    pub fn new(status: u16) -> Self {
        Self {
            version: HTTP_1_1.to_string(),
            status,
            reason: reason_phrase(status).to_string(),
            fields: HeaderFields::new(),
        }
    }

    /// Parse a full header block (without the terminating blank line).
    pub fn parse(text: &str) -> Result<Self, HeaderError> {
        let (start, lines) = split_head(text)?;
        let bad_start = || HeaderError::StartLine(start.to_string());

        let mut parts = start.splitn(3, ' ');
        let version = parts.next().filter(|v| v.starts_with("HTTP/")).ok_or_else(bad_start)?;
        let code = parts
            .next()
            .filter(|c| c.len() == 3)
            .and_then(|c| c.parse::<u16>().ok())
            .filter(|c| (100..600).contains(c))
            .ok_or_else(bad_start)?;
        let reason = parts.next().unwrap_or("").trim();

        Ok(Self {
            version: version.to_string(),
            status: code,
            reason: reason.to_string(),
            fields: HeaderFields::parse_lines(lines)?,
        })
    }

    /// Change the status and reset the reason phrase to match.
    pub fn set_status(&mut self, status: u16) {
        self.status = status;
        self.reason = reason_phrase(status).to_string();
    }

    /// 1xx: another header follows on the same connection.
    pub fn is_informational(&self) -> bool {
        self.status / 100 == 1
    }

    /// 2xx: the only class whose body the client wrappers extract.
    pub fn is_success(&self) -> bool {
        self.status / 100 == 2
    }
}

impl MessageHeader for ResponseHeader {
    fn start_line(&self) -> String {
        format!("{} {} {}", self.version, self.status, self.reason)
    }

    fn fields(&self) -> &HeaderFields {
        &self.fields
    }
}

pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        101 => "Switching Protocols",
        102 => "Processing",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        411 => "Length Required",
        413 => "Payload Too Large",
        415 => "Unsupported Media Type",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}

/// Fixed responses for the server's error paths and the interim continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CannedResponse {
    Continue,
    BadRequest,
    NotFound,
    MethodNotAllowed,
    ServerError,
}

impl CannedResponse {
    pub fn status(self) -> u16 {
        match self {
            CannedResponse::Continue => 100,
            CannedResponse::BadRequest => 400,
            CannedResponse::NotFound => 404,
            CannedResponse::MethodNotAllowed => 405,
            CannedResponse::ServerError => 500,
        }
    }

    /// Minimal HTML body; none for `100 Continue`.
    pub fn body(self) -> Option<String> {
        if self == CannedResponse::Continue {
            return None;
        }
        let title = format!("{} {}", self.status(), reason_phrase(self.status()));
        Some(format!(
            "<html><head><title>{title}</title></head><body><h1>{title}</h1></body></html>"
        ))
    }

    pub fn header(self) -> ResponseHeader {
        let mut header = ResponseHeader::new(self.status());
        if let Some(body) = self.body() {
            header.fields.set_content_type("text/html");
            header.fields.set_content_length(body.len() as u64);
            header.fields.set_connection("close");
        }
        header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_lines() {
        let ok = ResponseHeader::parse("HTTP/1.1 200 OK\r\nContent-Length: 3").unwrap();
        assert!(ok.is_success());
        assert_eq!(ok.fields.content_length(), Some(3));

        let cont = ResponseHeader::parse("HTTP/1.1 100 Continue").unwrap();
        assert!(cont.is_informational());
        assert!(!cont.is_success());

        let no_reason = ResponseHeader::parse("HTTP/1.0 404").unwrap();
        assert_eq!(no_reason.status, 404);
        assert_eq!(no_reason.reason, "");

        let spaced = ResponseHeader::parse("HTTP/1.1 500 Internal Server Error").unwrap();
        assert_eq!(spaced.reason, "Internal Server Error");
    }

    #[test]
    fn rejects_bad_status_lines() {
        for bad in ["HTTP/1.1 20 OK", "HTTP/1.1 abc OK", "SIP/2.0 200 OK", "HTTP/1.1 700 X"] {
            assert!(ResponseHeader::parse(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn canned_continue_has_no_body() {
        let header = CannedResponse::Continue.header();
        assert_eq!(header.to_wire(), "HTTP/1.1 100 Continue\r\n\r\n");
        assert_eq!(CannedResponse::Continue.body(), None);
    }

    #[test]
    fn canned_errors_declare_their_body() {
        for canned in [
            CannedResponse::BadRequest,
            CannedResponse::NotFound,
            CannedResponse::MethodNotAllowed,
            CannedResponse::ServerError,
        ] {
            let header = canned.header();
            let body = canned.body().unwrap();
            assert_eq!(header.status, canned.status());
            assert_eq!(header.fields.content_length(), Some(body.len() as u64));
            assert!(body.contains(&canned.status().to_string()));
        }
    }
}
