//! Endpoint resolution from URL text.

use thiserror::Error;
use url::Url;

/// Transport scheme of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Plain TCP (`http`).
    Plain,
    /// TCP wrapped in TLS (`https`).
    Secure,
}

impl Scheme {
    /// Default port for the scheme.
    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Plain => 80,
            Scheme::Secure => 443,
        }
    }
}

/// Errors raised while turning URL text into an endpoint. Never retried.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("malformed URL '{url}': {source}")]
    Malformed {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("URL has no host: {0}")]
    MissingHost(String),
}

/// A host/port/scheme triple a connection can be opened to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
    scheme: Scheme,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, scheme: Scheme) -> Self {
        Self {
            host: host.into(),
            port,
            scheme,
        }
    }

    /// Parse URL text into an endpoint.
    pub fn parse(url: &str) -> Result<Self, EndpointError> {
        let parsed = Url::parse(url).map_err(|source| EndpointError::Malformed {
            url: url.to_string(),
            source,
        })?;
        Self::from_url(&parsed)
    }

    /// Build an endpoint from a parsed URL.
    pub fn from_url(url: &Url) -> Result<Self, EndpointError> {
        let scheme = match url.scheme() {
            "http" => Scheme::Plain,
            "https" => Scheme::Secure,
            other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
        };
        let host = url
            .host_str()
            .ok_or_else(|| EndpointError::MissingHost(url.to_string()))?;
        // IPv6 literals come back bracketed; the resolver wants them bare.
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let port = url.port().unwrap_or_else(|| scheme.default_port());

        Ok(Self::new(host, port, scheme))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn is_secure(&self) -> bool {
        self.scheme == Scheme::Secure
    }

    /// `host:port` as accepted by the resolver.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scheme = match self.scheme {
            Scheme::Plain => "http",
            Scheme::Secure => "https",
        };
        write!(f, "{}://{}", scheme, self.authority())
    }
}
