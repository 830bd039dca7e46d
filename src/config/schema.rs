//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for soapwire.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the SOAP server and the HTTP client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SoapwireConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Outbound HTTP client settings.
    pub client: ClientConfig,

    /// TLS trust material for outbound `https` connections.
    pub tls: TlsConfig,

    /// SOAP servicing settings.
    pub soap: SoapConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 1024,
        }
    }
}

/// Outbound client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Bound on a single connection attempt in milliseconds.
    pub connect_timeout_ms: u64,

    /// Connection retries used by GET content and file retrieval.
    pub get_retries: u32,

    /// Connection retries used by POST.
    pub post_retries: u32,

    /// Base delay between connection attempts; 0 retries immediately.
    pub retry_delay_ms: u64,

    /// Cap on the delay between connection attempts.
    pub max_retry_delay_ms: u64,

    /// Value of the `User-Agent` header on outbound requests.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            get_retries: 2,
            post_retries: 0,
            retry_delay_ms: 0,
            max_retry_delay_ms: 2000,
            user_agent: "soapwire http client 1.0".to_string(),
        }
    }
}

/// How outbound TLS peers are trusted.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TrustMode {
    /// Accept any server certificate. Insecure; must be chosen explicitly
    /// by the caller that builds the connector.
    #[default]
    TrustAny,
    /// Trust the certificates of a PEM keystore.
    Keystore,
}

/// TLS configuration for outbound connections.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TlsConfig {
    /// Trust mode.
    pub trust: TrustMode,

    /// PEM bundle with trusted certificates and an optional client key.
    pub keystore_path: Option<String>,

    /// Optional PEM chain presented as the client certificate.
    pub client_cert_path: Option<String>,
}

/// SOAP servicing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SoapConfig {
    /// Interval between interim `100 Continue` keep-alives in milliseconds.
    pub continue_interval_ms: u64,

    /// URI identifying the bundled service; used as the fault actor.
    pub service_uri: String,

    /// Path the service description is served on.
    pub wsdl_path: String,
}

impl Default for SoapConfig {
    fn default() -> Self {
        Self {
            continue_interval_ms: 20_000,
            service_uri: "urn:soapwire:echo".to_string(),
            wsdl_path: "/echo?wsdl".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = SoapwireConfig::default();
        assert_eq!(config.client.connect_timeout_ms, 10_000);
        assert_eq!(config.client.get_retries, 2);
        assert_eq!(config.client.post_retries, 0);
        assert_eq!(config.soap.continue_interval_ms, 20_000);
        assert_eq!(config.tls.trust, TrustMode::TrustAny);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: SoapwireConfig = toml::from_str(
            r#"
            [tls]
            trust = "keystore"
            keystore_path = "/etc/soapwire/trust.pem"

            [soap]
            continue_interval_ms = 500
            "#,
        )
        .unwrap();

        assert_eq!(config.tls.trust, TrustMode::Keystore);
        assert_eq!(config.soap.continue_interval_ms, 500);
        assert_eq!(config.soap.wsdl_path, "/echo?wsdl");
        assert_eq!(config.listener.max_connections, 1024);
    }
}
