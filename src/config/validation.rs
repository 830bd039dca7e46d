//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Check that keystore trust names a keystore
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SoapwireConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::{SoapwireConfig, TrustMode};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

fn error(field: &'static str, message: impl Into<String>) -> ValidationError {
    ValidationError {
        field,
        message: message.into(),
    }
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &SoapwireConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(error(
            "listener.bind_address",
            format!("not a socket address: {}", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(error("listener.max_connections", "must be greater than 0"));
    }
    if config.client.connect_timeout_ms == 0 {
        errors.push(error("client.connect_timeout_ms", "must be greater than 0"));
    }
    if config.client.retry_delay_ms > config.client.max_retry_delay_ms {
        errors.push(error(
            "client.retry_delay_ms",
            "must not exceed client.max_retry_delay_ms",
        ));
    }
    if config.tls.trust == TrustMode::Keystore && config.tls.keystore_path.is_none() {
        errors.push(error("tls.keystore_path", "required when tls.trust = \"keystore\""));
    }
    if config.soap.continue_interval_ms == 0 {
        errors.push(error("soap.continue_interval_ms", "must be greater than 0"));
    }
    if !config.soap.wsdl_path.starts_with('/') {
        errors.push(error("soap.wsdl_path", "must start with '/'"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
