//! SOAP web services and the bundled echo service.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::soap::message::SoapPayload;

/// Failure inside a service method. Never shown to clients.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("unknown method {0:?}")]
    UnknownMethod(String),

    #[error("invalid parameter {name:?}: {reason}")]
    InvalidParam { name: String, reason: String },

    #[error("method failed: {0}")]
    Failed(String),

    #[error("call cancelled")]
    Cancelled,
}

/// A method invocation handed to a service.
#[derive(Debug, Clone)]
pub struct SoapCall {
    pub method: SoapPayload,
    pub client_ip: Option<IpAddr>,
}

/// A service reachable through [`SoapHttpServicer`](crate::soap::SoapHttpServicer).
#[async_trait]
pub trait SoapWebService: Send + Sync + 'static {
    /// Namespace URI; also the actor of faults raised for this service.
    fn uri(&self) -> &str;

    /// Request path the service description is served on.
    fn wsdl_path(&self) -> &str;

    /// The service description document.
    fn wsdl(&self) -> Result<String, ServiceError>;

    fn is_soap_action_valid(&self, action: &str) -> bool;

    /// Run a method. Long calls should watch `cancel`, which fires when the
    /// client connection is lost.
    async fn call(&self, call: SoapCall, cancel: CancellationToken)
        -> Result<SoapPayload, ServiceError>;
}

const ECHO_METHODS: [&str; 4] = ["echo", "sleep", "fail", "whoami"];

/// Demo service: `echo(text)`, `sleep(millis)`, `fail(reason)` and
/// `whoami()`.
#[derive(Debug, Clone)]
pub struct EchoService {
    uri: String,
    wsdl_path: String,
}

impl EchoService {
    pub fn new(uri: impl Into<String>, wsdl_path: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            wsdl_path: wsdl_path.into(),
        }
    }

    fn response(&self, method: &str) -> SoapPayload {
        SoapPayload::new(Some(&self.uri), format!("{method}Response"))
    }
}

fn required<'a>(call: &'a SoapPayload, name: &str) -> Result<&'a str, ServiceError> {
    call.param(name).ok_or_else(|| ServiceError::InvalidParam {
        name: name.to_string(),
        reason: "missing".to_string(),
    })
}

#[async_trait]
impl SoapWebService for EchoService {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn wsdl_path(&self) -> &str {
        &self.wsdl_path
    }

    fn wsdl(&self) -> Result<String, ServiceError> {
        let uri = quick_xml::escape::escape(self.uri.as_str());
        let mut operations = String::new();
        let mut messages = String::new();
        for method in ECHO_METHODS {
            messages.push_str(&format!(
                "<message name=\"{method}Request\"/><message name=\"{method}Response\"/>"
            ));
            operations.push_str(&format!(
                "<operation name=\"{method}\">\
                 <input message=\"tns:{method}Request\"/>\
                 <output message=\"tns:{method}Response\"/>\
                 </operation>"
            ));
        }
        Ok(format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <definitions name=\"Echo\" targetNamespace=\"{uri}\" xmlns:tns=\"{uri}\" \
             xmlns=\"http://schemas.xmlsoap.org/wsdl/\">\
             {messages}<portType name=\"EchoPortType\">{operations}</portType>\
             </definitions>"
        ))
    }

    /// `"<uri>#<method>"` for one of the service's methods.
    fn is_soap_action_valid(&self, action: &str) -> bool {
        action
            .trim_matches('"')
            .strip_prefix(self.uri.as_str())
            .and_then(|rest| rest.strip_prefix('#'))
            .is_some_and(|method| ECHO_METHODS.contains(&method))
    }

    async fn call(
        &self,
        call: SoapCall,
        cancel: CancellationToken,
    ) -> Result<SoapPayload, ServiceError> {
        let method = call.method.name.as_str();
        match method {
            "echo" => {
                let text = required(&call.method, "text")?;
                Ok(self.response(method).with_param("return", text))
            }
            "sleep" => {
                let raw = required(&call.method, "millis")?;
                let millis: u64 = raw.trim().parse().map_err(|_| ServiceError::InvalidParam {
                    name: "millis".to_string(),
                    reason: format!("{raw:?} is not a number"),
                })?;
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(millis)) => {}
                    _ = cancel.cancelled() => return Err(ServiceError::Cancelled),
                }
                Ok(self.response(method).with_param("slept", millis.to_string()))
            }
            "fail" => {
                let reason = call.method.param("reason").unwrap_or("requested failure");
                Err(ServiceError::Failed(reason.to_string()))
            }
            "whoami" => {
                let ip = call
                    .client_ip
                    .map(|ip| ip.to_string())
                    .unwrap_or_default();
                Ok(self.response(method).with_param("address", ip))
            }
            other => Err(ServiceError::UnknownMethod(other.to_string())),
        }
    }
}
