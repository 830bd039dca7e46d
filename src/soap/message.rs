//! SOAP 1.1 messages and their envelope encoding.
//!
//! A message carries either a method payload (the call, then its result)
//! or a fault. Payload parameters are flat `name → text` pairs.

use std::net::IpAddr;

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use thiserror::Error;

pub const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP_ENCODING_NS: &str = "http://schemas.xmlsoap.org/soap/encoding/";

#[derive(Debug, Error)]
pub enum SoapError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("document is not a SOAP envelope (root is {0:?})")]
    NotEnvelope(String),

    #[error("SOAP envelope has no body")]
    MissingBody,

    #[error("SOAP body is empty")]
    EmptyBody,

    #[error("unknown fault code {0:?}")]
    UnknownFaultCode(String),

    #[error("malformed document: {0}")]
    Malformed(&'static str),
}

/// Who is to blame for a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCode {
    Client,
    Server,
}

impl FaultCode {
    pub fn as_str(self) -> &'static str {
        match self {
            FaultCode::Client => "Client",
            FaultCode::Server => "Server",
        }
    }

    /// Accepts `Client`, `soap:Client`, `SOAP-ENV:Server`, ... Subcodes
    /// such as `Client.Auth` map to their class.
    pub fn parse(text: &str) -> Result<Self, SoapError> {
        let local = text.trim().rsplit(':').next().unwrap_or("");
        let class = local.split('.').next().unwrap_or("");
        match class {
            "Client" => Ok(FaultCode::Client),
            "Server" => Ok(FaultCode::Server),
            _ => Err(SoapError::UnknownFaultCode(text.to_string())),
        }
    }
}

/// A structured SOAP-level error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapFault {
    pub code: FaultCode,
    pub string: String,
    pub actor: Option<String>,
}

impl SoapFault {
    pub fn client(string: impl Into<String>, actor: impl Into<String>) -> Self {
        Self {
            code: FaultCode::Client,
            string: string.into(),
            actor: Some(actor.into()),
        }
    }

    pub fn server(string: impl Into<String>, actor: impl Into<String>) -> Self {
        Self {
            code: FaultCode::Server,
            string: string.into(),
            actor: Some(actor.into()),
        }
    }
}

/// A method element: its namespace, name and flat parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SoapPayload {
    pub namespace: Option<String>,
    pub name: String,
    pub params: Vec<(String, String)>,
}

impl SoapPayload {
    pub fn new(namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            name: name.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// One inbound SOAP request and, once dispatched, its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SoapMessage {
    pub call: Option<SoapPayload>,
    pub result: Option<SoapPayload>,
    pub fault: Option<SoapFault>,
    /// Set by the servicer from the connection, never from the document.
    pub client_ip: Option<IpAddr>,
}

impl SoapMessage {
    pub fn request(call: SoapPayload) -> Self {
        Self {
            call: Some(call),
            ..Self::default()
        }
    }

    pub fn from_fault(fault: SoapFault) -> Self {
        Self {
            fault: Some(fault),
            ..Self::default()
        }
    }

    pub fn is_fault(&self) -> bool {
        self.fault.is_some()
    }

    /// Parse an envelope. A body holding `Fault` yields a fault message;
    /// anything else is taken as the method call.
    pub fn parse(xml: &str) -> Result<Self, SoapError> {
        let root = parse_tree(xml)?;
        if root.name != "Envelope" {
            return Err(SoapError::NotEnvelope(root.name));
        }
        let body = root.child("Body").ok_or(SoapError::MissingBody)?;
        let first = body.children.first().ok_or(SoapError::EmptyBody)?;

        if first.name == "Fault" && first.namespace.as_deref() == Some(SOAP_ENVELOPE_NS) {
            let code = first
                .child("faultcode")
                .map(|c| c.text.as_str())
                .ok_or(SoapError::Malformed("fault without faultcode"))?;
            return Ok(Self::from_fault(SoapFault {
                code: FaultCode::parse(code)?,
                string: first
                    .child("faultstring")
                    .map(|c| c.text.clone())
                    .unwrap_or_default(),
                actor: first.child("faultactor").map(|c| c.text.clone()),
            }));
        }

        Ok(Self::request(SoapPayload {
            namespace: first.namespace.clone(),
            name: first.name.clone(),
            params: first
                .children
                .iter()
                .map(|c| (c.name.clone(), c.text.clone()))
                .collect(),
        }))
    }

    /// Serialize the response envelope: the fault when set, otherwise the
    /// result, otherwise the call itself.
    pub fn to_xml(&self) -> String {
        let mut body = String::new();
        if let Some(fault) = &self.fault {
            write_fault(&mut body, fault);
        } else if let Some(payload) = self.result.as_ref().or(self.call.as_ref()) {
            write_payload(&mut body, payload);
        }
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <soap:Envelope xmlns:soap=\"{SOAP_ENVELOPE_NS}\" \
             soap:encodingStyle=\"{SOAP_ENCODING_NS}\">\
             <soap:Body>{body}</soap:Body></soap:Envelope>"
        )
    }
}

fn write_fault(out: &mut String, fault: &SoapFault) {
    out.push_str("<soap:Fault><faultcode>soap:");
    out.push_str(fault.code.as_str());
    out.push_str("</faultcode><faultstring>");
    out.push_str(&escape(fault.string.as_str()));
    out.push_str("</faultstring>");
    if let Some(actor) = &fault.actor {
        out.push_str("<faultactor>");
        out.push_str(&escape(actor.as_str()));
        out.push_str("</faultactor>");
    }
    out.push_str("</soap:Fault>");
}

fn write_payload(out: &mut String, payload: &SoapPayload) {
    let name = escape(payload.name.as_str());
    match &payload.namespace {
        Some(ns) => {
            out.push_str(&format!("<m:{name} xmlns:m=\"{}\">", escape(ns.as_str())));
        }
        None => out.push_str(&format!("<{name}>")),
    }
    for (param, value) in &payload.params {
        let param = escape(param.as_str());
        out.push_str(&format!("<{param}>{}</{param}>", escape(value.as_str())));
    }
    match &payload.namespace {
        Some(_) => out.push_str(&format!("</m:{name}>")),
        None => out.push_str(&format!("</{name}>")),
    }
}

/// Minimal element tree: enough structure to read envelopes.
#[derive(Debug, Default)]
struct Element {
    namespace: Option<String>,
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }
}

fn parse_tree(xml: &str) -> Result<Element, SoapError> {
    let mut reader = NsReader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();

    loop {
        let (ns, event) = reader.read_resolved_event()?;
        match event {
            Event::Start(e) => stack.push(element(ns, &e)?),
            Event::Empty(e) => {
                let leaf = element(ns, &e)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(leaf),
                    None => return Ok(leaf),
                }
            }
            Event::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(_) => {
                let mut done = stack.pop().ok_or(SoapError::Malformed("unbalanced end tag"))?;
                // Only leaf text is content; text between child elements is layout.
                if !done.children.is_empty() {
                    done.text.clear();
                }
                match stack.last_mut() {
                    Some(parent) => parent.children.push(done),
                    None => return Ok(done),
                }
            }
            Event::Eof => return Err(SoapError::Malformed("document ended early")),
            _ => {}
        }
    }
}

fn element(ns: ResolveResult<'_>, start: &BytesStart<'_>) -> Result<Element, SoapError> {
    let namespace = match ns {
        ResolveResult::Bound(Namespace(uri)) => Some(String::from_utf8_lossy(uri).into_owned()),
        _ => None,
    };
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    if name.is_empty() {
        return Err(SoapError::Malformed("element without a name"));
    }
    Ok(Element {
        namespace,
        name,
        ..Element::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ECHO_NS: &str = "urn:soapwire:echo";

    #[test]
    fn fault_survives_the_wire() {
        let fault = SoapFault::client("bad action", "urn:soapwire:echo");
        let message = SoapMessage::from_fault(fault.clone());

        let parsed = SoapMessage::parse(&message.to_xml()).unwrap();
        assert_eq!(parsed.fault, Some(fault));
        assert!(parsed.is_fault());
    }

    #[test]
    fn fault_text_is_escaped() {
        let fault = SoapFault::server("a < b & \"c\"", "urn:x?a=1&b=2");
        let xml = SoapMessage::from_fault(fault.clone()).to_xml();
        assert!(xml.contains("a &lt; b &amp;"));
        assert_eq!(SoapMessage::parse(&xml).unwrap().fault, Some(fault));
    }

    #[test]
    fn parses_a_method_call_with_foreign_prefixes() {
        let xml = r#"<?xml version="1.0"?>
            <SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
              <SOAP-ENV:Header><t:Trace xmlns:t="urn:t">1</t:Trace></SOAP-ENV:Header>
              <SOAP-ENV:Body>
                <e:echo xmlns:e="urn:soapwire:echo">
                  <text>hello &amp; goodbye</text>
                  <empty/>
                </e:echo>
              </SOAP-ENV:Body>
            </SOAP-ENV:Envelope>"#;
        let message = SoapMessage::parse(xml).unwrap();
        let call = message.call.unwrap();
        assert_eq!(call.namespace.as_deref(), Some(ECHO_NS));
        assert_eq!(call.name, "echo");
        assert_eq!(call.param("text"), Some("hello & goodbye"));
        assert_eq!(call.param("empty"), Some(""));
    }

    #[test]
    fn result_takes_precedence_over_call() {
        let mut message =
            SoapMessage::request(SoapPayload::new(Some(ECHO_NS), "echo").with_param("text", "hi"));
        message.result =
            Some(SoapPayload::new(Some(ECHO_NS), "echoResponse").with_param("return", "hi"));

        let parsed = SoapMessage::parse(&message.to_xml()).unwrap();
        assert_eq!(parsed.call, message.result);
    }

    #[test]
    fn rejects_non_envelopes() {
        assert!(matches!(
            SoapMessage::parse("<html><body/></html>"),
            Err(SoapError::NotEnvelope(_))
        ));
        assert!(matches!(
            SoapMessage::parse(&format!("<s:Envelope xmlns:s=\"{SOAP_ENVELOPE_NS}\"/>")),
            Err(SoapError::MissingBody)
        ));
        assert!(SoapMessage::parse("<s:Envelope><s:Body>").is_err());
        assert!(SoapMessage::parse("not xml at all").is_err());
    }

    #[test]
    fn leaf_text_keeps_its_whitespace() {
        let call = SoapPayload::new(Some(ECHO_NS), "echo")
            .with_param("text", "  hi ")
            .with_param("blank", "   ");
        let parsed = SoapMessage::parse(&SoapMessage::request(call.clone()).to_xml()).unwrap();
        assert_eq!(parsed.call, Some(call));

        let fault = SoapFault::server(" padded reason\n", ECHO_NS);
        let parsed = SoapMessage::parse(&SoapMessage::from_fault(fault.clone()).to_xml()).unwrap();
        assert_eq!(parsed.fault, Some(fault));
    }

    #[test]
    fn fault_codes() {
        assert_eq!(FaultCode::parse("soap:Client").unwrap(), FaultCode::Client);
        assert_eq!(FaultCode::parse("Server.Timeout").unwrap(), FaultCode::Server);
        assert!(FaultCode::parse("soap:Receiver").is_err());
    }
}
