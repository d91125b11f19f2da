//! XML scanning for WSDL documents and SOAP responses.
//!
//! Uses quick-xml which is safe against XXE by default (doesn't expand entities).
//! Neither scanner validates against a schema: the WSDL scan only collects the
//! target namespace, the service address and operation names, and the response
//! scan only looks for a SOAP Fault.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::{NsReader, Reader};
use tracing::debug;

use crate::config::TransportOptions;
use crate::description::{DescriptionParser, OperationInfo, ParsedDescription};
use crate::error::{ClientError, SoapFault, SoapVersion};
use crate::transport::{HttpRequest, HttpTransport, Transport};

/// SOAP namespace URIs.
pub const SOAP_11_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP_12_NS: &str = "http://www.w3.org/2003/05/soap-envelope";

/// WSDL SOAP binding namespace URIs.
pub const WSDL_SOAP_11_NS: &str = "http://schemas.xmlsoap.org/wsdl/soap/";
pub const WSDL_SOAP_12_NS: &str = "http://schemas.xmlsoap.org/wsdl/soap12/";

/// Default [`DescriptionParser`]: loads a WSDL document and scans it.
///
/// Sources starting with `http://` or `https://` are fetched through the
/// transport, sources starting with `<` are treated as the document itself,
/// anything else is read from the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct WsdlInterpreter<T = HttpTransport> {
    transport: T,
}

impl WsdlInterpreter<HttpTransport> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Transport> WsdlInterpreter<T> {
    pub fn with_transport(transport: T) -> Self {
        Self { transport }
    }

    fn load(&self, source: &str, options: &TransportOptions) -> Result<String, ClientError> {
        if source.trim_start().starts_with('<') {
            return Ok(source.to_string());
        }

        if source.starts_with("http://") || source.starts_with("https://") {
            let response = self.transport.send(&HttpRequest::wsdl(source, options))?;
            if !response.is_success() {
                return Err(ClientError::HttpStatus {
                    code: response.code,
                    body: response.body,
                });
            }
            return Ok(response.body);
        }

        Ok(std::fs::read_to_string(source)?)
    }
}

impl<T: Transport> DescriptionParser for WsdlInterpreter<T> {
    fn parse(&self, source: &str, transport: &TransportOptions) -> Result<ParsedDescription, ClientError> {
        let xml = self.load(source, transport)?;
        let description = parse_wsdl(&xml)?;
        debug!(
            operations = description.operations.len(),
            endpoint = ?description.soap_endpoint,
            namespace = ?description.target_namespace,
            "WSDL document parsed"
        );
        Ok(description)
    }
}

/// Scan a WSDL 1.1 document.
///
/// The endpoint is the first `soap:address` or `soap12:address`; addresses
/// of other bindings such as HTTP GET/POST are skipped.
pub fn parse_wsdl(xml: &str) -> Result<ParsedDescription, ClientError> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut description = ParsedDescription::new();
    let mut saw_definitions = false;
    let mut stack: Vec<String> = Vec::new();
    // Binding operation whose children are being read
    let mut binding_operation: Option<String> = None;

    let mut buf = Vec::new();

    loop {
        let (element, is_start) = match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => (e.into_owned(), true),
            Ok(Event::Empty(e)) => (e.into_owned(), false),
            Ok(Event::End(_)) => {
                let closed = stack.pop();
                if closed.as_deref() == Some("operation") && stack.last().map(String::as_str) == Some("binding") {
                    binding_operation = None;
                }
                buf.clear();
                continue;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ClientError::Wsdl(format!("XML parse error: {}", e))),
            _ => {
                buf.clear();
                continue;
            }
        };

        let local_name = local_name_str(&element);
        let parent = stack.last().map(String::as_str);

        match (local_name.as_str(), parent) {
            ("definitions", None) => {
                saw_definitions = true;
                description.target_namespace = attribute(&element, "targetNamespace");
            }
            ("operation", Some("binding")) => {
                if let Some(name) = attribute(&element, "name") {
                    description
                        .operations
                        .entry(name.clone())
                        .or_insert_with(|| OperationInfo::new(name.clone()));
                    if is_start {
                        binding_operation = Some(name);
                    }
                }
            }
            // soap:operation / soap12:operation inside a binding operation
            ("operation", Some("operation")) => {
                if let (Some(name), Some(action)) = (&binding_operation, attribute(&element, "soapAction")) {
                    if let Some(info) = description.operations.get_mut(name) {
                        info.soap_action = Some(action);
                    }
                }
            }
            ("operation", Some("portType")) => {
                if let Some(name) = attribute(&element, "name") {
                    description
                        .operations
                        .entry(name.clone())
                        .or_insert_with(|| OperationInfo::new(name));
                }
            }
            ("address", Some("port"))
                if description.soap_endpoint.is_none() && is_soap_binding(&reader, &element) =>
            {
                description.soap_endpoint = attribute(&element, "location");
            }
            _ => {}
        }

        if is_start {
            stack.push(local_name);
        }
        buf.clear();
    }

    if !saw_definitions {
        return Err(ClientError::Wsdl(
            "No WSDL definitions element found".to_string(),
        ));
    }

    Ok(description)
}

/// Look for a SOAP Fault in a response body.
///
/// Bodies that are not well-formed XML are reported as fault-free; the raw
/// body is still available on the response.
pub fn parse_soap_fault(body: &str) -> Option<SoapFault> {
    if !body.contains("Fault") {
        return None;
    }

    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut version = SoapVersion::Soap11;
    let mut stack: Vec<String> = Vec::new();
    let mut in_fault = false;
    let mut code = String::new();
    let mut reason = String::new();

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let local_name = local_name_str(e);
                if local_name == "Envelope" && stack.is_empty() {
                    version = envelope_version(e);
                } else if local_name == "Fault" && stack.last().map(String::as_str) == Some("Body") {
                    in_fault = true;
                }
                stack.push(local_name);
            }

            Ok(Event::Empty(ref e)) => {
                // <soap:Fault/> with no details
                if local_name_str(e) == "Fault" && stack.last().map(String::as_str) == Some("Body") {
                    in_fault = true;
                    break;
                }
            }

            Ok(Event::Text(ref e)) if in_fault => match e.unescape() {
                Ok(text) => record_fault_text(&stack, text.into_owned(), &mut code, &mut reason),
                Err(_) => break,
            },

            Ok(Event::CData(ref e)) if in_fault => match reader.decoder().decode(e) {
                Ok(text) => record_fault_text(&stack, text.into_owned(), &mut code, &mut reason),
                Err(_) => break,
            },

            Ok(Event::End(_)) => {
                if stack.pop().as_deref() == Some("Fault") && in_fault {
                    break;
                }
            }

            Ok(Event::Eof) | Err(_) => break,

            _ => {}
        }

        buf.clear();
    }

    in_fault.then_some(SoapFault { version, code, reason })
}

fn record_fault_text(stack: &[String], text: String, code: &mut String, reason: &mut String) {
    let current = stack.last().map(String::as_str);
    let parent = stack.len().checked_sub(2).and_then(|i| stack.get(i)).map(String::as_str);

    match (current, parent) {
        (Some("faultcode"), _) | (Some("Value"), Some("Code")) => *code = text,
        (Some("faultstring"), _) | (Some("Text"), Some("Reason")) => *reason = text,
        _ => {}
    }
}

/// Whether the element is bound to a WSDL SOAP 1.1 or 1.2 binding namespace.
fn is_soap_binding(reader: &NsReader<&[u8]>, e: &BytesStart) -> bool {
    match reader.resolve_element(e.name()).0 {
        ResolveResult::Bound(Namespace(ns)) => {
            ns == WSDL_SOAP_11_NS.as_bytes() || ns == WSDL_SOAP_12_NS.as_bytes()
        }
        _ => false,
    }
}

fn envelope_version(e: &BytesStart) -> SoapVersion {
    let is_soap_12 = e
        .attributes()
        .flatten()
        .any(|attr| attr.value.as_ref() == SOAP_12_NS.as_bytes());
    if is_soap_12 {
        SoapVersion::Soap12
    } else {
        SoapVersion::Soap11
    }
}

/// Extract local name from element.
fn local_name_str(e: &BytesStart) -> String {
    let name = e.local_name();
    std::str::from_utf8(name.as_ref())
        .unwrap_or("")
        .to_string()
}

/// Unescaped value of the attribute with the given local name.
fn attribute(e: &BytesStart, name: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == name.as_bytes())
        .and_then(|attr| attr.unescape_value().ok().map(|value| value.into_owned()))
}
