//! Remote operations: request construction and invocation.
//!
//! An [`Operation`] is declaration-only until [`Operation::call`]: creating
//! one never touches the network and never checks that the name exists.
//! Existence is verified when the request is built, so an unknown name
//! surfaces as `UnknownOperation` from `build` or `call`.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::{is_xml_name, GlobalOptions, LocalOptions, TransportOptions};
use crate::description::{OperationInfo, ServiceDescription};
use crate::error::{ClientError, SoapFault, SoapVersion};
use crate::parser::{parse_soap_fault, SOAP_11_NS, SOAP_12_NS};
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, Transport};

/// One named remote procedure bound to a description and the client options.
pub struct Operation<'a> {
    name: String,
    description: &'a ServiceDescription,
    globals: &'a GlobalOptions,
    transport: &'a dyn Transport,
}

impl<'a> Operation<'a> {
    /// Bind `name` without validating it against the description.
    ///
    /// The name becomes an element name in the envelope, so it must be an
    /// unprefixed XML name.
    pub fn create(
        name: impl Into<String>,
        description: &'a ServiceDescription,
        globals: &'a GlobalOptions,
        transport: &'a dyn Transport,
    ) -> Result<Self, ClientError> {
        let name = name.into();
        if !is_xml_name(&name) {
            return Err(ClientError::InvalidOperationName(name));
        }
        Ok(Self {
            name,
            description,
            globals,
            transport,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Metadata declared by the WSDL document.
    ///
    /// Fails with `MissingDescription` for a shim description and with
    /// `UnknownOperation` when the document does not declare this name.
    pub fn info(&self) -> Result<&'a OperationInfo, ClientError> {
        let operations = self.description.operations()?;
        operations.get(&self.name).ok_or_else(|| ClientError::UnknownOperation {
            name: self.name.clone(),
            available: operations.keys().cloned().collect(),
        })
    }

    /// Build the SOAP request for this call.
    pub fn build(&self, locals: &LocalOptions) -> Result<SoapRequest, ClientError> {
        let declared_action = match self.description {
            ServiceDescription::Parsed(_) => self.info()?.soap_action.clone(),
            ServiceDescription::Shim(_) => None,
        };
        let soap_action = locals
            .soap_action
            .clone()
            .or(declared_action)
            .unwrap_or_else(|| self.name.clone());

        let endpoint = self
            .description
            .soap_endpoint()
            .ok_or_else(|| ClientError::MissingEndpoint(self.name.clone()))?;

        Ok(SoapRequest {
            endpoint: endpoint.to_string(),
            operation: self.name.clone(),
            soap_action,
            namespace: self.description.target_namespace().map(String::from),
            namespace_identifier: self.globals.namespace_identifier()?.to_string(),
            version: self.globals.soap_version()?,
            message: locals.message.clone(),
            headers: locals.headers.clone(),
        })
    }

    /// Send the request and wrap whatever came back.
    ///
    /// A SOAP fault or HTTP error status is still `Ok`; only a failed
    /// exchange is `Err`.
    pub fn call(&self, locals: &LocalOptions) -> Result<SoapResponse, ClientError> {
        let request = self.build(locals)?;
        let options = TransportOptions::from_globals(self.globals)?;

        debug!(
            operation = %self.name,
            endpoint = %request.endpoint,
            soap_action = %request.soap_action,
            "Invoking SOAP operation"
        );

        let http = self.transport.send(&request.to_http_request(&options))?;
        Ok(SoapResponse::new(http))
    }
}

/// A SOAP request ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapRequest {
    pub endpoint: String,
    pub operation: String,
    pub soap_action: String,
    pub namespace: Option<String>,
    pub namespace_identifier: String,
    pub version: SoapVersion,
    /// Caller-supplied XML placed inside the operation element, unchanged
    pub message: Option<String>,
    /// Call-scoped headers
    pub headers: BTreeMap<String, String>,
}

impl SoapRequest {
    /// Wrap the message in an envelope.
    pub fn envelope(&self) -> String {
        let env_ns = match self.version {
            SoapVersion::Soap11 => SOAP_11_NS,
            SoapVersion::Soap12 => SOAP_12_NS,
        };
        let (namespace_decl, element) = match self.namespace {
            Some(ref ns) => (
                format!(" xmlns:{}=\"{}\"", self.namespace_identifier, xml_escape(ns)),
                format!("{}:{}", self.namespace_identifier, self.operation),
            ),
            None => (String::new(), self.operation.clone()),
        };

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><env:Envelope xmlns:env="{}"{}><env:Body><{}>{}</{}></env:Body></env:Envelope>"#,
            env_ns,
            namespace_decl,
            element,
            self.message.as_deref().unwrap_or(""),
            element
        )
    }

    /// HTTP POST carrying the envelope. Header precedence, lowest first:
    /// protocol headers, global `headers`, call-scoped headers.
    pub fn to_http_request(&self, options: &TransportOptions) -> HttpRequest {
        let mut headers = BTreeMap::new();
        match self.version {
            SoapVersion::Soap11 => {
                headers.insert("Content-Type".to_string(), "text/xml;charset=UTF-8".to_string());
                headers.insert("SOAPAction".to_string(), format!("\"{}\"", self.soap_action));
            }
            SoapVersion::Soap12 => {
                headers.insert(
                    "Content-Type".to_string(),
                    format!("application/soap+xml;charset=UTF-8;action=\"{}\"", self.soap_action),
                );
            }
        }
        headers.extend(options.headers.clone());
        headers.extend(self.headers.clone());

        HttpRequest {
            method: HttpMethod::Post,
            url: self.endpoint.clone(),
            headers,
            body: Some(self.envelope()),
            options: options.clone(),
        }
    }
}

/// The outcome of one call: the raw HTTP response plus any SOAP fault found in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapResponse {
    http: HttpResponse,
    fault: Option<SoapFault>,
}

impl SoapResponse {
    pub fn new(http: HttpResponse) -> Self {
        let fault = parse_soap_fault(&http.body);
        Self { http, fault }
    }

    pub fn http(&self) -> &HttpResponse {
        &self.http
    }

    pub fn into_http(self) -> HttpResponse {
        self.http
    }

    pub fn body(&self) -> &str {
        &self.http.body
    }

    pub fn soap_fault(&self) -> Option<&SoapFault> {
        self.fault.as_ref()
    }

    pub fn is_soap_fault(&self) -> bool {
        self.fault.is_some()
    }

    /// Non-2xx status without a SOAP fault.
    pub fn is_http_error(&self) -> bool {
        !self.http.is_success() && self.fault.is_none()
    }

    pub fn is_success(&self) -> bool {
        self.http.is_success() && self.fault.is_none()
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::ParsedDescription;
    use std::sync::Mutex;

    struct RecordingTransport {
        response: HttpResponse,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl RecordingTransport {
        fn new(response: HttpResponse) -> Self {
            Self {
                response,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn sent(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Transport for RecordingTransport {
        fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ClientError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(self.response.clone())
        }
    }

    fn shim(globals: &GlobalOptions) -> ServiceDescription {
        crate::description::resolve_description(globals, &crate::parser::WsdlInterpreter::new()).unwrap()
    }

    fn parsed() -> ServiceDescription {
        ServiceDescription::Parsed(
            ParsedDescription::new()
                .with_endpoint("http://example.org/users/soap")
                .with_namespace("http://example.org/users")
                .with_operation(OperationInfo::with_soap_action("GetUser", "urn:GetUser"))
                .with_operation(OperationInfo::new("ListUsers")),
        )
    }

    #[test]
    fn test_create_rejects_empty_name() {
        let globals = GlobalOptions::new();
        let description = parsed();
        let transport = RecordingTransport::new(HttpResponse::new(200, ""));
        let result = Operation::create("  ", &description, &globals, &transport);
        assert!(matches!(result, Err(ClientError::InvalidOperationName(_))));
    }

    #[test]
    fn test_create_rejects_names_that_break_the_envelope() {
        let globals = GlobalOptions::new();
        let description = parsed();
        let transport = RecordingTransport::new(HttpResponse::new(200, ""));
        for name in ["Get User", "Get<User>", "Get\"User", "ins:GetUser", "1GetUser"] {
            let result = Operation::create(name, &description, &globals, &transport);
            assert!(
                matches!(result, Err(ClientError::InvalidOperationName(ref n)) if n == name),
                "{} should be rejected",
                name
            );
        }
        assert!(Operation::create("Get_User-v2.1", &description, &globals, &transport).is_ok());
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_invalid_namespace_identifier_fails_before_sending() {
        let globals = GlobalOptions::new().namespace_identifier_as("bad prefix");
        let description = parsed();
        let transport = RecordingTransport::new(HttpResponse::new(200, ""));
        let operation = Operation::create("GetUser", &description, &globals, &transport).unwrap();
        assert!(matches!(
            operation.call(&LocalOptions::new()),
            Err(ClientError::InvalidOption { ref key, .. }) if key == "namespace_identifier"
        ));
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_create_unknown_name_is_deferred() {
        let globals = GlobalOptions::new();
        let description = parsed();
        let transport = RecordingTransport::new(HttpResponse::new(200, ""));
        let operation = Operation::create("Nope", &description, &globals, &transport).unwrap();
        assert_eq!(operation.name(), "Nope");
        assert!(transport.sent().is_empty());

        let err = operation.call(&LocalOptions::new()).unwrap_err();
        match err {
            ClientError::UnknownOperation { name, available } => {
                assert_eq!(name, "Nope");
                assert_eq!(available, vec!["GetUser".to_string(), "ListUsers".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_info_on_shim_is_missing_description() {
        let globals = GlobalOptions::new().endpoint("http://x").namespace("http://ns");
        let description = shim(&globals);
        let transport = RecordingTransport::new(HttpResponse::new(200, ""));
        let operation = Operation::create("Anything", &description, &globals, &transport).unwrap();
        assert!(matches!(operation.info(), Err(ClientError::MissingDescription)));
    }

    #[test]
    fn test_build_uses_declared_soap_action() {
        let globals = GlobalOptions::new();
        let description = parsed();
        let transport = RecordingTransport::new(HttpResponse::new(200, ""));

        let get_user = Operation::create("GetUser", &description, &globals, &transport).unwrap();
        let request = get_user.build(&LocalOptions::new()).unwrap();
        assert_eq!(request.soap_action, "urn:GetUser");
        assert_eq!(request.endpoint, "http://example.org/users/soap");
        assert_eq!(request.namespace.as_deref(), Some("http://example.org/users"));

        // No declared action falls back to the name
        let list_users = Operation::create("ListUsers", &description, &globals, &transport).unwrap();
        assert_eq!(list_users.build(&LocalOptions::new()).unwrap().soap_action, "ListUsers");

        let overridden = get_user.build(&LocalOptions::new().soap_action("urn:Custom")).unwrap();
        assert_eq!(overridden.soap_action, "urn:Custom");
    }

    #[test]
    fn test_shim_builds_from_endpoint_and_namespace() {
        let globals = GlobalOptions::new().endpoint("http://x").namespace("http://ns");
        let description = shim(&globals);
        let transport = RecordingTransport::new(HttpResponse::new(200, ""));
        let operation = Operation::create("Ping", &description, &globals, &transport).unwrap();

        let request = operation.build(&LocalOptions::new()).unwrap();
        assert_eq!(request.endpoint, "http://x");
        assert_eq!(request.soap_action, "Ping");
        assert_eq!(request.namespace_identifier, "ins");
    }

    #[test]
    fn test_missing_endpoint() {
        let globals = GlobalOptions::new();
        let description = ServiceDescription::Parsed(
            ParsedDescription::new().with_operation(OperationInfo::new("GetUser")),
        );
        let transport = RecordingTransport::new(HttpResponse::new(200, ""));
        let operation = Operation::create("GetUser", &description, &globals, &transport).unwrap();
        assert!(matches!(
            operation.build(&LocalOptions::new()),
            Err(ClientError::MissingEndpoint(ref name)) if name == "GetUser"
        ));
    }

    #[test]
    fn test_soap_11_envelope_and_headers() {
        let globals = GlobalOptions::new().header("X-Tenant", "acme").header("X-Trace", "global");
        let description = parsed();
        let transport = RecordingTransport::new(HttpResponse::new(200, "<ok/>"));
        let operation = Operation::create("GetUser", &description, &globals, &transport).unwrap();

        let locals = LocalOptions::new()
            .message("<ins:Id>42</ins:Id>")
            .header("X-Trace", "local");
        let response = operation.call(&locals).unwrap();
        assert!(response.is_success());

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        let request = &sent[0];
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.url, "http://example.org/users/soap");
        assert_eq!(request.header("content-type"), Some("text/xml;charset=UTF-8"));
        assert_eq!(request.header("SOAPAction"), Some("\"urn:GetUser\""));
        assert_eq!(request.header("X-Tenant"), Some("acme"));
        assert_eq!(request.header("X-Trace"), Some("local"));

        let body = request.body.as_deref().unwrap();
        assert!(body.contains(r#"xmlns:env="http://schemas.xmlsoap.org/soap/envelope/""#));
        assert!(body.contains(r#"xmlns:ins="http://example.org/users""#));
        assert!(body.contains("<ins:GetUser><ins:Id>42</ins:Id></ins:GetUser>"));
    }

    #[test]
    fn test_soap_12_content_type_carries_action() {
        let globals = GlobalOptions::new()
            .soap_version_as(SoapVersion::Soap12)
            .namespace_identifier_as("usr");
        let description = parsed();
        let transport = RecordingTransport::new(HttpResponse::new(200, ""));
        let operation = Operation::create("GetUser", &description, &globals, &transport).unwrap();
        operation.call(&LocalOptions::new()).unwrap();

        let request = &transport.sent()[0];
        assert_eq!(
            request.header("Content-Type"),
            Some("application/soap+xml;charset=UTF-8;action=\"urn:GetUser\"")
        );
        assert!(request.header("SOAPAction").is_none());
        let body = request.body.as_deref().unwrap();
        assert!(body.contains(SOAP_12_NS));
        assert!(body.contains("<usr:GetUser></usr:GetUser>"));
    }

    #[test]
    fn test_envelope_without_namespace() {
        let request = SoapRequest {
            endpoint: "http://x".to_string(),
            operation: "Ping".to_string(),
            soap_action: "Ping".to_string(),
            namespace: None,
            namespace_identifier: "ins".to_string(),
            version: SoapVersion::Soap11,
            message: None,
            headers: BTreeMap::new(),
        };
        assert!(request.envelope().contains("<env:Body><Ping></Ping></env:Body>"));
    }

    #[test]
    fn test_fault_response_is_ok() {
        let fault_body = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body><soap:Fault><faultcode>soap:Client</faultcode><faultstring>bad id</faultstring></soap:Fault></soap:Body>
</soap:Envelope>"#;
        let globals = GlobalOptions::new();
        let description = parsed();
        let transport = RecordingTransport::new(HttpResponse::new(500, fault_body));
        let operation = Operation::create("GetUser", &description, &globals, &transport).unwrap();

        let response = operation.call(&LocalOptions::new()).unwrap();
        assert!(response.is_soap_fault());
        assert!(!response.is_http_error());
        assert!(!response.is_success());
        assert_eq!(response.soap_fault().unwrap().reason, "bad id");
        assert_eq!(response.http().code, 500);
    }

    #[test]
    fn test_http_error_without_fault() {
        let response = SoapResponse::new(HttpResponse::new(503, "Service Unavailable"));
        assert!(response.is_http_error());
        assert!(!response.is_soap_fault());
        assert_eq!(response.body(), "Service Unavailable");
    }
}
