//! SOAP client facade.
//!
//! Checks that the options describe a reachable service, resolves the
//! service description once, and drives each call through an [`Operation`].

use std::fmt;

use tracing::{debug, info, warn};

use crate::config::{GlobalOptions, LocalOptions, OptionKey};
use crate::description::{resolve_description, DescriptionParser, ServiceDescription};
use crate::error::ClientError;
use crate::operation::{Operation, SoapResponse};
use crate::parser::WsdlInterpreter;
use crate::transport::{HttpResponse, HttpTransport, Transport};

/// A SOAP client bound to one service.
///
/// Built either from a WSDL document (`wsdl`) or from a bare `endpoint` plus
/// `namespace`; with both, `endpoint` and `namespace` override the document.
///
/// Calls take `&mut self` because each one records its raw HTTP response
/// under `last_response`. Sharing a client across threads needs an external lock.
pub struct SoapClient {
    globals: GlobalOptions,
    description: ServiceDescription,
    transport: Box<dyn Transport>,
}

impl SoapClient {
    /// Create a client using the default WSDL interpreter and HTTP transport.
    pub fn new(globals: GlobalOptions) -> Result<Self, ClientError> {
        Self::with_collaborators(globals, &WsdlInterpreter::new(), Box::new(HttpTransport::new()))
    }

    /// Create a client with a custom description parser and transport.
    pub fn with_collaborators<P>(
        globals: GlobalOptions,
        parser: &P,
        transport: Box<dyn Transport>,
    ) -> Result<Self, ClientError>
    where
        P: DescriptionParser + ?Sized,
    {
        if !wsdl_or_endpoint_and_namespace_specified(&globals) {
            return Err(ClientError::initialization());
        }

        let description = resolve_description(&globals, parser)?;
        let mode = if description.is_shim() { "endpoint" } else { "wsdl" };

        info!(
            mode = mode,
            endpoint = ?description.soap_endpoint(),
            namespace = ?description.target_namespace(),
            "SOAP client initialized"
        );

        Ok(Self {
            globals,
            description,
            transport,
        })
    }

    pub fn globals(&self) -> &GlobalOptions {
        &self.globals
    }

    pub fn description(&self) -> &ServiceDescription {
        &self.description
    }

    /// Names of the operations declared by the WSDL document.
    pub fn operations(&self) -> Result<Vec<&str>, ClientError> {
        match self.description {
            ServiceDescription::Parsed(ref parsed) => {
                Ok(parsed.operations.keys().map(String::as_str).collect())
            }
            ServiceDescription::Shim(_) => Err(ClientError::MissingDescription),
        }
    }

    /// Resolve an operation without invoking it.
    pub fn operation(&self, name: &str) -> Result<Operation<'_>, ClientError> {
        Operation::create(name, &self.description, &self.globals, self.transport.as_ref())
    }

    /// Invoke an operation.
    ///
    /// The raw HTTP response is stored under `last_response` before the
    /// outcome is inspected, so it is kept for faults too. With
    /// `raise_errors` (the default) a SOAP fault or HTTP error status is
    /// then returned as `Err`.
    pub fn call(&mut self, name: &str, locals: &LocalOptions) -> Result<SoapResponse, ClientError> {
        let raise_errors = self.globals.raise_errors()?;
        let response = self.operation(name)?.call(locals)?;
        self.persist_last_response(&response);

        debug!(
            operation = %name,
            status = response.http().code,
            fault = response.is_soap_fault(),
            "SOAP call completed"
        );

        if !raise_errors {
            return Ok(response);
        }

        if let Some(fault) = response.soap_fault() {
            warn!(operation = %name, code = %fault.code, reason = %fault.reason, "SOAP fault");
            return Err(ClientError::SoapFault(fault.clone()));
        }
        if response.is_http_error() {
            warn!(operation = %name, status = response.http().code, "HTTP error");
            return Err(ClientError::HttpStatus {
                code: response.http().code,
                body: response.body().to_string(),
            });
        }

        Ok(response)
    }

    /// The raw HTTP response of the most recent call.
    pub fn last_response(&self) -> Option<HttpResponse> {
        self.globals.last_response()
    }

    fn persist_last_response(&mut self, response: &SoapResponse) {
        self.globals.set(OptionKey::LastResponse, response.http().to_value());
    }
}

impl fmt::Debug for SoapClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoapClient")
            .field("globals", &self.globals)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

fn wsdl_or_endpoint_and_namespace_specified(globals: &GlobalOptions) -> bool {
    globals.has(&OptionKey::Wsdl)
        || (globals.has(&OptionKey::Endpoint) && globals.has(&OptionKey::Namespace))
}
