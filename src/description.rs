//! Service descriptions and the resolver that picks one per client.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::config::{GlobalOptions, OptionKey, TransportOptions};
use crate::error::ClientError;

/// Metadata for one operation declared by a WSDL document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationInfo {
    /// Operation name
    pub name: String,
    /// SOAPAction declared by the binding
    pub soap_action: Option<String>,
}

impl OperationInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            soap_action: None,
        }
    }

    pub fn with_soap_action(name: impl Into<String>, soap_action: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            soap_action: Some(soap_action.into()),
        }
    }
}

/// A description built from a WSDL document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDescription {
    pub soap_endpoint: Option<String>,
    pub target_namespace: Option<String>,
    pub operations: BTreeMap<String, OperationInfo>,
}

impl ParsedDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.soap_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.target_namespace = Some(namespace.into());
        self
    }

    pub fn with_operation(mut self, operation: OperationInfo) -> Self {
        self.operations.insert(operation.name.clone(), operation);
        self
    }
}

/// Stand-in used when no WSDL was supplied; carries endpoint and namespace only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShimDescription {
    soap_endpoint: Option<String>,
    target_namespace: Option<String>,
}

/// What the client knows about the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceDescription {
    Parsed(ParsedDescription),
    Shim(ShimDescription),
}

impl ServiceDescription {
    pub fn shim() -> Self {
        Self::Shim(ShimDescription::default())
    }

    pub fn is_shim(&self) -> bool {
        matches!(self, Self::Shim(_))
    }

    pub fn soap_endpoint(&self) -> Option<&str> {
        match self {
            Self::Parsed(parsed) => parsed.soap_endpoint.as_deref(),
            Self::Shim(shim) => shim.soap_endpoint.as_deref(),
        }
    }

    pub fn target_namespace(&self) -> Option<&str> {
        match self {
            Self::Parsed(parsed) => parsed.target_namespace.as_deref(),
            Self::Shim(shim) => shim.target_namespace.as_deref(),
        }
    }

    /// Declared operations; `MissingDescription` for the shim, which has none to offer.
    pub fn operations(&self) -> Result<&BTreeMap<String, OperationInfo>, ClientError> {
        match self {
            Self::Parsed(parsed) => Ok(&parsed.operations),
            Self::Shim(_) => Err(ClientError::MissingDescription),
        }
    }

    pub(crate) fn set_soap_endpoint(&mut self, endpoint: String) {
        match self {
            Self::Parsed(parsed) => parsed.soap_endpoint = Some(endpoint),
            Self::Shim(shim) => shim.soap_endpoint = Some(endpoint),
        }
    }

    pub(crate) fn set_target_namespace(&mut self, namespace: String) {
        match self {
            Self::Parsed(parsed) => parsed.target_namespace = Some(namespace),
            Self::Shim(shim) => shim.target_namespace = Some(namespace),
        }
    }
}

/// Fetches and interprets a service description.
pub trait DescriptionParser {
    /// `source` is the configured `wsdl` value; `transport` carries the
    /// settings needed to retrieve a remote document.
    fn parse(&self, source: &str, transport: &TransportOptions) -> Result<ParsedDescription, ClientError>;
}

/// Produce the single description a client works against.
///
/// Parses the `wsdl` source when configured, falls back to the shim
/// otherwise, then applies `endpoint` and `namespace` overrides. Parser
/// failures are returned as they are.
pub fn resolve_description<P>(globals: &GlobalOptions, parser: &P) -> Result<ServiceDescription, ClientError>
where
    P: DescriptionParser + ?Sized,
{
    let mut description = if globals.has(&OptionKey::Wsdl) {
        let source = required_str(globals, OptionKey::Wsdl)?;
        let transport = TransportOptions::from_globals(globals)?;
        info!(source = %source, "Loading WSDL document");
        ServiceDescription::Parsed(parser.parse(&source, &transport)?)
    } else {
        info!("No WSDL configured, using endpoint and namespace only");
        ServiceDescription::shim()
    };

    if globals.has(&OptionKey::Endpoint) {
        let endpoint = required_str(globals, OptionKey::Endpoint)?;
        debug!(endpoint = %endpoint, "Overriding SOAP endpoint");
        description.set_soap_endpoint(endpoint);
    }
    if globals.has(&OptionKey::Namespace) {
        let namespace = required_str(globals, OptionKey::Namespace)?;
        debug!(namespace = %namespace, "Overriding target namespace");
        description.set_target_namespace(namespace);
    }

    Ok(description)
}

fn required_str(globals: &GlobalOptions, key: OptionKey) -> Result<String, ClientError> {
    match globals.get_str(&key)? {
        Some(value) => Ok(value.to_string()),
        None => Err(ClientError::InvalidOption {
            key: key.to_string(),
            expected: "a string",
        }),
    }
}
