//! Error types for the SOAP client.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed error used for collaborator failures that are passed through untouched.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Message raised when a client is built without enough information to reach a service.
pub const INITIALIZATION_MESSAGE: &str = "Expected either a WSDL document or the SOAP endpoint and target namespace options.\n\n\
    wsdl: /home/me/project/service.wsdl                           # to use a local WSDL document\n\
    wsdl: http://example.com?wsdl                                  # to use a remote WSDL document\n\
    endpoint: http://example.com + namespace: http://v1.example.com  # if you don't have a WSDL document\n\
    (wsdl together with endpoint and/or namespace overrides what the document declares)";

/// SOAP client errors.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{0}")]
    Initialization(String),

    #[error("Unable to inspect the service without a WSDL document")]
    MissingDescription,

    #[error("Invalid value for option '{key}': expected {expected}")]
    InvalidOption { key: String, expected: &'static str },

    #[error("Invalid operation name '{0}': expected a non-empty XML name")]
    InvalidOperationName(String),

    #[error("Unable to find SOAP operation '{name}' (available: {})", .available.join(", "))]
    UnknownOperation { name: String, available: Vec<String> },

    #[error("No SOAP endpoint known for operation '{0}'")]
    MissingEndpoint(String),

    #[error("WSDL error: {0}")]
    Wsdl(String),

    #[error(transparent)]
    Transport(BoxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("SOAP fault: {0}")]
    SoapFault(SoapFault),

    #[error("HTTP error {code}: {body}")]
    HttpStatus { code: u16, body: String },
}

impl ClientError {
    /// Wrap a collaborator failure without altering it.
    pub fn transport(err: impl Into<BoxError>) -> Self {
        Self::Transport(err.into())
    }

    /// The initialization failure listing the accepted configuration shapes.
    pub fn initialization() -> Self {
        Self::Initialization(INITIALIZATION_MESSAGE.to_string())
    }
}

/// SOAP protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SoapVersion {
    /// SOAP 1.1 (namespace: http://schemas.xmlsoap.org/soap/envelope/)
    #[default]
    #[serde(rename = "1.1")]
    Soap11,
    /// SOAP 1.2 (namespace: http://www.w3.org/2003/05/soap-envelope)
    #[serde(rename = "1.2")]
    Soap12,
}

/// A SOAP Fault extracted from a response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoapFault {
    /// Envelope version the fault was reported in
    pub version: SoapVersion,
    /// `faultcode` (1.1) or `Code/Value` (1.2)
    pub code: String,
    /// `faultstring` (1.1) or `Reason/Text` (1.2)
    pub reason: String,
}

impl fmt::Display for SoapFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) {}", self.code, self.reason)
    }
}
