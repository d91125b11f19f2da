//! SOAP client for Zentinel
//!
//! Calls operations on a remote SOAP service, described either by a WSDL
//! document or by a bare endpoint URL plus target namespace.
//!
//! # Features
//!
//! - WSDL-driven clients (remote URL, local file or inline document)
//! - Bare endpoint clients for services without a WSDL
//! - Endpoint and namespace overrides on top of a WSDL document
//! - Per-call options that never leak into the client configuration
//! - Capture of the raw HTTP response of every call, faults included
//!
//! # Example
//!
//! ```ignore
//! use zentinel_soap_client::{GlobalOptions, LocalOptions, SoapClient};
//!
//! let mut client = SoapClient::new(GlobalOptions::new().wsdl("http://example.com/users?wsdl"))?;
//! println!("{:?}", client.operations()?);
//!
//! let response = client.call("GetUser", &LocalOptions::new().message("<ins:Id>42</ins:Id>"))?;
//! println!("{}", response.body());
//! ```

pub mod client;
pub mod config;
pub mod description;
pub mod error;
pub mod operation;
pub mod parser;
pub mod transport;

pub use client::SoapClient;
pub use config::{GlobalOptions, LocalOptions, OptionKey};
pub use description::{DescriptionParser, ServiceDescription};
pub use error::{ClientError, SoapFault, SoapVersion};
pub use operation::{Operation, SoapResponse};
pub use transport::{HttpResponse, Transport};
