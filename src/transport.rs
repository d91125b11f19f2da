//! HTTP transport seam and the default blocking implementation.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::TransportOptions;
use crate::error::ClientError;

/// HTTP method used by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// A request handed to a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub options: TransportOptions,
}

impl HttpRequest {
    /// GET request for a remote WSDL document.
    pub fn wsdl(url: impl Into<String>, options: &TransportOptions) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: options.headers.clone(),
            body: None,
            options: options.clone(),
        }
    }

    /// Header value, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Raw HTTP exchange result, kept verbatim for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(code: u16, body: impl Into<String>) -> Self {
        Self {
            code,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Representation stored in the option store.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "code": self.code,
            "headers": self.headers,
            "body": self.body,
        })
    }
}

/// Performs one HTTP exchange.
///
/// A non-2xx status is still a completed exchange and must be returned as
/// `Ok`; `Err` is reserved for failures where no response was received.
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ClientError>;
}

/// Blocking transport backed by `ureq`.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport;

impl HttpTransport {
    pub fn new() -> Self {
        Self
    }

    fn agent(&self, options: &TransportOptions) -> Result<ureq::Agent, ClientError> {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = options.open_timeout {
            builder = builder.timeout_connect(timeout);
        }
        if let Some(timeout) = options.read_timeout {
            builder = builder.timeout_read(timeout);
        }
        if let Some(ref proxy) = options.proxy {
            let proxy = ureq::Proxy::new(proxy).map_err(ClientError::transport)?;
            builder = builder.proxy(proxy);
        }
        Ok(builder.build())
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ClientError> {
        let agent = self.agent(&request.options)?;
        let mut call = agent.request(request.method.as_str(), &request.url);

        for (name, value) in &request.headers {
            call = call.set(name, value);
        }
        if let Some((ref user, ref password)) = request.options.basic_auth {
            let token = STANDARD.encode(format!("{}:{}", user, password));
            call = call.set("Authorization", &format!("Basic {}", token));
        }

        debug!(method = request.method.as_str(), url = %request.url, "Sending HTTP request");

        let result = match request.body {
            Some(ref body) => call.send_string(body),
            None => call.call(),
        };

        let response = match result {
            Ok(response) => response,
            // Error statuses still carry a SOAP envelope worth keeping
            Err(ureq::Error::Status(_, response)) => response,
            Err(e) => return Err(ClientError::transport(e)),
        };

        let code = response.status();
        let headers = response
            .headers_names()
            .into_iter()
            .filter_map(|name| {
                let value = response.header(&name)?.to_string();
                Some((name, value))
            })
            .collect();
        let body = response.into_string()?;

        debug!(status = code, bytes = body.len(), "Received HTTP response");

        Ok(HttpResponse { code, headers, body })
    }
}
