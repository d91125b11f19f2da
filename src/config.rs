//! Client configuration: the persistent option store and call-scoped options.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, SoapVersion};
use crate::transport::HttpResponse;

/// Name of a client option.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OptionKey {
    /// WSDL document source: URL, local path or inline XML
    Wsdl,
    /// SOAP endpoint URL (overrides the document's address)
    Endpoint,
    /// Target namespace (overrides the document's namespace)
    Namespace,
    /// Prefix bound to the target namespace in request envelopes
    NamespaceIdentifier,
    /// SOAP version: 1 or 2
    SoapVersion,
    /// Connect timeout in seconds
    OpenTimeout,
    /// Read timeout in seconds
    ReadTimeout,
    /// `[username, password]`
    BasicAuth,
    /// Proxy URL
    Proxy,
    /// Extra HTTP headers sent with every request
    Headers,
    /// Turn SOAP faults and HTTP errors into `Err`
    RaiseErrors,
    /// Raw HTTP response of the most recent call
    LastResponse,
    /// Any option this crate does not interpret
    Other(String),
}

impl OptionKey {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Wsdl => "wsdl",
            Self::Endpoint => "endpoint",
            Self::Namespace => "namespace",
            Self::NamespaceIdentifier => "namespace_identifier",
            Self::SoapVersion => "soap_version",
            Self::OpenTimeout => "open_timeout",
            Self::ReadTimeout => "read_timeout",
            Self::BasicAuth => "basic_auth",
            Self::Proxy => "proxy",
            Self::Headers => "headers",
            Self::RaiseErrors => "raise_errors",
            Self::LastResponse => "last_response",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for OptionKey {
    fn from(name: &str) -> Self {
        match name {
            "wsdl" => Self::Wsdl,
            "endpoint" => Self::Endpoint,
            "namespace" => Self::Namespace,
            "namespace_identifier" => Self::NamespaceIdentifier,
            "soap_version" => Self::SoapVersion,
            "open_timeout" => Self::OpenTimeout,
            "read_timeout" => Self::ReadTimeout,
            "basic_auth" => Self::BasicAuth,
            "proxy" => Self::Proxy,
            "headers" => Self::Headers,
            "raise_errors" => Self::RaiseErrors,
            "last_response" => Self::LastResponse,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for OptionKey {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<OptionKey> for String {
    fn from(key: OptionKey) -> Self {
        key.as_str().to_string()
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistent, client-wide option store.
///
/// Presence (`has`) is the only predicate used for branching: a key holding
/// `null` is present. Later writes overwrite earlier ones; nested values are
/// never merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalOptions {
    entries: BTreeMap<OptionKey, Value>,
}

impl GlobalOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a YAML mapping.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ClientError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load options from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Insert or overwrite an option.
    pub fn set(&mut self, key: impl Into<OptionKey>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Stored value, or `None` when absent.
    pub fn get(&self, key: &OptionKey) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn has(&self, key: &OptionKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OptionKey, &Value)> {
        self.entries.iter()
    }

    /// String option; `InvalidOption` if present with another type.
    pub fn get_str(&self, key: &OptionKey) -> Result<Option<&str>, ClientError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(invalid(key, "a string")),
        }
    }

    pub fn get_u64(&self, key: &OptionKey) -> Result<Option<u64>, ClientError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value.as_u64().map(Some).ok_or_else(|| invalid(key, "a non-negative integer")),
        }
    }

    pub fn get_bool(&self, key: &OptionKey) -> Result<Option<bool>, ClientError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value.as_bool().map(Some).ok_or_else(|| invalid(key, "a boolean")),
        }
    }

    /// SOAP version, defaulting to 1.1.
    pub fn soap_version(&self) -> Result<SoapVersion, ClientError> {
        match self.get_u64(&OptionKey::SoapVersion)? {
            None | Some(1) => Ok(SoapVersion::Soap11),
            Some(2) => Ok(SoapVersion::Soap12),
            Some(_) => Err(invalid(&OptionKey::SoapVersion, "1 or 2")),
        }
    }

    /// Whether faults and HTTP errors are raised, defaulting to true.
    pub fn raise_errors(&self) -> Result<bool, ClientError> {
        Ok(self.get_bool(&OptionKey::RaiseErrors)?.unwrap_or(true))
    }

    /// Prefix for the target namespace, defaulting to `ins`.
    pub fn namespace_identifier(&self) -> Result<&str, ClientError> {
        match self.get_str(&OptionKey::NamespaceIdentifier)? {
            None => Ok("ins"),
            Some(prefix) if is_xml_name(prefix) => Ok(prefix),
            Some(_) => Err(invalid(&OptionKey::NamespaceIdentifier, "an XML name prefix")),
        }
    }

    /// The raw HTTP response captured by the most recent call.
    pub fn last_response(&self) -> Option<HttpResponse> {
        self.get(&OptionKey::LastResponse)
            .and_then(|value| HttpResponse::deserialize(value).ok())
    }

    // Fluent setters

    pub fn wsdl(mut self, source: impl Into<String>) -> Self {
        self.set(OptionKey::Wsdl, source.into());
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.set(OptionKey::Endpoint, url.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.set(OptionKey::Namespace, namespace.into());
        self
    }

    pub fn namespace_identifier_as(mut self, prefix: impl Into<String>) -> Self {
        self.set(OptionKey::NamespaceIdentifier, prefix.into());
        self
    }

    pub fn soap_version_as(mut self, version: SoapVersion) -> Self {
        let number = match version {
            SoapVersion::Soap11 => 1,
            SoapVersion::Soap12 => 2,
        };
        self.set(OptionKey::SoapVersion, number);
        self
    }

    pub fn open_timeout(mut self, secs: u64) -> Self {
        self.set(OptionKey::OpenTimeout, secs);
        self
    }

    pub fn read_timeout(mut self, secs: u64) -> Self {
        self.set(OptionKey::ReadTimeout, secs);
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.set(
            OptionKey::BasicAuth,
            Value::Array(vec![Value::String(username.into()), Value::String(password.into())]),
        );
        self
    }

    pub fn proxy(mut self, url: impl Into<String>) -> Self {
        self.set(OptionKey::Proxy, url.into());
        self
    }

    /// Add one header to `headers`.
    ///
    /// A `headers` value that is not a mapping is left untouched, so reading
    /// the transport options still reports it as `InvalidOption`.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let headers = self
            .entries
            .entry(OptionKey::Headers)
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if let Value::Object(headers) = headers {
            headers.insert(name.into(), Value::String(value.into()));
        }
        self
    }

    pub fn raise_errors_as(mut self, raise: bool) -> Self {
        self.set(OptionKey::RaiseErrors, raise);
        self
    }
}

/// Whether `name` is an unprefixed XML name (an NCName).
pub(crate) fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        }
        _ => false,
    }
}

fn invalid(key: &OptionKey, expected: &'static str) -> ClientError {
    ClientError::InvalidOption {
        key: key.to_string(),
        expected,
    }
}

/// Options scoped to a single call. Never written into [`GlobalOptions`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalOptions {
    /// XML fragment placed inside the operation element
    pub message: Option<String>,

    /// SOAPAction to use instead of the resolved one
    pub soap_action: Option<String>,

    /// HTTP headers layered over the global `headers` for this call
    pub headers: BTreeMap<String, String>,
}

impl LocalOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, xml: impl Into<String>) -> Self {
        self.message = Some(xml.into());
        self
    }

    pub fn soap_action(mut self, action: impl Into<String>) -> Self {
        self.soap_action = Some(action.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Transport-level settings read from the global options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportOptions {
    pub open_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub basic_auth: Option<(String, String)>,
    pub proxy: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl TransportOptions {
    pub fn from_globals(globals: &GlobalOptions) -> Result<Self, ClientError> {
        let basic_auth = match globals.get(&OptionKey::BasicAuth) {
            None => None,
            Some(Value::Array(parts)) => match parts.as_slice() {
                [Value::String(user), Value::String(password)] => Some((user.clone(), password.clone())),
                _ => return Err(invalid(&OptionKey::BasicAuth, "[username, password]")),
            },
            Some(_) => return Err(invalid(&OptionKey::BasicAuth, "[username, password]")),
        };

        let headers = match globals.get(&OptionKey::Headers) {
            None => BTreeMap::new(),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(name, value)| match value {
                    Value::String(s) => Ok((name.clone(), s.clone())),
                    _ => Err(invalid(&OptionKey::Headers, "a mapping of strings")),
                })
                .collect::<Result<_, _>>()?,
            Some(_) => return Err(invalid(&OptionKey::Headers, "a mapping of strings")),
        };

        Ok(Self {
            open_timeout: globals.get_u64(&OptionKey::OpenTimeout)?.map(Duration::from_secs),
            read_timeout: globals.get_u64(&OptionKey::ReadTimeout)?.map(Duration::from_secs),
            basic_auth,
            proxy: globals.get_str(&OptionKey::Proxy)?.map(String::from),
            headers,
        })
    }
}
