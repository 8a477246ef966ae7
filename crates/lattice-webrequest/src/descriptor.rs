//! Request descriptors.
//!
//! A [`RequestDescriptor`] names one request: method, target URI, headers and
//! an optional simulated duration for demo/offline mode. Descriptors are
//! usually loaded from configuration, so headers are stored the way they are
//! authored, as a list of `"key,value"` strings, and parsed into a map the
//! first time [`RequestDescriptor::headers`] is called.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::response::ResponseCode;

/// Parsed request headers, keyed by header name.
pub type Headers = HashMap<String, String>;

/// Simulated duration meaning "send the real request".
pub const NO_SIMULATION: f32 = -1.0;

/// HTTP request methods supported by the executor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestMethod {
    /// HTTP GET method.
    #[default]
    Get,
    /// HTTP POST method with a form-encoded body.
    Post,
}

impl std::fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

fn no_simulation() -> f32 {
    NO_SIMULATION
}

/// Description of a single request.
///
/// A descriptor is not mutated once built; the parsed header map is computed
/// lazily and cached for the descriptor's lifetime.
///
/// # Example
///
/// ```ignore
/// use lattice_webrequest::RequestDescriptor;
///
/// let descriptor = RequestDescriptor::get("https://api.example.com/rank")
///     .header("Accept", "application/json")
///     .simulate(1.5);
/// assert!(descriptor.is_simulated());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestDescriptor {
    #[serde(default)]
    method: RequestMethod,
    uri: String,
    #[serde(default, rename = "headers", skip_serializing_if = "Option::is_none")]
    header_source: Option<Vec<String>>,
    #[serde(default = "no_simulation")]
    simulated_duration_secs: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    simulated_status: Option<ResponseCode>,
    #[serde(skip)]
    parsed_headers: OnceLock<Option<Headers>>,
}

impl RequestDescriptor {
    /// Create a descriptor for the given method and URI.
    pub fn new(method: RequestMethod, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            header_source: None,
            simulated_duration_secs: NO_SIMULATION,
            simulated_status: None,
            parsed_headers: OnceLock::new(),
        }
    }

    /// Create a GET descriptor.
    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(RequestMethod::Get, uri)
    }

    /// Create a POST descriptor.
    pub fn post(uri: impl Into<String>) -> Self {
        Self::new(RequestMethod::Post, uri)
    }

    /// Replace the raw header list. Entries use the `"key"` or `"key,value"` form.
    pub fn header_source<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.header_source = Some(entries.into_iter().map(Into::into).collect());
        self.parsed_headers = OnceLock::new();
        self
    }

    /// Append one header to the raw header list.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.header_source
            .get_or_insert_with(Vec::new)
            .push(format!("{},{}", name.as_ref(), value.as_ref()));
        self.parsed_headers = OnceLock::new();
        self
    }

    /// Answer with a simulated success after `seconds` instead of touching the network.
    ///
    /// Zero or negative values disable the simulation.
    pub fn simulate(mut self, seconds: f32) -> Self {
        self.simulated_duration_secs = seconds;
        self
    }

    /// Override the status reported when the request is simulated.
    pub fn simulated_status(mut self, status: ResponseCode) -> Self {
        self.simulated_status = Some(status);
        self
    }

    /// The request method.
    pub fn method(&self) -> RequestMethod {
        self.method
    }

    /// The target URI.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The raw header list as authored, if any.
    pub fn raw_headers(&self) -> Option<&[String]> {
        self.header_source.as_deref()
    }

    /// Simulated duration in seconds, or [`NO_SIMULATION`].
    pub fn simulated_duration_secs(&self) -> f32 {
        self.simulated_duration_secs
    }

    /// Status override for the simulated response, if any.
    pub fn simulated_status_override(&self) -> Option<ResponseCode> {
        self.simulated_status
    }

    /// Whether executing this descriptor runs the simulation instead of a request.
    pub fn is_simulated(&self) -> bool {
        self.simulated_duration_secs > 0.0
    }

    /// The parsed header map.
    ///
    /// Returns `None` when the raw list is absent or empty. The map is built
    /// on first access and reused afterwards.
    pub fn headers(&self) -> Option<&Headers> {
        self.parsed_headers
            .get_or_init(|| parse_header_source(self.header_source.as_deref()))
            .as_ref()
    }

    /// Parse a descriptor from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a descriptor from TOML.
    pub fn from_toml(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Serialize the descriptor to compact JSON.
    pub fn to_json(&self) -> String {
        // Every field is a plain string, number or list, so this cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl PartialEq for RequestDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method
            && self.uri == other.uri
            && self.header_source == other.header_source
            && self.simulated_duration_secs == other.simulated_duration_secs
            && self.simulated_status == other.simulated_status
    }
}

/// Build a header map from `"key"` / `"key,value"` entries.
///
/// The first comma separates the key from the value; an entry without a comma
/// maps to an empty value. A repeated key keeps its last value.
pub fn parse_header_source(entries: Option<&[String]>) -> Option<Headers> {
    let entries = entries.filter(|entries| !entries.is_empty())?;

    let mut headers = Headers::with_capacity(entries.len());
    for entry in entries {
        let (key, value) = entry.split_once(',').unwrap_or((entry.as_str(), ""));
        if headers.insert(key.to_string(), value.to_string()).is_some() {
            tracing::warn!(
                target: "lattice_webrequest::descriptor",
                "Duplicate header '{}' in header source, keeping the last value",
                key
            );
        }
    }
    Some(headers)
}
