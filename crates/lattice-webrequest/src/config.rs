//! Executor configuration and request catalogs.
//!
//! # Catalog format
//!
//! A [`RequestCatalog`] maps names to descriptors. In TOML each request is a
//! table:
//!
//! ```toml
//! [rank]
//! method = "GET"
//! uri = "https://api.example.com/rank"
//! headers = ["Accept,application/json"]
//!
//! [login]
//! method = "POST"
//! uri = "https://api.example.com/login"
//! simulated_duration_secs = 1.5
//! ```
//!
//! JSON catalogs use the same shape as an object of objects.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::descriptor::RequestDescriptor;
use crate::error::{Result, WebRequestError};
use crate::frame::DEFAULT_FRAME_INTERVAL;
use crate::response::ResponseCode;

/// Status reported by simulated requests unless configured otherwise.
pub const SIMULATED_SUCCESS_CODE: ResponseCode = 200;

/// Configuration for the request executor.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutorConfig {
    /// Period of the scheduling tick used for progress sampling and simulation.
    pub frame_interval: Duration,
    /// Status reported when a simulated request finishes.
    pub simulated_success_code: ResponseCode,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            frame_interval: DEFAULT_FRAME_INTERVAL,
            simulated_success_code: SIMULATED_SUCCESS_CODE,
        }
    }
}

impl ExecutorConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scheduling tick period.
    pub fn frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Set the status reported by simulated requests.
    pub fn simulated_success_code(mut self, code: ResponseCode) -> Self {
        self.simulated_success_code = code;
        self
    }
}

/// A named set of request descriptors loaded from configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestCatalog {
    requests: BTreeMap<String, RequestDescriptor>,
}

impl RequestCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a catalog from TOML.
    pub fn from_toml(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Parse a catalog from JSON.
    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    /// Load a catalog from a file. Files ending in `.json` are parsed as JSON,
    /// everything else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let catalog = if is_json {
            Self::from_json(&source)?
        } else {
            Self::from_toml(&source)?
        };
        tracing::debug!(
            target: "lattice_webrequest::config",
            "Loaded {} request(s) from {}",
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Look up a request by name.
    pub fn get(&self, name: &str) -> Result<&RequestDescriptor> {
        self.requests
            .get(name)
            .ok_or_else(|| WebRequestError::UnknownRequest(name.to_string()))
    }

    /// Add or replace a named request.
    pub fn insert(&mut self, name: impl Into<String>, descriptor: RequestDescriptor) {
        self.requests.insert(name.into(), descriptor);
    }

    /// Request names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.requests.keys().map(String::as_str)
    }

    /// Number of requests.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::descriptor::RequestMethod;

    const CATALOG: &str = r#"
        [rank]
        uri = "https://api.example.com/rank"
        headers = ["Accept,application/json"]

        [login]
        method = "POST"
        uri = "https://api.example.com/login"
        simulated_duration_secs = 1.5
    "#;

    #[test]
    fn test_default_executor_config() {
        let config = ExecutorConfig::default();
        assert_eq!(config.frame_interval, Duration::from_millis(16));
        assert_eq!(config.simulated_success_code, SIMULATED_SUCCESS_CODE);

        let config = ExecutorConfig::new()
            .frame_interval(Duration::from_millis(33))
            .simulated_success_code(1);
        assert_eq!(config.frame_interval, Duration::from_millis(33));
        assert_eq!(config.simulated_success_code, 1);
    }

    #[test]
    fn test_catalog_from_toml() {
        let catalog = RequestCatalog::from_toml(CATALOG).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["login", "rank"]);

        let login = catalog.get("login").unwrap();
        assert_eq!(login.method(), RequestMethod::Post);
        assert!(login.is_simulated());

        let rank = catalog.get("rank").unwrap();
        assert_eq!(rank.headers().unwrap()["Accept"], "application/json");
    }

    #[test]
    fn test_catalog_unknown_request() {
        let catalog = RequestCatalog::new();
        assert!(catalog.is_empty());
        assert!(matches!(
            catalog.get("missing"),
            Err(WebRequestError::UnknownRequest(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_catalog_from_json() {
        let catalog =
            RequestCatalog::from_json(r#"{"ping":{"method":"GET","uri":"http://localhost/ping"}}"#)
                .unwrap();
        assert_eq!(catalog.get("ping").unwrap().uri(), "http://localhost/ping");
    }

    #[test]
    fn test_catalog_load_by_extension() {
        let mut toml_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        toml_file.write_all(CATALOG.as_bytes()).unwrap();
        assert_eq!(RequestCatalog::load(toml_file.path()).unwrap().len(), 2);

        let mut json_file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        json_file
            .write_all(br#"{"a":{"uri":"http://localhost/a"}}"#)
            .unwrap();
        assert_eq!(RequestCatalog::load(json_file.path()).unwrap().len(), 1);
    }

    #[test]
    fn test_catalog_load_errors() {
        assert!(matches!(
            RequestCatalog::load("/nonexistent/catalog.toml"),
            Err(WebRequestError::Io(_))
        ));
        assert!(matches!(
            RequestCatalog::from_toml("[broken"),
            Err(WebRequestError::Toml(_))
        ));
    }

    #[test]
    fn test_catalog_insert() {
        let mut catalog = RequestCatalog::new();
        catalog.insert("ping", RequestDescriptor::get("http://localhost/ping"));
        assert_eq!(catalog.len(), 1);
    }
}
