//! Error types for web requests.
//!
//! Request failures at runtime (connection refused, 404, ...) never surface
//! as a `WebRequestError` to the caller of `RequestExecutor::execute`; they
//! are rendered to text and delivered through the response callback. This
//! type covers everything around that path: loading descriptors, building
//! transports, and describing transport failures.

/// Errors produced by the web request layer.
#[derive(Debug, thiserror::Error)]
pub enum WebRequestError {
    /// HTTP request failed.
    #[error("HTTP request error: {0}")]
    Request(String),
    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Request timed out.
    #[error("Request timed out")]
    Timeout,
    /// Connection refused or failed.
    #[error("Connection error: {0}")]
    Connection(String),
    /// Invalid header name or value.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
    /// Proxy configuration error.
    #[error("Proxy error: {0}")]
    Proxy(String),
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),
    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    Toml(String),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
    /// Request was cancelled.
    #[error("Request was cancelled")]
    Cancelled,
    /// A catalog lookup named a request that does not exist.
    #[error("Unknown request '{0}'")]
    UnknownRequest(String),
}

impl From<reqwest::Error> for WebRequestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

impl From<url::ParseError> for WebRequestError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for WebRequestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<toml::de::Error> for WebRequestError {
    fn from(err: toml::de::Error) -> Self {
        Self::Toml(err.to_string())
    }
}

impl From<std::io::Error> for WebRequestError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<http::header::InvalidHeaderName> for WebRequestError {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for WebRequestError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

/// A specialized Result type for web request operations.
pub type Result<T> = std::result::Result<T, WebRequestError>;
