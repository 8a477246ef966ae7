//! Response reporting types.
//!
//! Callers receive the result of a request twice: as the `(status, text)` pair
//! handed to the response callback, and as the [`RequestOutcome`] returned by
//! the executor. The pair does not say whether the text is a body or an error
//! description; by convention a status below `400` means body, while `400`
//! and above, or `0` for a failed transfer, means error. Simulated requests
//! report the configured success code with empty text. The outcome carries
//! that distinction explicitly.

/// Status code reported to response callbacks.
///
/// Wide enough for HTTP status codes and for application-defined codes used
/// by simulated responses. `0` means no response was received.
pub type ResponseCode = i64;

/// Callback receiving the final status and the body or error text.
pub type ResponseCallback = Box<dyn FnOnce(ResponseCode, String) + Send>;

/// Callback receiving transfer progress, nominally in `0.0..=1.0`.
pub type ProgressCallback = Box<dyn FnMut(f32) + Send>;

/// The classified result of one request execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The request completed and the server answered with a success status.
    Success {
        /// Status code.
        status: ResponseCode,
        /// Response body text.
        body: String,
    },
    /// The request failed at the network level or with an error status.
    Failure {
        /// Status code, `0` if no response was received.
        status: ResponseCode,
        /// Error description.
        error: String,
    },
    /// The request was cancelled before it completed.
    Cancelled,
}

impl RequestOutcome {
    /// The reported status code, or `None` for a cancelled request.
    pub fn status(&self) -> Option<ResponseCode> {
        match self {
            Self::Success { status, .. } | Self::Failure { status, .. } => Some(*status),
            Self::Cancelled => None,
        }
    }

    /// The body (on success) or error description (on failure).
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Success { body, .. } => Some(body),
            Self::Failure { error, .. } => Some(error),
            Self::Cancelled => None,
        }
    }

    /// Check if the request was successful.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Check if the request failed.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// Check if the request was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The `(status, text)` pair delivered to the response callback.
    pub(crate) fn into_report(self) -> Option<(ResponseCode, String)> {
        match self {
            Self::Success { status, body } => Some((status, body)),
            Self::Failure { status, error } => Some((status, error)),
            Self::Cancelled => None,
        }
    }
}

/// Optional callbacks for one request execution.
///
/// A missing callback is skipped.
#[derive(Default)]
pub struct RequestCallbacks {
    pub(crate) on_response: Option<ResponseCallback>,
    pub(crate) on_progress: Option<ProgressCallback>,
}

impl RequestCallbacks {
    /// Create an empty set of callbacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the callback invoked once with the final status and text.
    pub fn on_response<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(ResponseCode, String) + Send + 'static,
    {
        self.on_response = Some(Box::new(callback));
        self
    }

    /// Set the callback invoked on every tick while the transfer is in flight.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(f32) + Send + 'static,
    {
        self.on_progress = Some(Box::new(callback));
        self
    }

    /// Whether a progress callback is set.
    pub fn has_progress(&self) -> bool {
        self.on_progress.is_some()
    }
}

impl std::fmt::Debug for RequestCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCallbacks")
            .field("on_response", &self.on_response.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}
