//! The transport capability behind the executor.
//!
//! A [`Transport`] runs the actual HTTP exchange. The executor only starts a
//! transfer, samples its state, and waits for it to finish, so anything that
//! can answer those questions can stand in for the network: the
//! [`ReqwestTransport`] for real traffic, or an in-memory double in tests.
//!
//! Starting a transfer never fails. A bad URI or header is reported as a
//! transfer that is already done with an error, and flows through the same
//! response path as any other failure.

mod reqwest_transport;

use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::BoxFuture;

use crate::descriptor::Headers;
use crate::form::FormData;
use crate::response::{RequestOutcome, ResponseCode};

pub use reqwest_transport::{ReqwestTransport, ReqwestTransportBuilder, TransportConfig};

/// Unique identifier for a transfer started on a transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferId(u64);

impl TransferId {
    /// Allocate a new process-wide unique transfer ID.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Which half of the exchange progress is reported for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferDirection {
    /// Request body being sent (POST).
    Upload,
    /// Response body being received (GET).
    Download,
}

/// Point-in-time state of a transfer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransferSnapshot {
    /// Whether the transfer finished, successfully or not.
    pub done: bool,
    /// Fraction of the request body sent.
    pub upload_progress: f32,
    /// Fraction of the response body received.
    pub download_progress: f32,
    /// Response status, `0` until a response arrives.
    pub status: ResponseCode,
    /// Network-level error description, if the transfer failed.
    pub error: Option<String>,
    /// Response body text received so far.
    pub body: String,
}

impl TransferSnapshot {
    /// A finished transfer that received a response.
    pub fn completed(status: ResponseCode, body: impl Into<String>) -> Self {
        Self {
            done: true,
            upload_progress: 1.0,
            download_progress: 1.0,
            status,
            error: None,
            body: body.into(),
        }
    }

    /// A finished transfer that failed with an error.
    pub fn failed(status: ResponseCode, error: impl Into<String>) -> Self {
        Self {
            done: true,
            status,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Progress for the given direction.
    pub fn progress(&self, direction: TransferDirection) -> f32 {
        match direction {
            TransferDirection::Upload => self.upload_progress,
            TransferDirection::Download => self.download_progress,
        }
    }

    /// Whether the transfer failed before a usable response arrived.
    pub fn is_network_error(&self) -> bool {
        self.error.is_some()
    }

    /// Whether the server answered with an error status (4xx or 5xx).
    pub fn is_http_error(&self) -> bool {
        self.status >= 400
    }

    /// Classify the finished transfer.
    ///
    /// A network error or an error status is a failure; the error text is the
    /// transport's description, or `"HTTP/1.1 <code> <reason>"` for a status
    /// without one. Everything else is a success carrying the body.
    pub fn into_outcome(self) -> RequestOutcome {
        if let Some(error) = self.error {
            RequestOutcome::Failure {
                status: self.status,
                error,
            }
        } else if self.is_http_error() {
            RequestOutcome::Failure {
                status: self.status,
                error: describe_status(self.status),
            }
        } else {
            RequestOutcome::Success {
                status: self.status,
                body: self.body,
            }
        }
    }
}

/// Status line used as the error text of an HTTP error response.
pub fn describe_status(status: ResponseCode) -> String {
    let reason = u16::try_from(status)
        .ok()
        .and_then(|code| http::StatusCode::from_u16(code).ok())
        .and_then(|code| code.canonical_reason());
    match reason {
        Some(reason) => format!("HTTP/1.1 {status} {reason}"),
        None => format!("HTTP/1.1 {status}"),
    }
}

/// Byte counts for an upload or download.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransferProgress {
    /// Number of bytes transferred so far.
    pub bytes_transferred: u64,
    /// Total number of bytes, if known.
    pub total_bytes: Option<u64>,
}

impl TransferProgress {
    /// Get the progress as a fraction (0.0 to 1.0), if total is known.
    pub fn fraction(&self) -> Option<f32> {
        self.total_bytes.map(|total| {
            if total == 0 {
                1.0
            } else {
                (self.bytes_transferred as f64 / total as f64).min(1.0) as f32
            }
        })
    }
}

/// An HTTP stack the executor can drive.
///
/// Implementations own one connection and buffers per transfer; concurrent
/// transfers must not share mutable state visible to callers.
pub trait Transport: Send + Sync + 'static {
    /// Start a GET request for `uri` with the given headers.
    fn start_get(&self, uri: &str, headers: Option<&Headers>) -> TransferId;

    /// Start a POST request for `uri` with a form-encoded body.
    fn start_post(&self, uri: &str, headers: Option<&Headers>, form: &FormData) -> TransferId;

    /// Sample the current state of a transfer.
    fn poll(&self, id: TransferId) -> TransferSnapshot;

    /// Resolve once the transfer is done.
    fn wait(&self, id: TransferId) -> BoxFuture<'_, TransferSnapshot>;

    /// Stop an in-flight transfer. Finished or unknown transfers are ignored.
    fn abort(&self, id: TransferId);

    /// Forget a finished transfer.
    fn release(&self, _id: TransferId) {}
}

/// Snapshot returned for a transfer ID the transport does not know.
pub(crate) fn unknown_transfer(id: TransferId) -> TransferSnapshot {
    TransferSnapshot::failed(0, format!("Unknown transfer {}", id.as_u64()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_ids_are_unique() {
        let a = TransferId::next();
        let b = TransferId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_success_outcome() {
        let outcome = TransferSnapshot::completed(200, "ok").into_outcome();
        assert_eq!(
            outcome,
            RequestOutcome::Success {
                status: 200,
                body: "ok".into()
            }
        );
    }

    #[test]
    fn test_http_error_outcome() {
        let snapshot = TransferSnapshot::completed(404, "missing page");
        assert!(snapshot.is_http_error());
        assert_eq!(
            snapshot.into_outcome(),
            RequestOutcome::Failure {
                status: 404,
                error: "HTTP/1.1 404 Not Found".into()
            }
        );
    }

    #[test]
    fn test_network_error_outcome() {
        let snapshot = TransferSnapshot::failed(0, "Connection error: refused");
        assert!(snapshot.is_network_error());
        assert_eq!(
            snapshot.into_outcome(),
            RequestOutcome::Failure {
                status: 0,
                error: "Connection error: refused".into()
            }
        );
    }

    #[test]
    fn test_describe_unusual_status() {
        assert_eq!(describe_status(599), "HTTP/1.1 599");
        assert_eq!(describe_status(70000), "HTTP/1.1 70000");
        assert_eq!(describe_status(500), "HTTP/1.1 500 Internal Server Error");
    }

    #[test]
    fn test_progress_by_direction() {
        let snapshot = TransferSnapshot {
            upload_progress: 0.25,
            download_progress: 0.75,
            ..TransferSnapshot::default()
        };
        assert_eq!(snapshot.progress(TransferDirection::Upload), 0.25);
        assert_eq!(snapshot.progress(TransferDirection::Download), 0.75);
    }

    #[test]
    fn test_transfer_progress_fraction() {
        let unknown = TransferProgress {
            bytes_transferred: 10,
            total_bytes: None,
        };
        assert_eq!(unknown.fraction(), None);

        let half = TransferProgress {
            bytes_transferred: 50,
            total_bytes: Some(100),
        };
        assert_eq!(half.fraction(), Some(0.5));

        let empty = TransferProgress {
            bytes_transferred: 0,
            total_bytes: Some(0),
        };
        assert_eq!(empty.fraction(), Some(1.0));
    }
}
