//! The request executor.
//!
//! [`RequestExecutor::execute`] is the single entry point: it plays a
//! simulated response for descriptors with a positive simulated duration, and
//! otherwise dispatches on the method to [`get`](RequestExecutor::get) or
//! [`post`](RequestExecutor::post). Every path ends with at most one call to
//! the response callback, after all progress callbacks for that request.
//!
//! # Suspension points
//!
//! Without a progress callback the executor suspends exactly once, until the
//! transport reports the transfer done. With one it suspends once per
//! scheduling tick and reports the current fraction after each tick. A
//! [`CancellationToken`] is observed at every suspension point.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::ExecutorConfig;
use crate::descriptor::{Headers, RequestDescriptor, RequestMethod};
use crate::form::FormData;
use crate::frame::FrameClock;
use crate::response::{
    ProgressCallback, RequestCallbacks, RequestOutcome, ResponseCallback, ResponseCode,
};
use crate::transport::{TransferDirection, TransferId, Transport};

/// Progress sink borrowed for the duration of one execution.
pub type ProgressSink<'a> = Option<&'a mut ProgressCallback>;

/// Executes request descriptors against a [`Transport`].
pub struct RequestExecutor<T: Transport> {
    transport: Arc<T>,
    config: ExecutorConfig,
}

impl<T: Transport> RequestExecutor<T> {
    /// Create an executor with the default configuration.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ExecutorConfig::default())
    }

    /// Create an executor with a custom configuration.
    pub fn with_config(transport: T, config: ExecutorConfig) -> Self {
        Self::from_arc(Arc::new(transport), config)
    }

    /// Create an executor sharing an existing transport.
    pub fn from_arc(transport: Arc<T>, config: ExecutorConfig) -> Self {
        Self { transport, config }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// The executor configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute a request and report through the given callbacks.
    ///
    /// The response callback receives `(status, text)`. For a real request
    /// the text is the response body when the status is below `400`, and an
    /// error description for `400` and above or when the transfer failed; a
    /// status of `0` means no response was received. A simulated request
    /// reports the configured success code (or its override) with empty text. The returned
    /// [`RequestOutcome`] carries the same information already classified.
    ///
    /// `form` is ignored for GET and for simulated requests. An absent form on
    /// a POST sends an empty body.
    pub async fn execute(
        &self,
        descriptor: &RequestDescriptor,
        form: Option<&FormData>,
        callbacks: RequestCallbacks,
    ) -> RequestOutcome {
        self.execute_with_cancel(descriptor, form, callbacks, &CancellationToken::new())
            .await
    }

    /// Like [`execute`](Self::execute), stopping early when `cancel` fires.
    ///
    /// A cancelled request aborts its transfer, never invokes the response
    /// callback, and returns [`RequestOutcome::Cancelled`].
    pub async fn execute_with_cancel(
        &self,
        descriptor: &RequestDescriptor,
        form: Option<&FormData>,
        callbacks: RequestCallbacks,
        cancel: &CancellationToken,
    ) -> RequestOutcome {
        let RequestCallbacks {
            on_response,
            mut on_progress,
        } = callbacks;

        if cancel.is_cancelled() {
            tracing::debug!(
                target: "lattice_webrequest::executor",
                "Request to {} cancelled before start",
                descriptor.uri()
            );
            return RequestOutcome::Cancelled;
        }

        let outcome = if descriptor.is_simulated() {
            tracing::warn!(
                target: "lattice_webrequest::executor",
                "Simulating request: {}",
                descriptor.to_json()
            );
            let status = descriptor
                .simulated_status_override()
                .unwrap_or(self.config.simulated_success_code);
            self.simulate(
                descriptor.simulated_duration_secs(),
                status,
                on_progress.as_mut(),
                cancel,
            )
            .await
        } else {
            tracing::debug!(
                target: "lattice_webrequest::executor",
                "Starting {} {}",
                descriptor.method(),
                descriptor.uri()
            );
            match descriptor.method() {
                RequestMethod::Get => {
                    self.get(
                        descriptor.uri(),
                        descriptor.headers(),
                        on_progress.as_mut(),
                        cancel,
                    )
                    .await
                }
                RequestMethod::Post => {
                    let empty = FormData::new();
                    self.post(
                        descriptor.uri(),
                        descriptor.headers(),
                        form.unwrap_or(&empty),
                        on_progress.as_mut(),
                        cancel,
                    )
                    .await
                }
            }
        };

        tracing::debug!(
            target: "lattice_webrequest::executor",
            "Finished {} {}: {:?}",
            descriptor.method(),
            descriptor.uri(),
            outcome.status()
        );
        report(&outcome, on_response);
        outcome
    }

    /// Play a simulated response lasting `duration_secs` of real time.
    ///
    /// Each tick adds the elapsed time since the previous tick and reports
    /// `elapsed / duration_secs`. Ticks continue while the elapsed time is at
    /// most the duration, so the last reported value is usually slightly
    /// above `1.0`. The transport is never touched.
    ///
    /// The outcome is a success with an empty body when `status` is the
    /// configured success code, and a failure with an empty error otherwise.
    pub async fn simulate(
        &self,
        duration_secs: f32,
        status: ResponseCode,
        mut on_progress: ProgressSink<'_>,
        cancel: &CancellationToken,
    ) -> RequestOutcome {
        let mut clock = FrameClock::new(self.config.frame_interval);
        let mut elapsed = 0.0_f32;

        while duration_secs > 0.0 && elapsed <= duration_secs {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return RequestOutcome::Cancelled,
                delta = clock.next_frame() => elapsed += delta.as_secs_f32(),
            }
            if let Some(on_progress) = on_progress.as_mut() {
                on_progress(elapsed / duration_secs);
            }
        }

        if status == self.config.simulated_success_code {
            RequestOutcome::Success {
                status,
                body: String::new(),
            }
        } else {
            RequestOutcome::Failure {
                status,
                error: String::new(),
            }
        }
    }

    /// Run a GET request, reporting download progress.
    pub async fn get(
        &self,
        uri: &str,
        headers: Option<&Headers>,
        on_progress: ProgressSink<'_>,
        cancel: &CancellationToken,
    ) -> RequestOutcome {
        let id = self.transport.start_get(uri, headers);
        self.complete(id, TransferDirection::Download, on_progress, cancel)
            .await
    }

    /// Run a POST request with a form-encoded body, reporting upload progress.
    pub async fn post(
        &self,
        uri: &str,
        headers: Option<&Headers>,
        form: &FormData,
        on_progress: ProgressSink<'_>,
        cancel: &CancellationToken,
    ) -> RequestOutcome {
        let id = self.transport.start_post(uri, headers, form);
        self.complete(id, TransferDirection::Upload, on_progress, cancel)
            .await
    }

    async fn complete(
        &self,
        id: TransferId,
        direction: TransferDirection,
        on_progress: ProgressSink<'_>,
        cancel: &CancellationToken,
    ) -> RequestOutcome {
        let guard = TransferGuard {
            transport: self.transport.as_ref(),
            id,
            armed: true,
        };

        let finished = match on_progress {
            None => tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                snapshot = self.transport.wait(id) => Some(snapshot),
            },
            Some(on_progress) => {
                let mut clock = FrameClock::new(self.config.frame_interval);
                let mut snapshot = self.transport.poll(id);
                let mut cancelled = false;

                while !snapshot.done {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            cancelled = true;
                            break;
                        }
                        _ = clock.next_frame() => {}
                    }
                    snapshot = self.transport.poll(id);
                    on_progress(snapshot.progress(direction));
                }

                (!cancelled).then_some(snapshot)
            }
        };

        match finished {
            Some(snapshot) => {
                guard.release();
                snapshot.into_outcome()
            }
            None => {
                drop(guard);
                RequestOutcome::Cancelled
            }
        }
    }
}

impl<T: Transport> std::fmt::Debug for RequestExecutor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Aborts and releases a transfer on drop unless it was released first.
struct TransferGuard<'a, T: Transport> {
    transport: &'a T,
    id: TransferId,
    armed: bool,
}

impl<T: Transport> TransferGuard<'_, T> {
    /// Release a finished transfer and disarm the guard.
    fn release(mut self) {
        self.armed = false;
        self.transport.release(self.id);
    }
}

impl<T: Transport> Drop for TransferGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!(
                target: "lattice_webrequest::executor",
                "Aborting transfer {}",
                self.id.as_u64()
            );
            self.transport.abort(self.id);
            self.transport.release(self.id);
        }
    }
}

fn report(outcome: &RequestOutcome, on_response: Option<ResponseCallback>) {
    if let Some(on_response) = on_response
        && let Some((status, text)) = outcome.clone().into_report()
    {
        on_response(status, text);
    }
}
