//! Fire-and-forget request execution.
//!
//! [`WebRequestClient`] runs each request as its own task so callers can issue
//! many requests concurrently and keep only a [`RequestHandle`] to cancel or
//! await them. Callbacks from independent requests may interleave.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::{ExecutorConfig, RequestCatalog};
use crate::descriptor::RequestDescriptor;
use crate::error::Result;
use crate::executor::RequestExecutor;
use crate::form::FormData;
use crate::response::{RequestCallbacks, RequestOutcome};
use crate::transport::{ReqwestTransport, Transport};

/// Unique identifier for a request sent through a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    fn next() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// A handle to a request running in the background.
#[derive(Clone, Debug)]
pub struct RequestHandle {
    /// The unique ID of this request.
    pub id: RequestId,
    pending: Arc<Mutex<Option<CancellationToken>>>,
    outcome: watch::Receiver<Option<RequestOutcome>>,
}

impl RequestHandle {
    /// Cancel the request.
    ///
    /// Returns `true` if the request was still pending, `false` if it has
    /// already completed or was already cancelled.
    pub fn cancel(&self) -> bool {
        if let Some(token) = self.pending.lock().take() {
            token.cancel();
            true
        } else {
            false
        }
    }

    /// Check if the request is still pending.
    pub fn is_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Wait for the request to finish.
    ///
    /// Returns `None` only if the task running the request was dropped
    /// before it produced an outcome.
    pub async fn outcome(&self) -> Option<RequestOutcome> {
        let mut outcome = self.outcome.clone();
        let value = outcome.wait_for(Option::is_some).await.ok()?;
        (*value).clone()
    }
}

/// Runs requests as background tasks.
///
/// # Example
///
/// ```ignore
/// use lattice_webrequest::{RequestCallbacks, RequestDescriptor, WebRequestClient};
///
/// let client = WebRequestClient::new()?;
/// let handle = client.send(
///     RequestDescriptor::get("https://api.example.com/rank"),
///     None,
///     RequestCallbacks::new()
///         .on_progress(|fraction| println!("{:.0}%", fraction * 100.0))
///         .on_response(|status, text| println!("{status}: {text}")),
/// );
/// let outcome = handle.outcome().await;
/// ```
pub struct WebRequestClient<T: Transport = ReqwestTransport> {
    executor: Arc<RequestExecutor<T>>,
}

impl WebRequestClient<ReqwestTransport> {
    /// Create a client backed by a default [`ReqwestTransport`].
    pub fn new() -> Result<Self> {
        Ok(Self::with_transport(ReqwestTransport::new()?))
    }
}

impl<T: Transport> WebRequestClient<T> {
    /// Create a client over the given transport with the default configuration.
    pub fn with_transport(transport: T) -> Self {
        Self::from_executor(RequestExecutor::new(transport))
    }

    /// Create a client over the given transport and configuration.
    pub fn with_config(transport: T, config: ExecutorConfig) -> Self {
        Self::from_executor(RequestExecutor::with_config(transport, config))
    }

    /// Create a client from an existing executor.
    pub fn from_executor(executor: RequestExecutor<T>) -> Self {
        Self {
            executor: Arc::new(executor),
        }
    }

    /// Get a reference to the underlying executor.
    pub fn executor(&self) -> &RequestExecutor<T> {
        &self.executor
    }

    /// Start a request in the background.
    ///
    /// The request runs on the current tokio runtime, or on the shared
    /// [`runtime`] when called from outside one.
    pub fn send(
        &self,
        descriptor: RequestDescriptor,
        form: Option<FormData>,
        callbacks: RequestCallbacks,
    ) -> RequestHandle {
        let id = RequestId::next();
        let token = CancellationToken::new();
        let pending = Arc::new(Mutex::new(Some(token.clone())));
        let (outcome_tx, outcome_rx) = watch::channel(None);

        let executor = Arc::clone(&self.executor);
        let task_pending = Arc::clone(&pending);
        let task = async move {
            let outcome = executor
                .execute_with_cancel(&descriptor, form.as_ref(), callbacks, &token)
                .await;

            // Mark handle as completed
            task_pending.lock().take();

            tracing::debug!(
                target: "lattice_webrequest::client",
                "Request {} finished: {:?}",
                id.as_u64(),
                outcome
            );
            outcome_tx.send_replace(Some(outcome));
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(task);
            }
            Err(_) => {
                runtime::spawn(task);
            }
        }

        RequestHandle {
            id,
            pending,
            outcome: outcome_rx,
        }
    }

    /// Start the request registered under `name` in `catalog`.
    pub fn send_named(
        &self,
        catalog: &RequestCatalog,
        name: &str,
        form: Option<FormData>,
        callbacks: RequestCallbacks,
    ) -> Result<RequestHandle> {
        let descriptor = catalog.get(name)?.clone();
        Ok(self.send(descriptor, form, callbacks))
    }
}

impl<T: Transport> Clone for WebRequestClient<T> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
        }
    }
}

impl<T: Transport> std::fmt::Debug for WebRequestClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebRequestClient")
            .field("executor", &self.executor)
            .finish()
    }
}

/// Runtime management for requests started outside an async context.
pub mod runtime {
    use std::sync::OnceLock;
    use tokio::runtime::Runtime;

    static RUNTIME: OnceLock<Runtime> = OnceLock::new();

    /// Initialize the shared runtime.
    ///
    /// If not called explicitly, the runtime is created on first use.
    pub fn init() -> &'static Runtime {
        RUNTIME.get_or_init(|| {
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .thread_name("lattice-webrequest")
                .enable_all()
                .build()
                .expect("Failed to create tokio runtime")
        })
    }

    /// Get a reference to the shared runtime.
    pub fn get() -> &'static Runtime {
        init()
    }

    /// Block on a future using the shared runtime.
    ///
    /// # Warning
    ///
    /// Do not call this from within an async context, as it will block the
    /// current thread.
    pub fn block_on<F: std::future::Future>(future: F) -> F::Output {
        get().block_on(future)
    }

    /// Spawn a future on the shared runtime.
    pub fn spawn<F>(future: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: std::future::Future + Send + 'static,
        F::Output: Send + 'static,
    {
        get().spawn(future)
    }
}
