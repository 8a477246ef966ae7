//! Transport backed by `reqwest`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use reqwest::redirect::Policy;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::{Transport, TransferId, TransferProgress, TransferSnapshot, unknown_transfer};
use crate::client::runtime;
use crate::descriptor::Headers;
use crate::error::{Result, WebRequestError};
use crate::form::FormData;
use crate::response::ResponseCode;

/// Default size of the pieces a request body is streamed in.
const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 16 * 1024;

/// Configuration for the reqwest transport.
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Request timeout.
    pub timeout: Option<Duration>,
    /// Connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Whether to follow redirects.
    pub follow_redirects: bool,
    /// Maximum number of redirects to follow.
    pub max_redirects: usize,
    /// Whether to enable cookie storage.
    pub cookies_enabled: bool,
    /// Default user agent.
    pub user_agent: Option<String>,
    /// Proxy URL.
    pub proxy: Option<String>,
    /// Size of the chunks request bodies are streamed in; upload progress
    /// advances once per chunk.
    pub upload_chunk_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            connect_timeout: Some(Duration::from_secs(10)),
            follow_redirects: true,
            max_redirects: 10,
            cookies_enabled: true,
            user_agent: Some(format!(
                "LatticeWebRequest/{} (Rust)",
                env!("CARGO_PKG_VERSION")
            )),
            proxy: None,
            upload_chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
        }
    }
}

/// Builder for creating a reqwest transport with custom configuration.
pub struct ReqwestTransportBuilder {
    config: TransportConfig,
    default_headers: http::HeaderMap,
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestTransportBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: TransportConfig::default(),
            default_headers: http::HeaderMap::new(),
        }
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Disable request timeout.
    pub fn no_timeout(mut self) -> Self {
        self.config.timeout = None;
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// Disable redirect following.
    pub fn no_redirects(mut self) -> Self {
        self.config.follow_redirects = false;
        self
    }

    /// Set the maximum number of redirects to follow.
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.max_redirects = max;
        self
    }

    /// Disable cookie storage.
    pub fn no_cookies(mut self) -> Self {
        self.config.cookies_enabled = false;
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    /// Set a proxy URL.
    pub fn proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.config.proxy = Some(proxy_url.into());
        self
    }

    /// Set the upload chunk size. Zero is treated as one byte.
    pub fn upload_chunk_size(mut self, size: usize) -> Self {
        self.config.upload_chunk_size = size.max(1);
        self
    }

    /// Add a default header that will be sent with every request.
    pub fn default_header(
        mut self,
        name: impl TryInto<http::HeaderName>,
        value: impl TryInto<http::HeaderValue>,
    ) -> Result<Self> {
        let name = name
            .try_into()
            .map_err(|_| WebRequestError::InvalidHeader("Invalid header name".to_string()))?;
        let value = value
            .try_into()
            .map_err(|_| WebRequestError::InvalidHeader("Invalid header value".to_string()))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Build the transport.
    pub fn build(self) -> Result<ReqwestTransport> {
        let mut builder = reqwest::Client::builder();

        if let Some(timeout) = self.config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(connect_timeout) = self.config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }

        if self.config.follow_redirects {
            builder = builder.redirect(Policy::limited(self.config.max_redirects));
        } else {
            builder = builder.redirect(Policy::none());
        }

        if self.config.cookies_enabled {
            builder = builder.cookie_store(true);
        }

        if let Some(ref ua) = self.config.user_agent {
            builder = builder.user_agent(ua);
        }

        if let Some(ref proxy_url) = self.config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| WebRequestError::Proxy(e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        builder = builder.default_headers(self.default_headers);

        let client = builder.build()?;

        Ok(ReqwestTransport {
            client,
            config: self.config,
            transfers: Arc::new(Mutex::new(HashMap::new())),
        })
    }
}

/// Live state of one transfer.
struct TransferSlot {
    state: watch::Receiver<TransferSnapshot>,
    cancel: CancellationToken,
}

/// A [`Transport`] that performs real HTTP requests with `reqwest`.
///
/// Each transfer runs as its own task on the current tokio runtime (or the
/// shared runtime from [`runtime`] when called outside one) and publishes its
/// progress through a watch channel that `poll` and `wait` read from.
pub struct ReqwestTransport {
    client: reqwest::Client,
    config: TransportConfig,
    transfers: Arc<Mutex<HashMap<TransferId, TransferSlot>>>,
}

impl ReqwestTransport {
    /// Create a transport with default configuration.
    pub fn new() -> Result<Self> {
        ReqwestTransportBuilder::new().build()
    }

    /// Create a builder for configuring a new transport.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::new()
    }

    /// Get the transport's configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Number of transfers that have not been released yet.
    pub fn active_transfers(&self) -> usize {
        self.transfers.lock().len()
    }

    fn start(
        &self,
        method: reqwest::Method,
        uri: &str,
        headers: Option<&Headers>,
        form: Option<&FormData>,
    ) -> TransferId {
        let id = TransferId::next();
        let (state_tx, state_rx) = watch::channel(TransferSnapshot::default());
        let state_tx = Arc::new(state_tx);
        let cancel = CancellationToken::new();

        self.transfers.lock().insert(
            id,
            TransferSlot {
                state: state_rx,
                cancel: cancel.clone(),
            },
        );

        let request = match self.build_request(method, uri, headers, form, &state_tx) {
            Ok(request) => request,
            Err(err) => {
                tracing::debug!(
                    target: "lattice_webrequest::transport",
                    "Transfer {} rejected before sending: {}",
                    id.as_u64(),
                    err
                );
                state_tx.send_replace(TransferSnapshot::failed(0, err.to_string()));
                return id;
            }
        };

        let task = run_transfer(id, request, state_tx, cancel);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(task);
            }
            Err(_) => {
                runtime::spawn(task);
            }
        }
        id
    }

    fn build_request(
        &self,
        method: reqwest::Method,
        uri: &str,
        headers: Option<&Headers>,
        form: Option<&FormData>,
        state: &Arc<watch::Sender<TransferSnapshot>>,
    ) -> Result<reqwest::RequestBuilder> {
        let url = url::Url::parse(uri)?;
        let mut req_builder = self.client.request(method, url);

        if let Some(headers) = headers {
            for (name, value) in headers {
                let name = http::HeaderName::from_bytes(name.as_bytes())?;
                let value = http::HeaderValue::from_str(value)?;
                req_builder = req_builder.header(name, value);
            }
        }

        if let Some(form) = form {
            let body = form.to_body();
            req_builder = req_builder
                .header(http::header::CONTENT_TYPE, form.content_type())
                .header(http::header::CONTENT_LENGTH, body.len());
            if !body.is_empty() {
                req_builder = req_builder.body(upload_body(
                    body,
                    self.config.upload_chunk_size,
                    state.clone(),
                ));
            }
        }

        Ok(req_builder)
    }
}

impl Transport for ReqwestTransport {
    fn start_get(&self, uri: &str, headers: Option<&Headers>) -> TransferId {
        self.start(reqwest::Method::GET, uri, headers, None)
    }

    fn start_post(&self, uri: &str, headers: Option<&Headers>, form: &FormData) -> TransferId {
        self.start(reqwest::Method::POST, uri, headers, Some(form))
    }

    fn poll(&self, id: TransferId) -> TransferSnapshot {
        self.transfers
            .lock()
            .get(&id)
            .map(|slot| slot.state.borrow().clone())
            .unwrap_or_else(|| unknown_transfer(id))
    }

    fn wait(&self, id: TransferId) -> BoxFuture<'_, TransferSnapshot> {
        let state = self.transfers.lock().get(&id).map(|slot| slot.state.clone());
        Box::pin(async move {
            let Some(mut state) = state else {
                return unknown_transfer(id);
            };
            let finished = state.wait_for(|snapshot| snapshot.done).await.map(|s| s.clone());
            finished.unwrap_or_else(|_| {
                TransferSnapshot::failed(0, "Transfer ended without a result")
            })
        })
    }

    fn abort(&self, id: TransferId) {
        if let Some(slot) = self.transfers.lock().get(&id) {
            slot.cancel.cancel();
        }
    }

    fn release(&self, id: TransferId) {
        self.transfers.lock().remove(&id);
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("config", &self.config)
            .field("transfers", &self.transfers.lock().len())
            .finish()
    }
}

/// Stream a request body in chunks, advancing upload progress as each chunk
/// is handed to the connection.
fn upload_body(
    body: Bytes,
    chunk_size: usize,
    state: Arc<watch::Sender<TransferSnapshot>>,
) -> reqwest::Body {
    let total = body.len();
    let chunks: Vec<Bytes> = (0..total)
        .step_by(chunk_size.max(1))
        .map(|start| body.slice(start..(start + chunk_size).min(total)))
        .collect();

    let mut progress = TransferProgress {
        bytes_transferred: 0,
        total_bytes: Some(total as u64),
    };
    let stream = futures_util::stream::iter(chunks).map(move |chunk| {
        progress.bytes_transferred += chunk.len() as u64;
        let fraction = progress.fraction().unwrap_or(0.0);
        state.send_modify(|snapshot| snapshot.upload_progress = fraction);
        Ok::<_, std::io::Error>(chunk)
    });
    reqwest::Body::wrap_stream(stream)
}

/// Drive one transfer to completion and publish the final snapshot.
async fn run_transfer(
    id: TransferId,
    request: reqwest::RequestBuilder,
    state: Arc<watch::Sender<TransferSnapshot>>,
    cancel: CancellationToken,
) {
    let result = tokio::select! {
        result = exchange(request, &state) => result,
        _ = cancel.cancelled() => Err(WebRequestError::Cancelled),
    };

    match result {
        Ok(body) => {
            state.send_modify(|snapshot| {
                snapshot.done = true;
                snapshot.upload_progress = 1.0;
                snapshot.download_progress = 1.0;
                snapshot.body = body;
            });
        }
        Err(err) => {
            tracing::debug!(
                target: "lattice_webrequest::transport",
                "Transfer {} failed: {}",
                id.as_u64(),
                err
            );
            state.send_modify(|snapshot| {
                snapshot.done = true;
                snapshot.error = Some(err.to_string());
            });
        }
    }
}

/// Send the request and read the response body, publishing progress.
async fn exchange(
    request: reqwest::RequestBuilder,
    state: &watch::Sender<TransferSnapshot>,
) -> Result<String> {
    let mut response = request.send().await?;
    let status = ResponseCode::from(response.status().as_u16());

    let mut progress = TransferProgress {
        bytes_transferred: 0,
        total_bytes: response.content_length(),
    };
    state.send_modify(|snapshot| {
        snapshot.status = status;
        snapshot.upload_progress = 1.0;
    });

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        body.extend_from_slice(&chunk);
        progress.bytes_transferred += chunk.len() as u64;
        let fraction = progress.fraction().unwrap_or(0.0);
        state.send_modify(|snapshot| snapshot.download_progress = fraction);
    }

    Ok(String::from_utf8_lossy(&body).into_owned())
}
