//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use lattice_webrequest::{
    FormData, Headers, RequestCallbacks, ResponseCode, TransferId, TransferSnapshot, Transport,
};
use parking_lot::Mutex;

/// Install a test subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// How a scripted transfer behaves.
#[derive(Clone, Debug)]
pub struct Script {
    /// Number of in-flight polls before the transfer reports done.
    pub ticks: usize,
    /// Never finish.
    pub hang: bool,
    /// Snapshot reported once done.
    pub finish: TransferSnapshot,
}

impl Script {
    pub fn respond(status: ResponseCode, body: &str) -> Self {
        Self {
            ticks: 0,
            hang: false,
            finish: TransferSnapshot::completed(status, body),
        }
    }

    pub fn fail(status: ResponseCode, error: &str) -> Self {
        Self {
            ticks: 0,
            hang: false,
            finish: TransferSnapshot::failed(status, error),
        }
    }

    pub fn hang() -> Self {
        Self {
            hang: true,
            ..Self::respond(200, "")
        }
    }

    pub fn after_ticks(mut self, ticks: usize) -> Self {
        self.ticks = ticks;
        self
    }
}

/// A request as the transport saw it.
#[derive(Clone, Debug, PartialEq)]
pub struct StartedRequest {
    pub id: TransferId,
    pub method: &'static str,
    pub uri: String,
    pub headers: Option<Headers>,
    pub body: Option<String>,
}

struct ScriptedTransfer {
    script: Script,
    polls: usize,
}

#[derive(Default)]
struct State {
    default_script: Option<Script>,
    scripts: HashMap<String, Script>,
    transfers: HashMap<TransferId, ScriptedTransfer>,
    started: Vec<StartedRequest>,
    polls: usize,
    waits: usize,
    aborted: Vec<TransferId>,
    released: Vec<TransferId>,
}

/// In-memory transport that plays back scripted responses.
///
/// A transfer scripted with `ticks = N` reports in-flight progress
/// `(k - 1) / N` on its k-th poll and finishes on poll `N + 1`. `wait`
/// resolves immediately unless the script hangs.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<State>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport answering every request with `script`.
    pub fn with_default(script: Script) -> Self {
        let transport = Self::new();
        transport.state.lock().default_script = Some(script);
        transport
    }

    /// Use `script` for requests to `uri`.
    pub fn script(&self, uri: &str, script: Script) {
        self.state.lock().scripts.insert(uri.to_string(), script);
    }

    pub fn started(&self) -> Vec<StartedRequest> {
        self.state.lock().started.clone()
    }

    pub fn polls(&self) -> usize {
        self.state.lock().polls
    }

    pub fn waits(&self) -> usize {
        self.state.lock().waits
    }

    pub fn aborted(&self) -> Vec<TransferId> {
        self.state.lock().aborted.clone()
    }

    pub fn released(&self) -> Vec<TransferId> {
        self.state.lock().released.clone()
    }

    fn start(
        &self,
        method: &'static str,
        uri: &str,
        headers: Option<&Headers>,
        body: Option<String>,
    ) -> TransferId {
        let id = TransferId::next();
        let mut state = self.state.lock();
        let script = state
            .scripts
            .get(uri)
            .or(state.default_script.as_ref())
            .cloned()
            .unwrap_or_else(|| Script::respond(200, ""));
        state
            .transfers
            .insert(id, ScriptedTransfer { script, polls: 0 });
        state.started.push(StartedRequest {
            id,
            method,
            uri: uri.to_string(),
            headers: headers.cloned(),
            body,
        });
        id
    }
}

impl Transport for ScriptedTransport {
    fn start_get(&self, uri: &str, headers: Option<&Headers>) -> TransferId {
        self.start("GET", uri, headers, None)
    }

    fn start_post(&self, uri: &str, headers: Option<&Headers>, form: &FormData) -> TransferId {
        self.start("POST", uri, headers, Some(form.encode()))
    }

    fn poll(&self, id: TransferId) -> TransferSnapshot {
        let mut state = self.state.lock();
        state.polls += 1;
        let Some(transfer) = state.transfers.get_mut(&id) else {
            return TransferSnapshot::failed(0, "unknown transfer");
        };
        transfer.polls += 1;

        if transfer.script.hang {
            TransferSnapshot::default()
        } else if transfer.polls > transfer.script.ticks {
            transfer.script.finish.clone()
        } else {
            let fraction = (transfer.polls - 1) as f32 / transfer.script.ticks as f32;
            TransferSnapshot {
                upload_progress: fraction,
                download_progress: fraction,
                ..TransferSnapshot::default()
            }
        }
    }

    fn wait(&self, id: TransferId) -> BoxFuture<'_, TransferSnapshot> {
        let mut state = self.state.lock();
        state.waits += 1;
        match state.transfers.get(&id) {
            Some(transfer) if transfer.script.hang => future::pending().boxed(),
            Some(transfer) => future::ready(transfer.script.finish.clone()).boxed(),
            None => future::ready(TransferSnapshot::failed(0, "unknown transfer")).boxed(),
        }
    }

    fn abort(&self, id: TransferId) {
        self.state.lock().aborted.push(id);
    }

    fn release(&self, id: TransferId) {
        let mut state = self.state.lock();
        state.transfers.remove(&id);
        state.released.push(id);
    }
}

/// A callback invocation, in the order it happened.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Progress(f32),
    Response(ResponseCode, String),
}

/// Records callback invocations for one request.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callbacks recording both progress and the response.
    pub fn callbacks(&self) -> RequestCallbacks {
        let progress = Arc::clone(&self.events);
        self.response_only()
            .on_progress(move |fraction| progress.lock().push(Event::Progress(fraction)))
    }

    /// Callbacks recording only the response.
    pub fn response_only(&self) -> RequestCallbacks {
        let events = Arc::clone(&self.events);
        RequestCallbacks::new()
            .on_response(move |status, text| events.lock().push(Event::Response(status, text)))
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn progress(&self) -> Vec<f32> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Progress(fraction) => Some(fraction),
                Event::Response(..) => None,
            })
            .collect()
    }

    pub fn responses(&self) -> Vec<(ResponseCode, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Response(status, text) => Some((status, text)),
                Event::Progress(_) => None,
            })
            .collect()
    }
}
