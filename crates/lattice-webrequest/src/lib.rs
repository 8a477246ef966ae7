//! Callback-driven web requests for Horizon Lattice.
//!
//! This crate issues GET and POST requests described by a
//! [`RequestDescriptor`], reports transfer progress on every scheduling tick,
//! and can play a timed fake response instead of touching the network for
//! demo or offline builds.
//!
//! # Executing Requests
//!
//! ```ignore
//! use lattice_webrequest::{
//!     FormData, ReqwestTransport, RequestCallbacks, RequestDescriptor, RequestExecutor,
//! };
//!
//! let executor = RequestExecutor::new(ReqwestTransport::new()?);
//!
//! let descriptor = RequestDescriptor::post("https://api.example.com/login")
//!     .header_source(["Accept,application/json"]);
//! let form = FormData::new().field("user", "john");
//!
//! let outcome = executor
//!     .execute(
//!         &descriptor,
//!         Some(&form),
//!         RequestCallbacks::new()
//!             .on_progress(|fraction| println!("upload {fraction:.2}"))
//!             .on_response(|status, text| println!("{status}: {text}")),
//!     )
//!     .await;
//! ```
//!
//! The response callback receives `(status, text)`: the body for a success
//! status, an error description otherwise, and status `0` when no response
//! arrived. [`RequestOutcome`] carries the same result already classified.
//!
//! # Simulated Responses
//!
//! A descriptor with a positive simulated duration never reaches the
//! transport. Progress advances with real elapsed time and the request ends
//! with [`SIMULATED_SUCCESS_CODE`] and an empty body:
//!
//! ```ignore
//! let descriptor = RequestDescriptor::get("https://api.example.com/rank").simulate(2.0);
//! ```
//!
//! # Background Requests
//!
//! [`WebRequestClient`] runs each request as its own task and returns a
//! cancellable [`RequestHandle`]:
//!
//! ```ignore
//! let client = WebRequestClient::new()?;
//! let handle = client.send(descriptor, None, RequestCallbacks::new());
//! handle.cancel();
//! ```
//!
//! # Catalogs
//!
//! Descriptors can be loaded by name from TOML or JSON with [`RequestCatalog`].

mod client;
mod config;
mod descriptor;
mod error;
mod executor;
mod form;
mod frame;
mod response;
pub mod transport;

pub use client::{RequestHandle, RequestId, WebRequestClient, runtime};
pub use config::{ExecutorConfig, RequestCatalog, SIMULATED_SUCCESS_CODE};
pub use descriptor::{Headers, NO_SIMULATION, RequestDescriptor, RequestMethod, parse_header_source};
pub use error::{Result, WebRequestError};
pub use executor::{ProgressSink, RequestExecutor};
pub use form::{FORM_CONTENT_TYPE, FormData};
pub use frame::{DEFAULT_FRAME_INTERVAL, FrameClock};
pub use response::{
    ProgressCallback, RequestCallbacks, RequestOutcome, ResponseCallback, ResponseCode,
};

// Re-export commonly used types at the crate root
pub use transport::{
    ReqwestTransport, ReqwestTransportBuilder, TransferDirection, TransferId, TransferSnapshot,
    Transport, TransportConfig,
};
pub use tokio_util::sync::CancellationToken;
