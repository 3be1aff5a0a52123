//! Rust SDK for the Meld workflow API.
//!
//! ```no_run
//! use meldai::{Client, Config, EnsureAndRunRequest, Mode};
//! use serde_json::json;
//!
//! # async fn run() -> meldai::Result<()> {
//! let client = Client::new(Config::default().with_api_key("meld_sk_..."))?;
//! let output = client
//!     .melds()
//!     .ensure_and_run_webhook(
//!         EnsureAndRunRequest::new(
//!             "translate-to-french",
//!             json!({ "text": "Hello world" }),
//!             json!({ "translation": "" }),
//!         )
//!         .with_template(json!({ "instructions": "Convert text to formal French." }))
//!         .with_mode(Mode::Sync),
//!     )
//!     .await?;
//! println!("{output:?}");
//! # Ok(())
//! # }
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::result_large_err)]

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://sdk-api.meld.ai";

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "MELD_API_KEY";

/// Default value of the client-identifying header.
pub(crate) const DEFAULT_CLIENT_HEADER: &str = concat!("meldai-rust/", env!("CARGO_PKG_VERSION"));

/// Default connection timeout (5 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Default request timeout (60 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(60_000);

/// HTTP header identifying the SDK to the server.
pub const CLIENT_HEADER: &str = "X-Meld-Client";

/// HTTP response header carrying the server's run id.
pub const RUN_ID_HEADER: &str = "X-Run-Id";

mod client;
mod config;
mod errors;
mod http;
mod melds;
#[cfg(feature = "mock")]
mod mock;
mod shape;
mod telemetry;
mod transport;

pub use client::Client;
pub use config::{Config, ResolvedConfig};
pub use errors::{
    APIError, Error, Result, TransportError, TransportErrorKind, ValidationError, TIMEOUT_MESSAGE,
    TIMEOUT_STATUS,
};
pub use http::{HttpRequest, HttpResponse, RunOutput};
pub use melds::{run_endpoint, EnsureAndRunRequest, MeldsClient, Mode};
#[cfg(feature = "mock")]
#[cfg_attr(docsrs, doc(cfg(feature = "mock")))]
pub use mock::MockTransport;
pub use shape::{ResponseShape, RESPONSE_SCHEMA_NAME};
pub use telemetry::{HttpRequestMetrics, MetricsCallbacks, RequestContext};
pub use transport::{BoxFuture, ReqwestTransport, Transport};
