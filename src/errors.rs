use std::fmt;

use thiserror::Error;

use crate::http::RunOutput;

/// Status reported for calls that exceed their timeout.
pub const TIMEOUT_STATUS: u16 = 408;

/// Message reported for calls that exceed their timeout.
pub const TIMEOUT_MESSAGE: &str = "Request timed out";

/// Structured validation error raised before a request is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
    pub field: Option<String>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(field) = &self.field {
            write!(f, "{}: {}", field, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

/// Non-2xx response returned by the Meld API.
#[derive(Debug, Clone, PartialEq)]
pub struct APIError {
    pub status: u16,
    pub message: String,
    /// Value of the `X-Run-Id` response header, when present.
    pub run_id: Option<String>,
    /// Decoded response body (JSON when the server said so, raw text otherwise).
    pub data: Option<RunOutput>,
}

impl APIError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            run_id: None,
            data: None,
        }
    }

    pub fn with_run_id(mut self, run_id: Option<String>) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn with_data(mut self, data: RunOutput) -> Self {
        self.data = Some(data);
        self
    }
}

impl fmt::Display for APIError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(run_id) = &self.run_id {
            write!(
                f,
                "Meld API error (status {}, run {}): {}",
                self.status, run_id, self.message
            )
        } else {
            write!(
                f,
                "Meld API error (status {}): {}",
                self.status, self.message
            )
        }
    }
}

impl std::error::Error for APIError {}

/// Convenience alias for fallible SDK results.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Transport-level error (timeouts, DNS/TLS/connectivity).
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// The fixed error every timed-out call resolves to.
    pub fn timeout() -> Self {
        Self::new(TransportErrorKind::Timeout, TIMEOUT_MESSAGE)
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// HTTP-equivalent status; only timeouts carry one.
    pub fn status(&self) -> Option<u16> {
        match self.kind {
            TransportErrorKind::Timeout => Some(TIMEOUT_STATUS),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_request() || err.is_builder() {
            TransportErrorKind::Request
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, err.to_string()).with_source(err)
    }
}

/// Broad transport error kinds for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Request,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Request => "request",
            TransportErrorKind::Other => "transport",
        };
        write!(f, "{label}")
    }
}

/// Unified error type surfaced by the SDK.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Api(#[from] APIError),

    #[error("{0}")]
    Transport(#[from] TransportError),
}

impl Error {
    /// HTTP status associated with the failure: the response status for API
    /// errors, 408 for timeouts, `None` otherwise.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api(err) => Some(err.status),
            Error::Transport(err) => err.status(),
            _ => None,
        }
    }

    /// Run id reported by the server, when the failure came from a response.
    pub fn run_id(&self) -> Option<&str> {
        match self {
            Error::Api(err) => err.run_id.as_deref(),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Transport(err) if err.kind == TransportErrorKind::Timeout)
    }
}
