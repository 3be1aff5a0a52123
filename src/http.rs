use reqwest::{
    header::{HeaderMap, CONTENT_TYPE},
    Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    errors::{APIError, Error, Result},
    RUN_ID_HEADER,
};

/// Outgoing request handed to a [`Transport`](crate::Transport).
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Body as UTF-8, for assertions and logging.
    pub fn body_text(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Fully-read response returned by a [`Transport`](crate::Transport).
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Response with `content-type: application/json` and a serialized body.
    pub fn json(status: StatusCode, body: &Value) -> Self {
        let mut resp = Self::new(status, body.to_string());
        resp.headers.insert(
            CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        resp
    }
}

/// Result of a run: parsed JSON when the server labelled the body as JSON,
/// the raw text otherwise.
#[derive(Clone, Debug, PartialEq)]
pub enum RunOutput {
    Json(Value),
    Text(String),
}

impl RunOutput {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            RunOutput::Json(value) => Some(value),
            RunOutput::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RunOutput::Text(text) => Some(text),
            RunOutput::Json(_) => None,
        }
    }

    /// Deserialize into a caller type. Text output is treated as a JSON string.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T> {
        let value = match self {
            RunOutput::Json(value) => value,
            RunOutput::Text(text) => Value::String(text),
        };
        serde_json::from_value(value).map_err(Error::Serialization)
    }

    fn message(&self) -> Option<&str> {
        self.as_json()
            .and_then(|v| v.get("message"))
            .and_then(|v| v.as_str())
    }
}

pub(crate) fn is_json_content(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("application/json"))
        .unwrap_or(false)
}

/// Parse as JSON only when the content type says so and there is something to
/// parse; every other body is handed back untouched.
pub(crate) fn decode_body(headers: &HeaderMap, body: String) -> Result<RunOutput> {
    if is_json_content(headers) && !body.is_empty() {
        let value = serde_json::from_str(&body).map_err(Error::Serialization)?;
        return Ok(RunOutput::Json(value));
    }
    Ok(RunOutput::Text(body))
}

pub(crate) fn run_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(RUN_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

pub(crate) fn api_error(status: StatusCode, headers: &HeaderMap, data: RunOutput) -> APIError {
    let message = data
        .message()
        .map(|m| m.to_string())
        .unwrap_or_else(|| format!("Meld API request failed with status {}", status.as_u16()));
    APIError::new(status.as_u16(), message)
        .with_run_id(run_id_from_headers(headers))
        .with_data(data)
}
