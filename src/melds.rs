//! Meld workflows addressed by name.
//!
//! [`MeldsClient::ensure_and_run_webhook`] creates or updates a meld from an
//! optional template and runs it, either synchronously (result in the
//! response) or asynchronously (result posted to a callback url).

use std::{sync::Arc, time::Duration};

use reqwest::Method;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{
    client::ClientInner,
    errors::{Error, Result, ValidationError},
    http::{HttpRequest, RunOutput},
    shape::ResponseShape,
    telemetry::RequestContext,
};

/// Execution mode for a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// The server runs the meld and returns the result in the response.
    #[default]
    Sync,
    /// The server acknowledges the run and posts the result to the callback url.
    Async,
}

/// Target url for a run.
///
/// Bases naming `localhost` are served without the `/api` prefix.
pub fn run_endpoint(base_url: &str, mode: Mode) -> String {
    let base = base_url.trim_end_matches('/');
    let prefix = if base.contains("localhost") {
        "/v1/meld-run"
    } else {
        "/api/v1/meld-run"
    };
    match mode {
        Mode::Sync => format!("{base}{prefix}/sync"),
        Mode::Async => format!("{base}{prefix}"),
    }
}

/// Parameters for [`MeldsClient::ensure_and_run_webhook`].
#[derive(Clone, Debug)]
pub struct EnsureAndRunRequest {
    /// Stable meld name; created server-side when it does not exist yet.
    pub name: String,
    /// Input payload (JSON object).
    pub input: Value,
    pub response_shape: ResponseShape,
    pub mode: Mode,
    pub instructions: Option<String>,
    /// Declarative template (JSON object) used to create or update the meld.
    pub template: Option<Value>,
    /// Required when `mode` is [`Mode::Async`].
    pub callback_url: Option<String>,
    pub metadata: Option<Value>,
    /// Overrides the client timeout for this call.
    pub timeout: Option<Duration>,
}

impl EnsureAndRunRequest {
    pub fn new(
        name: impl Into<String>,
        input: Value,
        response_shape: impl Into<ResponseShape>,
    ) -> Self {
        Self {
            name: name.into(),
            input,
            response_shape: response_shape.into(),
            mode: Mode::default(),
            instructions: None,
            template: None,
            callback_url: None,
            metadata: None,
            timeout: None,
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_template(mut self, template: Value) -> Self {
        self.template = Some(template);
        self
    }

    pub fn with_callback_url(mut self, callback_url: impl Into<String>) -> Self {
        self.callback_url = Some(callback_url.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::new("is required").with_field("name"));
        }
        if !self.input.is_object() {
            return Err(ValidationError::new("must be a JSON object").with_field("input"));
        }
        if matches!(&self.template, Some(t) if !t.is_object()) {
            return Err(ValidationError::new("must be a JSON object").with_field("template"));
        }
        if matches!(&self.metadata, Some(m) if !m.is_object()) {
            return Err(ValidationError::new("must be a JSON object").with_field("metadata"));
        }
        let has_callback = self
            .callback_url
            .as_ref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false);
        if self.mode == Mode::Async && !has_callback {
            return Err(ValidationError::new("callbackUrl is required for async mode"));
        }
        Ok(())
    }

    fn body(&self) -> Result<RunBody<'_>> {
        Ok(RunBody {
            name: &self.name,
            instructions: self.instructions.as_deref(),
            input: &self.input,
            response_object: self.response_shape.to_wire()?,
            template: self.template.as_ref(),
            callback_url: self.callback_url.as_deref(),
            metadata: self.metadata.as_ref(),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunBody<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
    input: &'a Value,
    response_object: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    template: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a Value>,
}

/// Resource handle returned by [`Client::melds`](crate::Client::melds).
#[derive(Clone)]
pub struct MeldsClient {
    inner: Arc<ClientInner>,
}

impl MeldsClient {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    /// Ensure the named meld exists (applying `template` when given) and run it.
    ///
    /// Invalid requests, then missing credentials, are rejected before any
    /// network call. In async mode the returned output is the server's
    /// acknowledgement, not the run result.
    pub async fn ensure_and_run_webhook(&self, req: EnsureAndRunRequest) -> Result<RunOutput> {
        req.validate()?;
        let headers = self.inner.headers()?;

        let url = run_endpoint(&self.inner.base_url, req.mode);
        let body = serde_json::to_vec(&req.body()?).map_err(Error::Serialization)?;
        let path = url
            .strip_prefix(self.inner.base_url.as_str())
            .unwrap_or(url.as_str())
            .to_string();
        let ctx = RequestContext::new(Method::POST.as_str(), path).with_name(req.name.as_str());

        let request = HttpRequest {
            method: Method::POST,
            url,
            headers,
            body,
        };
        self.inner.execute(request, req.timeout, ctx).await
    }

    /// Like [`ensure_and_run_webhook`](Self::ensure_and_run_webhook), decoding
    /// the output into `T`.
    pub async fn ensure_and_run_webhook_as<T: DeserializeOwned>(
        &self,
        req: EnsureAndRunRequest,
    ) -> Result<T> {
        self.ensure_and_run_webhook(req).await?.into_typed()
    }
}
