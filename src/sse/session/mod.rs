
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};
use url::Url;

use super::stream::{ChannelLines, LineSource, SseEventReader};
use crate::mcp::parse_or_raw;
use crate::{ProbeError, Result};

/// Prefix of the line announcing the session's message endpoint
pub const SESSION_EVENT_PREFIX: &str = "data: ";

/// Connection settings for one SSE session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

/// An open SSE stream plus the endpoint its requests are posted to
#[derive(Debug)]
pub struct SseSession {
    agent: ureq::Agent,
    endpoint: Url,
    api_key: String,
    timeout: Duration,
    events: SseEventReader<ChannelLines>,
}

impl SseSession {
    /// Open `<base>/sse` and wait for the server to announce the session endpoint.
    ///
    /// Fails with [`ProbeError::MissingApiKey`] before any network I/O when no
    /// key was supplied.
    #[inline]
    pub fn connect(options: &SessionOptions) -> Result<Self> {
        let api_key = options
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(ProbeError::MissingApiKey)?
            .to_string();

        let base = base_url(&options.base_url)?;
        let stream_url = base.join("sse")?;

        let stream_agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_connect(Some(options.timeout))
            .timeout_recv_response(Some(options.timeout))
            .http_status_as_error(false)
            .build()
            .into();

        info!("Opening SSE stream at {}", stream_url);
        let mut response = stream_agent
            .get(stream_url.as_str())
            .header("Accept", "text/event-stream")
            .header("Authorization", bearer(&api_key))
            .call()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.body_mut().read_to_string().unwrap_or_default();
            return Err(status_error(status, body));
        }

        let mut lines = ChannelLines::spawn(response.into_body().into_reader())?;
        let announced = read_session_endpoint(&mut lines, options.timeout)?;
        // Servers commonly announce a path relative to the base URL.
        let endpoint = base.join(&announced)?;
        debug!("Session endpoint announced as {}", announced);

        Ok(Self {
            agent: post_agent(options.timeout),
            endpoint,
            api_key,
            timeout: options.timeout,
            events: SseEventReader::new(lines),
        })
    }

    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// POST a JSON-RPC message to the session endpoint.
    ///
    /// The returned value is the HTTP acknowledgement, not the RPC result,
    /// which arrives later on the event stream.
    #[inline]
    pub fn post<T: Serialize>(&self, payload: &T) -> Result<Value> {
        post_json(&self.agent, &self.endpoint, payload, Some(&self.api_key))
    }

    /// Wait for the next `message` event on the stream.
    #[inline]
    pub fn next_message(&mut self) -> Result<Value> {
        self.events.next_message(self.timeout)
    }

    /// Release the stream without waiting for the pump thread.
    ///
    /// The thread stays blocked in its read, keeping the HTTP connection open,
    /// until the server sends another line or closes the stream.
    #[inline]
    pub fn close(self) {
        debug!("Closing SSE session for {}", self.endpoint);
        drop(self.events);
    }
}

/// Scan stream lines for the first `data: <endpoint>` line.
#[inline]
pub fn read_session_endpoint<S: LineSource>(source: &mut S, timeout: Duration) -> Result<String> {
    while let Some(line) = source.next_line(timeout)? {
        if let Some(endpoint) = line.trim().strip_prefix(SESSION_EVENT_PREFIX) {
            return Ok(endpoint.trim().to_string());
        }
    }
    Err(ProbeError::MissingSessionEndpoint)
}

/// POST `payload` as JSON and return the parsed response body.
///
/// An empty body yields `{}`, a non-JSON body yields `{"raw": <text>}`, and a
/// non-2xx status becomes [`ProbeError::HttpStatus`].
#[inline]
pub fn post_json<T: Serialize>(
    agent: &ureq::Agent,
    url: &Url,
    payload: &T,
    api_key: Option<&str>,
) -> Result<Value> {
    let body = serde_json::to_string(payload)?;

    let mut request = agent
        .post(url.as_str())
        .header("Content-Type", "application/json");
    if let Some(key) = api_key.filter(|key| !key.is_empty()) {
        request = request.header("Authorization", bearer(key));
    }

    debug!("POST {} ({} bytes)", url, body.len());
    let mut response = request.send(&body)?;
    let status = response.status();
    let text = response.body_mut().read_to_string()?;

    if !status.is_success() {
        return Err(status_error(status, text));
    }

    let text = text.trim();
    if text.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    Ok(parse_or_raw(text))
}

/// Agent for request/response calls, bounded end to end by `timeout`.
#[inline]
pub fn post_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

fn base_url(raw: &str) -> Result<Url> {
    // A trailing slash makes `join` append to the base path instead of replacing it.
    Ok(Url::parse(&format!("{}/", raw.trim_end_matches('/')))?)
}

fn bearer(api_key: &str) -> String {
    format!("Bearer {}", api_key)
}

fn status_error(status: ureq::http::StatusCode, body: String) -> ProbeError {
    ProbeError::HttpStatus {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or_default().to_string(),
        body,
    }
}
