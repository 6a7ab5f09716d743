//! MCP over HTTP + Server-Sent Events
//!
//! The server pushes JSON-RPC replies over a long-lived `GET /sse` stream and
//! accepts requests as HTTP POSTs to a per-session endpoint it announces as the
//! first event on that stream.

pub mod session;
pub mod stream;

pub use session::{SessionOptions, SseSession, post_json, read_session_endpoint};
pub use stream::{ChannelLines, LineSource, ReaderLines, SseEventReader};

use serde_json::Value;
use url::Url;

use crate::Result;
use crate::mcp::{JsonRpcNotification, JsonRpcRequest};

/// Something observed while running the handshake, in the order it happened
#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeEvent {
    SessionOpened(Url),
    Response { title: &'static str, body: Value },
    NotificationSent(&'static str),
}

/// Run the fixed probe sequence: initialize, initialized, tools/list, prompts/list.
///
/// Every step is attempted once and the first failure aborts the run.
/// `on_event` sees each event as soon as it happens; the full list is returned
/// on success.
///
/// Replies are not matched to requests by id. Each request is followed by
/// exactly one read from the stream, so the sequence relies on the server
/// answering in the order requests were sent.
#[inline]
pub fn run_handshake<F>(options: &SessionOptions, mut on_event: F) -> Result<Vec<HandshakeEvent>>
where
    F: FnMut(&HandshakeEvent),
{
    let mut events = Vec::new();
    let mut emit = |event: HandshakeEvent| {
        on_event(&event);
        events.push(event);
    };

    let mut session = SseSession::connect(options)?;
    emit(HandshakeEvent::SessionOpened(session.endpoint().clone()));

    let ack = session.post(&JsonRpcRequest::initialize(0))?;
    emit(HandshakeEvent::Response {
        title: "Initialize response (HTTP acknowledgement)",
        body: ack,
    });
    let reply = session.next_message()?;
    emit(HandshakeEvent::Response {
        title: "Initialize result (SSE)",
        body: reply,
    });

    session.post(&JsonRpcNotification::initialized())?;
    emit(HandshakeEvent::NotificationSent("initialized"));

    let queries = [
        (
            JsonRpcRequest::list_tools(1),
            "Tools list (HTTP acknowledgement)",
            "Tools list (SSE)",
        ),
        (
            JsonRpcRequest::list_prompts(2),
            "Prompts list (HTTP acknowledgement)",
            "Prompts list (SSE)",
        ),
    ];
    for (request, ack_title, reply_title) in queries {
        let ack = session.post(&request)?;
        emit(HandshakeEvent::Response {
            title: ack_title,
            body: ack,
        });
        let reply = session.next_message()?;
        emit(HandshakeEvent::Response {
            title: reply_title,
            body: reply,
        });
    }

    session.close();
    Ok(events)
}
