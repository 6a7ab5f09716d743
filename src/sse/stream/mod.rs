
use std::io::{self, BufRead, BufReader, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::mcp::parse_or_raw;
use crate::{ProbeError, Result};

/// Event type whose frames carry JSON-RPC payloads
pub const MESSAGE_EVENT: &str = "message";

/// A source of decoded text lines from an event stream
pub trait LineSource {
    /// Next line with its terminator stripped, or `None` once the stream has ended.
    fn next_line(&mut self, timeout: Duration) -> Result<Option<String>>;
}

/// Lines read straight from a buffered reader.
///
/// The timeout is left to the underlying transport.
#[derive(Debug)]
pub struct ReaderLines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> ReaderLines<R> {
    #[inline]
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }
}

impl<R: BufRead> LineSource for ReaderLines<R> {
    #[inline]
    fn next_line(&mut self, _timeout: Duration) -> Result<Option<String>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        Ok(Some(decode_line(&self.buf)))
    }
}

/// Lines pumped off a live response body by a background thread.
///
/// Each [`LineSource::next_line`] call waits at most `timeout` for the next
/// line, the same guarantee a socket read timeout gives.
#[derive(Debug)]
pub struct ChannelLines {
    lines: Receiver<io::Result<String>>,
}

impl ChannelLines {
    /// Start pumping lines from `reader`.
    ///
    /// The pump stops at end of stream, on a read error, or on the first line
    /// produced after this value has been dropped. Dropping never waits for it,
    /// so `reader` can outlive this value while its read is blocked.
    #[inline]
    pub fn spawn<R>(reader: R) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (sender, lines) = mpsc::channel();
        thread::Builder::new()
            .name("sse-pump".to_string())
            .spawn(move || pump_lines(reader, &sender))?;
        Ok(Self { lines })
    }
}

impl LineSource for ChannelLines {
    #[inline]
    fn next_line(&mut self, timeout: Duration) -> Result<Option<String>> {
        match self.lines.recv_timeout(timeout) {
            Ok(Ok(line)) => Ok(Some(line)),
            Ok(Err(e)) => Err(e.into()),
            Err(RecvTimeoutError::Timeout) => Err(ProbeError::Timeout {
                operation: "SSE stream data",
                timeout,
            }),
            Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }
}

fn pump_lines<R: Read>(reader: R, sender: &Sender<io::Result<String>>) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                if sender.send(Ok(decode_line(&buf))).is_err() {
                    break;
                }
            }
            Err(e) => {
                // The receiver may already be gone; nothing left to report to.
                let _ = sender.send(Err(e));
                break;
            }
        }
    }
    debug!("SSE line pump finished");
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

/// Reads `message` events off an SSE stream, one frame per call.
///
/// There is no queue of parsed frames: every call consumes lines until it can
/// return exactly one message, so it must only be called once per expected
/// reply or it will block until the timeout or end of stream.
#[derive(Debug)]
pub struct SseEventReader<S> {
    source: S,
}

impl<S: LineSource> SseEventReader<S> {
    #[inline]
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Block until the next `message` frame and return its JSON payload.
    ///
    /// A payload that is not valid JSON comes back as `{"raw": <payload>}`.
    /// Frames of any other event type are skipped.
    #[inline]
    pub fn next_message(&mut self, timeout: Duration) -> Result<Value> {
        let mut event_type: Option<String> = None;
        let mut data_lines: Vec<String> = Vec::new();

        loop {
            let Some(line) = self.source.next_line(timeout)? else {
                return Err(ProbeError::StreamClosed);
            };

            if let Some(value) = line.strip_prefix("event:") {
                event_type = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("data:") {
                data_lines.push(value.trim().to_string());
            } else if line.is_empty() && !data_lines.is_empty() {
                let payload = data_lines.join("\n");
                data_lines.clear();
                let event = event_type.take();

                if event.as_deref() == Some(MESSAGE_EVENT) && !payload.is_empty() {
                    return Ok(parse_or_raw(&payload));
                }
                debug!(event = ?event, "Skipping SSE frame");
            } else if line.is_empty() {
                event_type = None;
            }
        }
    }
}
