
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, info, warn};

use crate::{ProbeError, Result};

/// How waiting for the readiness marker ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    StreamEnded,
    TimedOut,
}

/// How the server process went away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    Exited,
    Killed,
}

/// A spawned MCP server speaking newline-delimited JSON-RPC over its pipes.
///
/// The child is killed when this value is dropped, so every early return
/// cleans up the process.
#[derive(Debug)]
pub struct ServerProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    line_buf: Vec<u8>,
    stderr: Arc<Mutex<Vec<u8>>>,
    stderr_task: JoinHandle<()>,
}

impl ServerProcess {
    /// Spawn `command` with all three standard streams piped.
    ///
    /// Standard error is drained in the background from the start so a chatty
    /// server can never block on a full pipe.
    #[inline]
    pub fn spawn(command: &str, args: &[String]) -> Result<Self> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProbeError::Process(format!("Failed to start `{}`: {}", command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProbeError::Process("Child stdin was not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProbeError::Process("Child stdout was not captured".to_string()))?;
        let stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| ProbeError::Process("Child stderr was not captured".to_string()))?;

        let stderr = Arc::new(Mutex::new(Vec::new()));
        let stderr_task = tokio::spawn(drain_stderr(stderr_pipe, Arc::clone(&stderr)));

        info!("Started MCP server `{}` (pid {:?})", command, child.id());

        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            line_buf: Vec::new(),
            stderr,
            stderr_task,
        })
    }

    /// Read and discard startup output until a line contains `marker`.
    ///
    /// Every discarded line is handed to `on_line`. Running out of output or
    /// time is reported rather than treated as an error.
    #[inline]
    pub async fn wait_until_ready<F>(
        &mut self,
        marker: &str,
        limit: Duration,
        mut on_line: F,
    ) -> Result<Readiness>
    where
        F: FnMut(&str),
    {
        let deadline = Instant::now() + limit;
        loop {
            let Ok(line) = timeout_at(deadline, self.next_line()).await else {
                return Ok(Readiness::TimedOut);
            };
            let Some(line) = line? else {
                return Ok(Readiness::StreamEnded);
            };

            on_line(&line);
            if line.contains(marker) {
                debug!("Readiness marker seen: {}", line.trim());
                return Ok(Readiness::Ready);
            }
        }
    }

    /// Write one message as a single JSON line and flush it.
    ///
    /// Returns the line that was written, without its terminator.
    #[inline]
    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<String> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ProbeError::Process("Server stdin is already closed".to_string()))?;

        let line = serde_json::to_string(message)?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(line)
    }

    /// Collect every stdout line that arrives within `window`.
    ///
    /// Lines are returned exactly as received, each newline-terminated.
    /// Collection ends early if the server closes its stdout.
    #[inline]
    pub async fn collect_for<F>(&mut self, window: Duration, mut on_line: F) -> Result<String>
    where
        F: FnMut(&str),
    {
        let deadline = Instant::now() + window;
        let mut output = String::new();

        while let Ok(line) = timeout_at(deadline, self.next_line()).await {
            let Some(line) = line? else {
                debug!("Server closed stdout during collection");
                break;
            };
            on_line(&line);
            output.push_str(&line);
            output.push('\n');
        }

        Ok(output)
    }

    /// Stop the server and return everything it wrote to standard error.
    ///
    /// Stdin is closed and the server is sent SIGTERM; after `grace` it is killed.
    #[inline]
    pub async fn shutdown(mut self, grace: Duration) -> Result<(Shutdown, String)> {
        drop(self.stdin.take());
        request_termination(&self.child);

        let outcome = match timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!("Server exited with {}", status);
                Shutdown::Exited
            }
            Ok(Err(e)) => {
                warn!("Failed to wait for server exit: {}", e);
                Shutdown::Exited
            }
            Err(_) => {
                warn!("Server did not exit within {:?}, killing it", grace);
                if let Err(e) = self.child.kill().await {
                    warn!("Failed to kill server: {}", e);
                }
                Shutdown::Killed
            }
        };

        // Grandchildren can hold the pipe open after the server itself is gone.
        if timeout(grace, &mut self.stderr_task).await.is_err() {
            warn!("Standard error still open after shutdown, keeping what was captured");
            self.stderr_task.abort();
        }

        let stderr = self.stderr.lock().await;
        Ok((outcome, String::from_utf8_lossy(&stderr).into_owned()))
    }
}

impl ServerProcess {
    /// Next stdout line with its terminator stripped, decoded lossily.
    ///
    /// Cancel safe: bytes of a partial line stay in `line_buf` until the rest arrives.
    async fn next_line(&mut self) -> Result<Option<String>> {
        let read = self.stdout.read_until(b'\n', &mut self.line_buf).await?;
        if read == 0 && self.line_buf.is_empty() {
            return Ok(None);
        }

        let line = String::from_utf8_lossy(&self.line_buf)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        self.line_buf.clear();
        Ok(Some(line))
    }
}

fn request_termination(child: &Child) {
    #[cfg(unix)]
    {
        let Some(pid) = child.id().and_then(|id| libc::pid_t::try_from(id).ok()) else {
            return;
        };
        // SAFETY: kill(2) takes plain integers and touches no memory; `pid` is our
        // own child, which has not been reaped yet.
        if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
            debug!(
                "Failed to send SIGTERM to server: {}",
                std::io::Error::last_os_error()
            );
        }
    }
    #[cfg(windows)]
    {
        debug!("No graceful termination signal for pid {:?}", child.id());
    }
}

async fn drain_stderr(mut pipe: ChildStderr, sink: Arc<Mutex<Vec<u8>>>) {
    let mut chunk = [0_u8; 4096];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => sink.lock().await.extend_from_slice(&chunk[..n]),
            Err(e) => {
                warn!("Failed to read server stderr: {}", e);
                break;
            }
        }
    }
}
