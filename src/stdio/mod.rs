//! MCP over a child process's standard streams
//!
//! The server is launched as a subprocess and exchanges newline-delimited
//! JSON-RPC messages over its stdin and stdout.

pub mod exchange;
pub mod process;

pub use exchange::{ExchangeRecord, parse_json_lines};
pub use process::{Readiness, ServerProcess, Shutdown};

use std::time::Duration;

use tracing::warn;

use crate::Result;
use crate::mcp::JsonRpcRequest;

/// Sample sequence diagram sent to the diagram tool when no input file is given
pub const DEFAULT_UML_INPUT: &str = "
@startuml
actor User
User -> System : Request
System --> User : Response
@enduml
";

/// Everything needed to drive one stdio exchange
#[derive(Debug, Clone, PartialEq)]
pub struct StdioOptions {
    pub command: String,
    pub args: Vec<String>,
    pub ready_marker: String,
    pub startup_timeout: Duration,
    pub settle_delay: Duration,
    pub collect_window: Duration,
    pub shutdown_grace: Duration,
    pub tool_name: String,
    pub tool_argument: String,
    pub uml_input: String,
}

/// Progress of a stdio exchange, reported as it happens
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeEvent {
    Started(String),
    StartupLine(String),
    Readiness(Readiness),
    Sent(String),
    Received(String),
    Stopped(Shutdown),
}

/// Launch the server, send initialize, tools/list and one tools/call, then
/// capture whatever it prints during the collection window.
///
/// Responses are kept in arrival order and are not matched to request ids.
#[inline]
pub async fn run_exchange<F>(options: &StdioOptions, mut on_event: F) -> Result<ExchangeRecord>
where
    F: FnMut(&ExchangeEvent) + Send,
{
    let mut process = ServerProcess::spawn(&options.command, &options.args)?;
    on_event(&ExchangeEvent::Started(
        std::iter::once(options.command.as_str())
            .chain(options.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" "),
    ));

    let readiness = process
        .wait_until_ready(&options.ready_marker, options.startup_timeout, |line| {
            on_event(&ExchangeEvent::StartupLine(line.to_string()));
        })
        .await?;
    if readiness != Readiness::Ready {
        warn!(
            "Readiness marker {:?} not seen ({:?}), continuing anyway",
            options.ready_marker, readiness
        );
    }
    on_event(&ExchangeEvent::Readiness(readiness));
    tokio::time::sleep(options.settle_delay).await;

    for request in [
        JsonRpcRequest::initialize(1),
        JsonRpcRequest::list_tools(2),
    ] {
        let line = process.send(&request).await?;
        on_event(&ExchangeEvent::Sent(line));
    }
    tokio::time::sleep(options.settle_delay).await;

    let call = JsonRpcRequest::call_tool(
        3,
        &options.tool_name,
        &options.tool_argument,
        &options.uml_input,
    );
    let line = process.send(&call).await?;
    on_event(&ExchangeEvent::Sent(line));

    let stdout_raw = process
        .collect_for(options.collect_window, |line| {
            on_event(&ExchangeEvent::Received(line.to_string()));
        })
        .await?;

    let (outcome, stderr_raw) = process.shutdown(options.shutdown_grace).await?;
    on_event(&ExchangeEvent::Stopped(outcome));

    Ok(ExchangeRecord::new(
        options.uml_input.clone(),
        stdout_raw,
        stderr_raw,
    ))
}
