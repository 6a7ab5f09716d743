use anyhow::{Context, Result};
use console::style;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::ProbeError;
use crate::sse::{HandshakeEvent, SessionOptions, run_handshake};
use crate::stdio::{ExchangeEvent, Readiness, StdioOptions, run_exchange};

/// Run the SSE handshake against `options.base_url` and print every reply
///
/// Blocking; call it from a blocking thread when inside an async runtime.
#[inline]
pub fn sse_probe(options: &SessionOptions) -> Result<()> {
    if options.api_key.as_deref().is_none_or(str::is_empty) {
        return Err(ProbeError::MissingApiKey.into());
    }

    println!("Connecting to {} …", options.base_url);

    run_handshake(options, |event| match event {
        HandshakeEvent::SessionOpened(endpoint) => {
            println!("Session messages endpoint: {}", endpoint);
        }
        HandshakeEvent::Response { title, body } => {
            println!("{}", render_section(title, body));
        }
        HandshakeEvent::NotificationSent(method) => {
            info!("Notification `{}` sent", method);
            println!("Sent initialized notification.");
        }
    })?;

    println!("\nMCP handshake and queries completed successfully.");
    Ok(())
}

/// Drive one stdio exchange, echo the traffic and save the record to `output`
#[inline]
pub async fn stdio_probe(options: &StdioOptions, output: &Path) -> Result<()> {
    let record = run_exchange(options, |event| match event {
        ExchangeEvent::Started(command) => println!("🚀 Starting MCP server: {}", command),
        ExchangeEvent::StartupLine(line) => println!("{}", line.trim()),
        ExchangeEvent::Readiness(Readiness::Ready) => {}
        ExchangeEvent::Readiness(readiness) => {
            warn!("Server did not report readiness: {:?}", readiness);
        }
        ExchangeEvent::Sent(line) => println!("➡️ Sent: {}", line),
        ExchangeEvent::Received(line) => println!("⬅️ Received: {}", line.trim()),
        ExchangeEvent::Stopped(outcome) => info!("Server stopped: {:?}", outcome),
    })
    .await?;

    record
        .write_to(output)
        .with_context(|| format!("Failed to write exchange record: {}", output.display()))?;

    println!("📦 Output saved to {}", absolute_path(output).display());
    Ok(())
}

/// Read the diagram source sent to the server's diagram tool
#[inline]
pub fn read_uml_input(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read diagram input: {}", path.display()))
}

fn render_section(title: &str, body: &Value) -> String {
    let pretty = serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string());
    format!("\n=== {} ===\n{}", style(title).bold().cyan(), pretty)
}

fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn section_has_title_and_indented_json() {
        let rendered = render_section("Tools list (SSE)", &json!({"id": 1, "result": {}}));
        let plain = console::strip_ansi_codes(&rendered);

        assert!(plain.starts_with("\n=== Tools list (SSE) ===\n"));
        assert!(plain.contains("  \"id\": 1"));
    }

    #[test]
    fn section_keeps_unicode() {
        let rendered = render_section("Echo", &json!({"text": "größe ✓"}));
        assert!(rendered.contains("größe ✓"));
    }

    #[test]
    fn sse_probe_requires_api_key() {
        let options = SessionOptions {
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: None,
            timeout: Duration::from_secs(1),
        };

        let error = sse_probe(&options).expect_err("missing key should fail");
        assert!(matches!(
            error.downcast_ref::<ProbeError>(),
            Some(ProbeError::MissingApiKey)
        ));
    }

    #[test]
    fn reads_uml_input_file() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let path = temp_dir.path().join("diagram.puml");
        std::fs::write(&path, "@startuml\nA -> B\n@enduml\n").expect("should write input");

        let input = read_uml_input(&path).expect("should read input successfully");
        assert_eq!(input, "@startuml\nA -> B\n@enduml\n");

        let missing = read_uml_input(&temp_dir.path().join("missing.puml"));
        assert!(missing.is_err());
    }

    #[test]
    fn absolute_path_is_absolute() {
        assert!(absolute_path(Path::new("out.json")).is_absolute());
    }
}
