use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mcp_probe::ProbeError;
use mcp_probe::commands::{read_uml_input, sse_probe, stdio_probe};
use mcp_probe::config::{Config, SseOverrides, StdioOverrides, get_config_dir, init_config, show_config};

#[derive(Parser)]
#[command(name = "mcp-probe")]
#[command(about = "Diagnostic probes for MCP servers over SSE and stdio")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml (defaults to ~/.mcp-probe)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP handshake over HTTP + Server-Sent Events
    Sse {
        /// Base URL of the MCP server (env: MCP_BASE_URL)
        #[arg(long)]
        base_url: Option<String>,
        /// Bearer token sent with every request (env: MCP_API_KEY)
        #[arg(long)]
        api_key: Option<String>,
        /// Network and stream read timeout in seconds
        #[arg(long)]
        timeout: Option<f64>,
    },
    /// Spawn an MCP server and record a full stdio exchange
    Stdio {
        /// File the exchange record is written to
        #[arg(long)]
        output: Option<PathBuf>,
        /// Seconds to collect server output after the tool call
        #[arg(long)]
        window: Option<f64>,
        /// Startup line that signals the server is ready
        #[arg(long)]
        ready_marker: Option<String>,
        /// Diagram source to send instead of the built-in sample
        #[arg(long)]
        input: Option<PathBuf>,
        /// Server command and its arguments
        #[arg(last = true)]
        server: Vec<String>,
    },
    /// Show or initialise the configuration file
    Config {
        /// Show current configuration
        #[arg(long, conflicts_with = "init")]
        show: bool,
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };
    let config = Config::load(&config_dir).context("Failed to load configuration")?;

    match cli.command {
        Commands::Sse {
            base_url,
            api_key,
            timeout,
        } => {
            let options = config.sse.resolve(
                SseOverrides {
                    base_url,
                    api_key,
                    timeout_secs: timeout,
                },
                |key| std::env::var(key).ok(),
            )?;

            let result = tokio::task::spawn_blocking(move || sse_probe(&options))
                .await
                .context("SSE probe thread panicked")?;
            if let Err(e) = result {
                if matches!(e.downcast_ref::<ProbeError>(), Some(ProbeError::MissingApiKey)) {
                    eprintln!("Error: {}", ProbeError::MissingApiKey);
                    return Ok(ExitCode::FAILURE);
                }
                return Err(e);
            }
        }
        Commands::Stdio {
            output,
            window,
            ready_marker,
            input,
            server,
        } => {
            let uml_input = input.as_deref().map(read_uml_input).transpose()?;
            let (options, output) = config.stdio.resolve(StdioOverrides {
                server,
                ready_marker,
                collect_window_secs: window,
                output_file: output,
                uml_input,
            })?;

            stdio_probe(&options, &output).await?;
        }
        Commands::Config { show: _, init } => {
            if init {
                init_config(&config)?;
            } else {
                show_config(&config, |key| std::env::var(key).ok())?;
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
