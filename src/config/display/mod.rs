
use anyhow::{Result, bail};
use console::style;
use tracing::debug;

use super::{API_KEY_ENV, BASE_URL_ENV, Config, SseConfig, SseOverrides};

/// Print the settings in effect, with environment variables applied over the file
#[inline]
pub fn show_config<E>(config: &Config, env: E) -> Result<()>
where
    E: Fn(&str) -> Option<String>,
{
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("SSE Probe:").bold().yellow());
    let sse = effective_sse(&config.sse, env);
    eprintln!("  Base URL: {}", style(&sse.base_url).cyan());
    match sse.api_key.as_deref() {
        Some(key) => eprintln!("  API Key: {}", style(mask_secret(key)).cyan()),
        None => eprintln!("  API Key: {}", style("not set").dim()),
    }
    eprintln!("  Timeout: {}s", style(sse.timeout_secs).cyan());

    eprintln!();
    eprintln!("{}", style("Stdio Probe:").bold().yellow());
    let server = std::iter::once(config.stdio.command.as_str())
        .chain(config.stdio.args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ");
    eprintln!("  Server: {}", style(server).cyan());
    eprintln!(
        "  Ready Marker: {}",
        style(&config.stdio.ready_marker).cyan()
    );
    eprintln!(
        "  Startup Timeout: {}s",
        style(config.stdio.startup_timeout_secs).cyan()
    );
    eprintln!(
        "  Settle Delay: {}ms",
        style(config.stdio.settle_delay_ms).cyan()
    );
    eprintln!(
        "  Collection Window: {}s",
        style(config.stdio.collect_window_secs).cyan()
    );
    eprintln!(
        "  Shutdown Grace: {}s",
        style(config.stdio.shutdown_grace_secs).cyan()
    );
    eprintln!(
        "  Tool: {} ({})",
        style(&config.stdio.tool_name).cyan(),
        style(&config.stdio.tool_argument).cyan()
    );
    eprintln!(
        "  Output File: {}",
        style(config.stdio.output_file.display()).cyan()
    );

    eprintln!();
    if let Err(e) = config.validate() {
        eprintln!("  {} ({})", style("Invalid").red(), e);
    }
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

/// Write a config file holding the defaults, refusing to replace an existing one
#[inline]
pub fn init_config(config: &Config) -> Result<()> {
    let config_path = config.config_file_path();
    if config_path.exists() {
        bail!(
            "Configuration file already exists: {}",
            config_path.display()
        );
    }

    config.save()?;
    eprintln!("{}", style("✓ Configuration saved successfully!").green());
    eprintln!(
        "Configuration saved to: {}",
        style(config_path.display()).cyan()
    );
    Ok(())
}

/// File settings with `MCP_BASE_URL` and `MCP_API_KEY` applied, as the SSE probe sees them.
///
/// Invalid values are shown as given; `validate` reports them separately.
fn effective_sse<E>(file: &SseConfig, env: E) -> SseConfig
where
    E: Fn(&str) -> Option<String>,
{
    match file.resolve(SseOverrides::default(), &env) {
        Ok(options) => SseConfig {
            base_url: options.base_url,
            api_key: options.api_key,
            timeout_secs: options.timeout.as_secs_f64(),
        },
        Err(e) => {
            debug!("Showing unresolved SSE settings: {}", e);
            SseConfig {
                base_url: env(BASE_URL_ENV).unwrap_or_else(|| file.base_url.clone()),
                api_key: env(API_KEY_ENV)
                    .or_else(|| file.api_key.clone())
                    .filter(|key| !key.is_empty()),
                timeout_secs: file.timeout_secs,
            }
        }
    }
}

fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 8 {
        "*".repeat(secret.chars().count())
    } else {
        format!("{}{}", visible, "*".repeat(8))
    }
}
