#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::sse::SessionOptions;
use crate::stdio::{DEFAULT_UML_INPUT, StdioOptions};

/// Environment variable consulted for the SSE base URL
pub const BASE_URL_ENV: &str = "MCP_BASE_URL";

/// Environment variable consulted for the SSE API key
pub const API_KEY_ENV: &str = "MCP_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub sse: SseConfig,
    #[serde(default)]
    pub stdio: StdioConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SseConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub timeout_secs: f64,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8765".to_string(),
            api_key: None,
            timeout_secs: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StdioConfig {
    pub command: String,
    pub args: Vec<String>,
    pub ready_marker: String,
    pub startup_timeout_secs: f64,
    pub settle_delay_ms: u64,
    pub collect_window_secs: f64,
    pub shutdown_grace_secs: f64,
    pub output_file: PathBuf,
    pub tool_name: String,
    pub tool_argument: String,
}

impl Default for StdioConfig {
    fn default() -> Self {
        Self {
            command: "npx".to_string(),
            args: vec!["-y".to_string(), "plantuml-mcp-server".to_string()],
            ready_marker: "running on stdio transport".to_string(),
            startup_timeout_secs: 30.0,
            settle_delay_ms: 500,
            collect_window_secs: 5.0,
            shutdown_grace_secs: 2.0,
            output_file: PathBuf::from("plantuml_mcp_full_exchange.json"),
            tool_name: "generate_plantuml_diagram".to_string(),
            tool_argument: "plantuml_code".to_string(),
        }
    }
}

/// Values given on the command line for the SSE probe
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SseOverrides {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<f64>,
}

/// Values given on the command line for the stdio probe
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StdioOverrides {
    /// Server command followed by its arguments
    pub server: Vec<String>,
    pub ready_marker: Option<String>,
    pub collect_window_secs: Option<f64>,
    pub output_file: Option<PathBuf>,
    pub uml_input: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid URL scheme: {0} (must be 'http' or 'https')")]
    InvalidScheme(String),
    #[error("Invalid {name}: {value} (must be a positive number of seconds)")]
    InvalidDuration { name: &'static str, value: f64 },
    #[error("Invalid {0}: cannot be empty")]
    Empty(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default configuration directory, `~/.mcp-probe`
    #[inline]
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".mcp-probe"))
            .or({
                #[cfg(windows)]
                {
                    dirs::data_dir().map(|data| data.join("mcp-probe"))
                }
                #[cfg(not(windows))]
                {
                    None
                }
            })
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sse.validate()?;
        self.stdio.validate()?;
        Ok(())
    }
}

impl SseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_base_url(&self.base_url)?;
        seconds("timeout", self.timeout_secs)?;
        Ok(())
    }

    /// Merge command-line values, environment and file settings.
    ///
    /// Precedence is flag, then environment variable, then this config.
    /// A missing API key is left as `None`; the session refuses to connect without one.
    pub fn resolve<E>(&self, overrides: SseOverrides, env: E) -> Result<SessionOptions, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let base_url = overrides
            .base_url
            .or_else(|| env(BASE_URL_ENV))
            .unwrap_or_else(|| self.base_url.clone());
        validate_base_url(&base_url)?;

        let api_key = overrides
            .api_key
            .or_else(|| env(API_KEY_ENV))
            .or_else(|| self.api_key.clone())
            .filter(|key| !key.is_empty());

        let timeout = seconds("timeout", overrides.timeout_secs.unwrap_or(self.timeout_secs))?;

        Ok(SessionOptions {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout,
        })
    }
}

impl StdioConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command.trim().is_empty() {
            return Err(ConfigError::Empty("command"));
        }
        if self.ready_marker.is_empty() {
            return Err(ConfigError::Empty("ready marker"));
        }
        if self.tool_name.trim().is_empty() {
            return Err(ConfigError::Empty("tool name"));
        }
        if self.tool_argument.trim().is_empty() {
            return Err(ConfigError::Empty("tool argument"));
        }
        if self.output_file.as_os_str().is_empty() {
            return Err(ConfigError::Empty("output file"));
        }
        seconds("startup timeout", self.startup_timeout_secs)?;
        seconds("collection window", self.collect_window_secs)?;
        seconds("shutdown grace period", self.shutdown_grace_secs)?;
        Ok(())
    }

    /// Merge command-line values into these settings.
    ///
    /// Returns the exchange options and the path the record should be written to.
    pub fn resolve(&self, overrides: StdioOverrides) -> Result<(StdioOptions, PathBuf), ConfigError> {
        let mut merged = self.clone();

        let mut server = overrides.server.into_iter();
        if let Some(command) = server.next() {
            merged.command = command;
            merged.args = server.collect();
        }
        if let Some(marker) = overrides.ready_marker {
            merged.ready_marker = marker;
        }
        if let Some(window) = overrides.collect_window_secs {
            merged.collect_window_secs = window;
        }
        if let Some(output_file) = overrides.output_file {
            merged.output_file = output_file;
        }
        merged.validate()?;

        let options = StdioOptions {
            command: merged.command,
            args: merged.args,
            ready_marker: merged.ready_marker,
            startup_timeout: seconds("startup timeout", merged.startup_timeout_secs)?,
            settle_delay: Duration::from_millis(merged.settle_delay_ms),
            collect_window: seconds("collection window", merged.collect_window_secs)?,
            shutdown_grace: seconds("shutdown grace period", merged.shutdown_grace_secs)?,
            tool_name: merged.tool_name,
            tool_argument: merged.tool_argument,
            uml_input: overrides
                .uml_input
                .unwrap_or_else(|| DEFAULT_UML_INPUT.to_string()),
        };

        Ok((options, merged.output_file))
    }
}

fn validate_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|_| ConfigError::InvalidUrl(raw.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidScheme(url.scheme().to_string()));
    }
    Ok(url)
}

fn seconds(name: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value)
        .ok()
        .filter(|duration| !duration.is_zero())
        .ok_or(ConfigError::InvalidDuration { name, value })
}
