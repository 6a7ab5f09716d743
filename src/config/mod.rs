// Configuration management module
// Settings live in a TOML file and are merged with flags and environment variables

pub mod display;
pub mod settings;

#[cfg(test)]
mod tests;

pub use display::{init_config, show_config};
pub use settings::{
    API_KEY_ENV, BASE_URL_ENV, Config, ConfigError, SseConfig, SseOverrides, StdioConfig,
    StdioOverrides,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_dir()
}
