use super::*;
use std::fs;
use tempfile::TempDir;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn config_file_persistence() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let config_path = temp_dir.path().join("config.toml");

        let original_config = Config {
            sse: SseConfig {
                base_url: "https://mcp.example.com/api".to_string(),
                api_key: Some("test-key".to_string()),
                timeout_secs: 2.5,
            },
            stdio: StdioConfig {
                command: "node".to_string(),
                args: vec!["server.js".to_string()],
                ..StdioConfig::default()
            },
            base_dir: temp_dir.path().to_path_buf(),
        };

        let toml_content = toml::to_string_pretty(&original_config)
            .expect("config should convert to toml string successfully");
        fs::write(&config_path, toml_content).expect("should write to config_path successfully");

        let loaded_config =
            Config::load(temp_dir.path()).expect("should load config from disk successfully");

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn config_directory_creation() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let config_dir = temp_dir.path().join(".mcp-probe");

        assert!(!config_dir.exists());

        let config = Config::load(&config_dir).expect("should load defaults successfully");
        config.save().expect("should save config successfully");

        assert!(config_dir.exists());
        assert!(config_dir.is_dir());
        assert!(config_dir.join("config.toml").is_file());
    }

    #[test]
    fn invalid_toml_handling() {
        let invalid_toml = r#"
            [sse
            base_url = "http://localhost:8765"
            timeout_secs = "soon"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
        assert!(result.is_err());
    }

    #[test]
    fn wrong_field_type_is_rejected() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        fs::write(
            temp_dir.path().join("config.toml"),
            "[stdio]\nargs = \"-y plantuml-mcp-server\"\n",
        )
        .expect("should write config file");

        let error = Config::load(temp_dir.path()).expect_err("load should fail");
        assert!(format!("{error:#}").contains("Failed to parse config file"));
    }

    #[test]
    fn error_display_messages() {
        let errors = vec![
            ConfigError::DirectoryError,
            ConfigError::InvalidUrl("invalid-url".to_string()),
            ConfigError::InvalidScheme("ftp".to_string()),
            ConfigError::InvalidDuration {
                name: "timeout",
                value: -1.0,
            },
            ConfigError::Empty("command"),
        ];

        for error in errors {
            let message = format!("{error}");
            assert!(!message.is_empty());
            assert!(message.len() > 10);
        }
    }

    #[test]
    fn config_dir_is_under_home() {
        if let Ok(dir) = get_config_dir() {
            assert!(dir.ends_with(".mcp-probe") || dir.ends_with("mcp-probe"));
        }
    }
}
