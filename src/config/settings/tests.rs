use super::*;
use std::collections::HashMap;
use tempfile::TempDir;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.sse.base_url, "http://localhost:8765");
    assert_eq!(config.sse.api_key, None);
    assert!((config.sse.timeout_secs - 10.0).abs() < f64::EPSILON);
    assert_eq!(config.stdio.command, "npx");
    assert_eq!(config.stdio.args, vec!["-y", "plantuml-mcp-server"]);
    assert_eq!(config.stdio.ready_marker, "running on stdio transport");
    assert_eq!(
        config.stdio.output_file,
        PathBuf::from("plantuml_mcp_full_exchange.json")
    );
    assert_eq!(config.stdio.tool_name, "generate_plantuml_diagram");
    assert_eq!(config.stdio.tool_argument, "plantuml_code");
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.sse.base_url = "not a url".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidUrl(_))
    ));

    let mut invalid_config = config.clone();
    invalid_config.sse.base_url = "ftp://localhost:8765".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidScheme(_))
    ));

    let mut invalid_config = config.clone();
    invalid_config.sse.timeout_secs = 0.0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.sse.timeout_secs = f64::NAN;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.stdio.command = "  ".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::Empty("command"))
    ));

    let mut invalid_config = config.clone();
    invalid_config.stdio.collect_window_secs = -1.0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.stdio.output_file = PathBuf::new();
    assert!(invalid_config.validate().is_err());
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_uses_defaults() {
    let parsed: Config = toml::from_str(
        r#"
        [sse]
        base_url = "https://mcp.example.com"

        [stdio]
        collect_window_secs = 12.5
        "#,
    )
    .expect("should parse toml correctly");

    assert_eq!(parsed.sse.base_url, "https://mcp.example.com");
    assert!((parsed.sse.timeout_secs - 10.0).abs() < f64::EPSILON);
    assert!((parsed.stdio.collect_window_secs - 12.5).abs() < f64::EPSILON);
    assert_eq!(parsed.stdio.command, "npx");
}

#[test]
fn load_missing_config() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let config = Config::load(temp_dir.path()).expect("should load config successfully");
    assert_eq!(config.sse, SseConfig::default());
    assert_eq!(config.stdio, StdioConfig::default());
    assert_eq!(config.get_base_dir(), temp_dir.path());
}

#[test]
fn save_and_load() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let mut config = Config::load(temp_dir.path().join("nested")).expect("defaults load");
    config.sse.api_key = Some("from-file".to_string());
    config.stdio.args = vec!["server.js".to_string()];
    config.save().expect("should save config successfully");

    assert!(config.config_file_path().exists());
    let loaded = Config::load(temp_dir.path().join("nested")).expect("should load config");
    assert_eq!(loaded, config);
}

#[test]
fn load_rejects_invalid_file() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[sse]\ntimeout_secs = 0.0\n",
    )
    .expect("should write config file");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn sse_flag_beats_env_beats_file() {
    let config = SseConfig {
        base_url: "http://file:1".to_string(),
        api_key: Some("file-key".to_string()),
        timeout_secs: 3.0,
    };
    let env = env_from(&[
        (BASE_URL_ENV, "http://env:2"),
        (API_KEY_ENV, "env-key"),
    ]);

    let from_env = config
        .resolve(SseOverrides::default(), &env)
        .expect("resolves");
    assert_eq!(from_env.base_url, "http://env:2");
    assert_eq!(from_env.api_key.as_deref(), Some("env-key"));
    assert_eq!(from_env.timeout, Duration::from_secs(3));

    let from_flags = config
        .resolve(
            SseOverrides {
                base_url: Some("http://flag:3/".to_string()),
                api_key: Some("flag-key".to_string()),
                timeout_secs: Some(0.5),
            },
            &env,
        )
        .expect("resolves");
    assert_eq!(from_flags.base_url, "http://flag:3");
    assert_eq!(from_flags.api_key.as_deref(), Some("flag-key"));
    assert_eq!(from_flags.timeout, Duration::from_millis(500));

    let from_file = config
        .resolve(SseOverrides::default(), no_env)
        .expect("resolves");
    assert_eq!(from_file.base_url, "http://file:1");
    assert_eq!(from_file.api_key.as_deref(), Some("file-key"));
}

#[test]
fn sse_missing_key_stays_unset() {
    let resolved = SseConfig::default()
        .resolve(SseOverrides::default(), env_from(&[(API_KEY_ENV, "")]))
        .expect("resolves");
    assert_eq!(resolved.api_key, None);
    assert_eq!(resolved.base_url, "http://localhost:8765");
    assert_eq!(resolved.timeout, Duration::from_secs(10));
}

#[test]
fn sse_rejects_bad_overrides() {
    let config = SseConfig::default();
    let bad_url = config.resolve(
        SseOverrides {
            base_url: Some("localhost".to_string()),
            ..SseOverrides::default()
        },
        no_env,
    );
    assert!(bad_url.is_err());

    let bad_timeout = config.resolve(
        SseOverrides {
            timeout_secs: Some(-2.0),
            ..SseOverrides::default()
        },
        no_env,
    );
    assert!(matches!(
        bad_timeout,
        Err(ConfigError::InvalidDuration { name: "timeout", .. })
    ));
}

#[test]
fn stdio_defaults_resolve() {
    let (options, output) = StdioConfig::default()
        .resolve(StdioOverrides::default())
        .expect("resolves");

    assert_eq!(options.command, "npx");
    assert_eq!(options.args, vec!["-y", "plantuml-mcp-server"]);
    assert_eq!(options.collect_window, Duration::from_secs(5));
    assert_eq!(options.shutdown_grace, Duration::from_secs(2));
    assert_eq!(options.settle_delay, Duration::from_millis(500));
    assert_eq!(options.uml_input, DEFAULT_UML_INPUT);
    assert_eq!(output, PathBuf::from("plantuml_mcp_full_exchange.json"));
}

#[test]
fn stdio_overrides_replace_command_and_args() {
    let (options, output) = StdioConfig::default()
        .resolve(StdioOverrides {
            server: vec!["node".to_string(), "dist/index.js".to_string()],
            ready_marker: Some("listening".to_string()),
            collect_window_secs: Some(1.5),
            output_file: Some(PathBuf::from("out.json")),
            uml_input: Some("@startuml\n@enduml\n".to_string()),
        })
        .expect("resolves");

    assert_eq!(options.command, "node");
    assert_eq!(options.args, vec!["dist/index.js"]);
    assert_eq!(options.ready_marker, "listening");
    assert_eq!(options.collect_window, Duration::from_millis(1500));
    assert_eq!(options.uml_input, "@startuml\n@enduml\n");
    assert_eq!(output, PathBuf::from("out.json"));
}

#[test]
fn stdio_rejects_bad_overrides() {
    let result = StdioConfig::default().resolve(StdioOverrides {
        collect_window_secs: Some(0.0),
        ..StdioOverrides::default()
    });
    assert!(matches!(
        result,
        Err(ConfigError::InvalidDuration {
            name: "collection window",
            ..
        })
    ));

    let result = StdioConfig::default().resolve(StdioOverrides {
        ready_marker: Some(String::new()),
        ..StdioOverrides::default()
    });
    assert!(matches!(result, Err(ConfigError::Empty("ready marker"))));
}
