//! Configuration loading and validation for the sitewatch server

use serde::{Deserialize, Serialize};
use sitewatch::HttpProberConfig;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "SITEWATCH_CONFIG";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid value {value:?} for environment variable {key}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub probe: ProbeSettings,

    #[serde(default)]
    pub metrics: MetricsSettings,

    #[serde(default)]
    pub telemetry: TelemetrySettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Validate for Config {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        self.database.validate()?;
        self.probe.validate()?;
        self.metrics.validate()?;
        Ok(())
    }
}

/// PostgreSQL connection settings
#[derive(Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DatabaseSettings {
    #[validate(length(min = 1))]
    pub host: String,

    pub port: u16,

    #[validate(length(min = 1))]
    pub user: String,

    pub password: String,

    #[validate(length(min = 1))]
    pub name: String,

    #[validate(custom = "validate_ssl_mode")]
    pub ssl_mode: String,

    #[validate(range(min = 1, max = 100))]
    pub max_connections: u32,

    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

// Keeps the password out of logs
impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Probe execution settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ProbeSettings {
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_probe_timeout")]
    pub timeout: Duration,

    #[validate(range(min = 1, max = 16777216))]
    pub body_limit: usize,

    pub user_agent: Option<String>,
}

/// Prometheus endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,

    #[validate(custom = "validate_listen_addr")]
    pub listen_addr: String,
}

/// OpenTelemetry export settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    pub enabled: bool,
    pub service_name: String,
    pub otlp_endpoint: String,
}

/// Logging settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub format: Option<String>,
}

impl LoggingSettings {
    /// Effective log level
    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or("info")
    }

    /// Whether logs should be emitted as JSON lines
    pub fn is_json(&self) -> bool {
        self.format
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case("json"))
    }
}

impl MetricsSettings {
    /// Parsed listen address
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.listen_addr.parse()
    }
}

// Default implementations

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 5432,
            user: String::new(),
            password: String::new(),
            name: String::new(),
            ssl_mode: "require".to_string(),
            max_connections: 10,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        let defaults = HttpProberConfig::default();
        Self {
            timeout: defaults.timeout,
            body_limit: defaults.body_limit,
            user_agent: Some(concat!("sitewatch/", env!("CARGO_PKG_VERSION")).to_string()),
        }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "127.0.0.1:9464".to_string(),
        }
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            service_name: "sitewatch".to_string(),
            otlp_endpoint: "http://localhost:4317".to_string(),
        }
    }
}

// Custom validators

fn validate_ssl_mode(mode: &str) -> Result<(), ValidationError> {
    match mode {
        "disable" | "allow" | "prefer" | "require" | "verify-ca" | "verify-full" => Ok(()),
        _ => Err(ValidationError::new("ssl_mode_unknown")),
    }
}

fn validate_probe_timeout(timeout: &Duration) -> Result<(), ValidationError> {
    if *timeout < Duration::from_secs(1) || *timeout > Duration::from_secs(300) {
        return Err(ValidationError::new("probe_timeout_out_of_range"));
    }
    Ok(())
}

fn validate_listen_addr(addr: &str) -> Result<(), ValidationError> {
    addr.parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("listen_addr_invalid"))
}

// Configuration loading implementation

impl Config {
    /// Load configuration from `SITEWATCH_CONFIG` or the default search
    /// paths, then apply `DB_*` environment overrides and validate.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from) {
            Some(path) if !path.is_file() => return Err(ConfigError::FileNotFound(path)),
            Some(path) => Self::read_file(&path)?,
            None => match Self::find_config_file() {
                Some(path) => Self::read_file(&path)?,
                None => Self::default(),
            },
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file without environment overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = Self::read_file(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    /// Override database settings from `DB_HOST`, `DB_PORT`, `DB_USER`,
    /// `DB_PASSWORD`, `DB_NAME` and `DB_SSL_MODE`. Empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let db = &mut self.database;

        if let Some(host) = get("DB_HOST") {
            db.host = host;
        }
        if let Some(port) = get("DB_PORT") {
            db.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                key: "DB_PORT",
                value: port.clone(),
            })?;
        }
        if let Some(user) = get("DB_USER") {
            db.user = user;
        }
        if let Some(password) = get("DB_PASSWORD") {
            db.password = password;
        }
        if let Some(name) = get("DB_NAME") {
            db.name = name;
        }
        if let Some(ssl_mode) = get("DB_SSL_MODE") {
            db.ssl_mode = ssl_mode;
        }

        Ok(())
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/sitewatch/sitewatch.yaml")];

        if let Some(home_path) = Self::home_config_path() {
            paths.push(home_path);
        }

        paths.push(PathBuf::from("./sitewatch.yaml"));

        paths.into_iter().find(|p: &PathBuf| p.is_file())
    }

    /// Get home directory config path
    fn home_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/sitewatch/sitewatch.yaml"))
    }

    /// Prober settings for the scheduler
    pub fn to_prober_config(&self) -> HttpProberConfig {
        HttpProberConfig {
            timeout: self.probe.timeout,
            body_limit: self.probe.body_limit,
            user_agent: self.probe.user_agent.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const VALID_DB: &str = r#"
database:
  host: db.internal
  user: monitor
  password: secret
  name: sitewatch
"#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_needs_database() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config
            .apply_env_overrides(env(&[
                ("DB_HOST", "localhost"),
                ("DB_USER", "postgres"),
                ("DB_NAME", "monitor"),
            ]))
            .unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_valid_yaml_parsing() {
        let yaml = r#"
database:
  host: db.internal
  port: 6432
  user: monitor
  password: secret
  name: sitewatch
  ssl_mode: disable
  max_connections: 4
  connect_timeout: 3s

probe:
  timeout: 15s
  body_limit: 1024
  user_agent: "probe/2"

metrics:
  enabled: false
  listen_addr: "0.0.0.0:9100"

logging:
  level: debug
  format: json
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.database.port, 6432);
        assert_eq!(config.database.ssl_mode, "disable");
        assert_eq!(config.database.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.probe.timeout, Duration::from_secs(15));
        assert_eq!(config.probe.body_limit, 1024);
        assert!(!config.metrics.enabled);
        assert_eq!(config.logging.level(), "debug");
        assert!(config.logging.is_json());
    }

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str(VALID_DB).unwrap();
        assert!(config.validate().is_ok());

        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.ssl_mode, "require");
        assert_eq!(config.probe.timeout, Duration::from_secs(30));
        assert_eq!(config.probe.body_limit, 64 * 1024);
        assert!(config.metrics.enabled);
        assert!(!config.telemetry.enabled);
        assert_eq!(config.logging.level(), "info");
        assert!(!config.logging.is_json());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config: Config = serde_yaml::from_str(VALID_DB).unwrap();
        config
            .apply_env_overrides(env(&[
                ("DB_HOST", "override.internal"),
                ("DB_PORT", "15432"),
                ("DB_PASSWORD", ""),
                ("DB_SSL_MODE", "verify-full"),
            ]))
            .unwrap();

        assert_eq!(config.database.host, "override.internal");
        assert_eq!(config.database.port, 15432);
        // Empty values do not clobber the file
        assert_eq!(config.database.password, "secret");
        assert_eq!(config.database.ssl_mode, "verify-full");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_env_port() {
        let mut config = Config::default();
        let err = config
            .apply_env_overrides(env(&[("DB_PORT", "fifty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { key: "DB_PORT", .. }));
    }

    #[test]
    fn test_invalid_ssl_mode() {
        let mut config: Config = serde_yaml::from_str(VALID_DB).unwrap();
        config.database.ssl_mode = "sometimes".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_probe_timeout() {
        let yaml = format!("{}\nprobe:\n  timeout: 500ms\n", VALID_DB);
        let config: Config = serde_yaml::from_str(&yaml).unwrap();
        assert!(config.validate().is_err());

        let yaml = format!("{}\nprobe:\n  timeout: 10m\n", VALID_DB);
        let config: Config = serde_yaml::from_str(&yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_body_limit() {
        let yaml = format!("{}\nprobe:\n  body_limit: 0\n", VALID_DB);
        let config: Config = serde_yaml::from_str(&yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_listen_addr() {
        let yaml = format!("{}\nmetrics:\n  listen_addr: \"localhost\"\n", VALID_DB);
        let config: Config = serde_yaml::from_str(&yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_password_is_redacted() {
        let config: Config = serde_yaml::from_str(VALID_DB).unwrap();
        let printed = format!("{:?}", config.database);
        assert!(!printed.contains("secret"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_load_from_file() {
        let file_name = format!("sitewatch-config-{}.yaml", std::process::id());
        let path = std::env::temp_dir().join(file_name);
        std::fs::write(&path, VALID_DB).unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.database.host, "db.internal");

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_config_to_prober_config_conversion() {
        let config: Config = serde_yaml::from_str(VALID_DB).unwrap();
        let prober = config.to_prober_config();

        assert_eq!(prober.timeout, Duration::from_secs(30));
        assert_eq!(prober.body_limit, 65536);
        assert!(prober.user_agent.unwrap().starts_with("sitewatch/"));
    }
}
