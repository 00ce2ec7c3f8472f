use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub remote: RemoteSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub oracle: OracleSettings,
    #[serde(default)]
    pub submission: SubmissionSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }

/// Where the remote store and compatibility oracle live
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_base_url() -> String { "http://localhost:8000".to_string() }
fn default_request_timeout_secs() -> u64 { 30 }

/// Deployment profile; only `Development` may fall back to an ephemeral identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployEnvironment {
    #[default]
    Development,
    Production,
}

impl DeployEnvironment {
    pub fn is_production(self) -> bool {
        self == DeployEnvironment::Production
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    #[serde(default)]
    pub environment: DeployEnvironment,
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    #[serde(default = "default_failure_cooldown_ms")]
    pub failure_cooldown_ms: u64,
    /// Address announced by the configured identity provider, if any
    pub identity_address: Option<String>,
    #[serde(default = "default_chain_id")]
    pub chain_id: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            environment: DeployEnvironment::default(),
            store_path: default_store_path(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            failure_cooldown_ms: default_failure_cooldown_ms(),
            identity_address: None,
            chain_id: default_chain_id(),
        }
    }
}

impl SessionSettings {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn failure_cooldown(&self) -> Duration {
        Duration::from_millis(self.failure_cooldown_ms)
    }
}

fn default_store_path() -> PathBuf { PathBuf::from("crush_wallet_session.json") }
fn default_handshake_timeout_ms() -> u64 { 30_000 }
fn default_failure_cooldown_ms() -> u64 { 2_000 }
fn default_chain_id() -> String { "1".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct OracleSettings {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_oracle_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            timeout_ms: default_oracle_timeout_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 { 500 }
fn default_oracle_timeout_ms() -> u64 { 5_000 }

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionSettings {
    #[serde(default = "default_reveal_delay_ms")]
    pub reveal_delay_ms: u64,
}

impl Default for SubmissionSettings {
    fn default() -> Self {
        Self {
            reveal_delay_ms: default_reveal_delay_ms(),
        }
    }
}

fn default_reveal_delay_ms() -> u64 { 2_000 }

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_size")]
    pub size: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            size: default_cache_size(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_cache_size() -> u64 { 1_000 }
fn default_cache_ttl_secs() -> u64 { 3_600 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with CRUSH_)
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., CRUSH__SESSION__ENVIRONMENT -> session.environment
            .add_source(
                Environment::with_prefix("CRUSH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings = substitute_env_vars(settings)?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("CRUSH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

/// Apply well-known shorthand variables on top of the layered config
///
/// `CRUSH_API_URL` points clients at a remote store without the nested
/// `CRUSH__REMOTE__BASE_URL` form.
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    let mut builder = Config::builder().add_source(settings);

    if let Ok(api_url) = std::env::var("CRUSH_API_URL") {
        builder = builder.set_override("remote.base_url", api_url)?;
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn test_empty_config_uses_defaults() {
        let settings: Settings = Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.oracle.debounce_ms, 500);
        assert_eq!(settings.submission.reveal_delay_ms, 2_000);
        assert_eq!(settings.session.failure_cooldown_ms, 2_000);
        assert_eq!(settings.session.environment, DeployEnvironment::Development);
        assert_eq!(settings.session.chain_id, "1");
        assert_eq!(settings.server.port, 8000);
    }

    #[test]
    fn test_production_profile_parses() {
        let toml = r#"
            [session]
            environment = "production"
            handshake_timeout_ms = 1500

            [remote]
            base_url = "https://crush.example"
        "#;

        let settings: Settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert!(settings.session.environment.is_production());
        assert_eq!(settings.session.handshake_timeout(), Duration::from_millis(1500));
        assert_eq!(settings.remote.base_url, "https://crush.example");
    }

    #[test]
    fn test_default_logging() {
        let level = default_log_level();
        let format = default_log_format();
        assert_eq!(level, "info");
        assert_eq!(format, "json");
    }
}
