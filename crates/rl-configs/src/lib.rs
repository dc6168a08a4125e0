//! # rl-configs
//!
//! Layered settings for the Roving Lily binary.
//!
//! Sources, lowest priority first:
//! 1. built-in defaults
//! 2. `roving-lily.toml` (or the file named by `RL_CONFIG`), if present
//! 3. `RL__SECTION__KEY` environment variables (a `.env` file is loaded first)

use std::path::PathBuf;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "roving-lily.toml";
pub const CONFIG_PATH_VAR: &str = "RL_CONFIG";
const ENV_PREFIX: &str = "RL";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub ledger: LedgerSettings,
    pub pipeline: PipelineSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Upper bound for one request's ledger reads.
    pub request_timeout_secs: u64,
    /// Directory mounted under `/static`.
    pub static_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    /// JSON-RPC gateway in front of the chain node
    Rpc,
    /// In-process ledger, optionally seeded from a fixture file
    Memory,
}

#[derive(Debug, Deserialize)]
pub struct LedgerSettings {
    pub backend: LedgerBackend,
    pub rpc_url: String,
    /// Bearer token for the gateway. Never logged.
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub rpc_token: Option<SecretString>,
    pub rpc_timeout_secs: u64,
    #[serde(default)]
    pub fixture_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSettings {
    /// How many posts are resolved concurrently per request.
    pub fan_out: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .filter(|token| !token.is_empty())
        .map(|token| SecretString::new(token.into_boxed_str())))
}

impl Settings {
    /// Loads `.env`, the optional config file, and `RL__*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let path =
            std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let builder = Self::defaults()?
            .add_source(File::with_name(&path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            );
        Self::finish(builder)
    }

    /// Defaults overlaid with a TOML document. Ignores the environment.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let builder = Self::defaults()?.add_source(File::from_str(toml, FileFormat::Toml));
        Self::finish(builder)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
        Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.request_timeout_secs", 30)?
            .set_default("server.static_dir", "static")?
            .set_default("ledger.backend", "rpc")?
            .set_default("ledger.rpc_url", "http://127.0.0.1:9944")?
            .set_default("ledger.rpc_timeout_secs", 10)?
            .set_default("pipeline.fan_out", 8)?
            .set_default("log.format", "pretty")?
            .set_default("log.filter", "info")
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".into()));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "server.request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.pipeline.fan_out == 0 {
            return Err(ConfigError::Invalid("pipeline.fan_out must be at least 1".into()));
        }
        if self.ledger.backend == LedgerBackend::Rpc && self.ledger.rpc_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "ledger.rpc_url is required for the rpc backend".into(),
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  server:   {}", self.bind_address());
        tracing::info!(
            "  ledger:   backend={:?}, rpc_url={}, token={}",
            self.ledger.backend,
            self.ledger.rpc_url,
            if self.ledger.rpc_token.is_some() { "set" } else { "(none)" }
        );
        if let Some(path) = &self.ledger.fixture_path {
            tracing::info!("  fixture:  {}", path.display());
        }
        tracing::info!("  pipeline: fan_out={}", self.pipeline.fan_out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.bind_address(), "127.0.0.1:3000");
        assert_eq!(settings.ledger.backend, LedgerBackend::Rpc);
        assert_eq!(settings.ledger.rpc_url, "http://127.0.0.1:9944");
        assert!(settings.ledger.rpc_token.is_none());
        assert!(settings.ledger.fixture_path.is_none());
        assert_eq!(settings.pipeline.fan_out, 8);
        assert_eq!(settings.log.format, LogFormat::Pretty);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let settings = Settings::from_toml(
            r#"
            [server]
            port = 8080

            [ledger]
            backend = "memory"
            fixture_path = "fixtures/demo.json"

            [log]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.ledger.backend, LedgerBackend::Memory);
        assert_eq!(
            settings.ledger.fixture_path,
            Some(PathBuf::from("fixtures/demo.json"))
        );
        assert_eq!(settings.log.format, LogFormat::Json);
    }

    #[test]
    fn test_token_is_redacted() {
        let settings = Settings::from_toml(
            r#"
            [ledger]
            rpc_token = "hunter2"
            "#,
        )
        .unwrap();

        let token = settings.ledger.rpc_token.as_ref().unwrap();
        assert_eq!(token.expose_secret(), "hunter2");
        assert!(!format!("{:?}", settings).contains("hunter2"));
    }

    #[test]
    fn test_empty_token_is_none() {
        let settings = Settings::from_toml("[ledger]\nrpc_token = \"\"").unwrap();
        assert!(settings.ledger.rpc_token.is_none());
    }

    #[test]
    fn test_zero_fan_out_rejected() {
        let err = Settings::from_toml("[pipeline]\nfan_out = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("fan_out")));
    }

    #[test]
    fn test_zero_port_rejected() {
        assert!(matches!(
            Settings::from_toml("[server]\nport = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(matches!(
            Settings::from_toml("[ledger]\nbackend = \"sqlite\""),
            Err(ConfigError::Load(_))
        ));
    }
}
