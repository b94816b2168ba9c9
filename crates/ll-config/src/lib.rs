//! # ll-config
//!
//! Layered settings for the linklocal binary:
//! built-in defaults, then an optional `linklocal.toml`, then `LINKLOCAL__*`
//! environment variables (`LINKLOCAL__SERVER__PORT=9000`). A `.env` file is read
//! into the environment first.

use config::{Config, Environment, File, FileFormat};
use secrecy::SecretString;
use serde::Deserialize;
use tracing::debug;

const ENV_PREFIX: &str = "LINKLOCAL";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not load settings: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Plain,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// Only read when `backend = "sqlite"`
    pub sqlite_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub format: LogFormat,
    /// `EnvFilter` directive, e.g. `info,ll_core=debug`
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct SeedSettings {
    pub enabled: bool,
    pub admin_email: String,
    #[serde(default)]
    pub admin_password: Option<SecretString>,
    /// Sign-in password for the demo member; without it the member cannot sign in
    #[serde(default)]
    pub member_password: Option<SecretString>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub store: StoreSettings,
    pub log: LogSettings,
    pub seed: SeedSettings,
    /// Mixed into session tokens by the auth plugin
    pub token_salt: String,
}

impl Settings {
    /// Reads `.env`, `linklocal.toml` (if present) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), ".env loaded"),
            Err(err) => debug!(%err, "no .env file"),
        }
        let builder = defaults()?
            .add_source(File::with_name("linklocal").required(false))
            .add_source(environment());
        finish(builder.build()?)
    }

    /// Defaults overlaid with an inline TOML document. No environment lookup.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let builder = defaults()?.add_source(File::from_str(toml, FileFormat::Toml));
        finish(builder.build()?)
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.server.host.clone(), self.server.port)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}

fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    Ok(Config::builder()
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 8080)?
        .set_default("store.backend", "memory")?
        .set_default("store.sqlite_url", "sqlite:linklocal.db")?
        .set_default("log.format", "plain")?
        .set_default("log.filter", "info")?
        .set_default("seed.enabled", false)?
        .set_default("seed.admin_email", "admin@linklocal.test")?
        .set_default("token_salt", "linklocal-dev-salt")?)
}

fn finish(config: Config) -> Result<Settings, ConfigError> {
    let settings: Settings = config.try_deserialize()?;
    if settings.server.host.trim().is_empty() {
        return Err(ConfigError::Invalid {
            key: "server.host",
            reason: "must not be empty".into(),
        });
    }
    if settings.store.backend == StoreBackend::Sqlite && settings.store.sqlite_url.trim().is_empty()
    {
        return Err(ConfigError::Invalid {
            key: "store.sqlite_url",
            reason: "required for the sqlite backend".into(),
        });
    }
    if settings.seed.enabled && settings.seed.admin_password.is_none() {
        return Err(ConfigError::Invalid {
            key: "seed.admin_password",
            reason: "required when seeding is enabled".into(),
        });
    }
    Ok(settings)
}
