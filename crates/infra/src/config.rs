//! Process configuration, read from `CLINICOS_*` environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `CLINICOS_MODEL_PATH` | embedded model |
//! | `CLINICOS_ENABLE_AUDIT` | `true` |
//! | `CLINICOS_ENABLE_SUPERADMIN_BYPASS` | `true` |
//! | `CLINICOS_ENABLE_POLICY_SYNC` | `true` |
//! | `CLINICOS_ENABLE_HEALTH_CHECK` | `true` |
//! | `CLINICOS_DATABASE_URL` (or `DATABASE_URL`) | unset: in-memory store |
//! | `CLINICOS_NOTIFIER` | `memory` (`redis`, `postgres`) |
//! | `CLINICOS_NOTIFIER_URL` (or `REDIS_URL`) | unset |
//! | `CLINICOS_NOTIFY_CHANNEL` | `clinicos_policy_changed` |
//! | `CLINICOS_RELOAD_TIMEOUT_MS` | `10000` |
//! | `CLINICOS_RESUBSCRIBE_BACKOFF_MS` | `1000` |
//! | `CLINICOS_SEED_ON_BOOT` | `true` |
//! | `CLINICOS_LOG_FORMAT` | `json` (`pretty`) |
//! | `CLINICOS_BIND_ADDR` | `0.0.0.0:8080` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use clinicos_authz::{ModelDefinition, ModelError};
use clinicos_observability::LogFormat;

pub const DEFAULT_NOTIFY_CHANNEL: &str = "clinicos_policy_changed";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}' ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{var} is required when {because}")]
    Missing {
        var: &'static str,
        because: &'static str,
    },

    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierBackend {
    Memory,
    Redis,
    Postgres,
}

impl core::str::FromStr for NotifierBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "in_memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            "postgres" | "pg" => Ok(Self::Postgres),
            _ => Err("expected 'memory', 'redis' or 'postgres'".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthzConfig {
    pub model_path: Option<PathBuf>,
    pub enable_audit: bool,
    pub enable_superadmin_bypass: bool,
    pub enable_policy_sync: bool,
    pub enable_health_check: bool,
    pub database_url: Option<String>,
    pub notifier: NotifierBackend,
    pub notifier_url: Option<String>,
    pub notify_channel: String,
    pub reload_timeout: Duration,
    pub resubscribe_backoff: Duration,
    pub seed_on_boot: bool,
    pub log_format: LogFormat,
    pub bind_addr: SocketAddr,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            enable_audit: true,
            enable_superadmin_bypass: true,
            enable_policy_sync: true,
            enable_health_check: true,
            database_url: None,
            notifier: NotifierBackend::Memory,
            notifier_url: None,
            notify_channel: DEFAULT_NOTIFY_CHANNEL.to_string(),
            reload_timeout: clinicos_authz::DEFAULT_RELOAD_TIMEOUT,
            resubscribe_backoff: Duration::from_secs(1),
            seed_on_boot: true,
            log_format: LogFormat::Json,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

impl AuthzConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source; `from_env` uses the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let config = Self {
            model_path: get("CLINICOS_MODEL_PATH").map(PathBuf::from),
            enable_audit: flag(&get, "CLINICOS_ENABLE_AUDIT", defaults.enable_audit)?,
            enable_superadmin_bypass: flag(
                &get,
                "CLINICOS_ENABLE_SUPERADMIN_BYPASS",
                defaults.enable_superadmin_bypass,
            )?,
            enable_policy_sync: flag(&get, "CLINICOS_ENABLE_POLICY_SYNC", defaults.enable_policy_sync)?,
            enable_health_check: flag(&get, "CLINICOS_ENABLE_HEALTH_CHECK", defaults.enable_health_check)?,
            database_url: get("CLINICOS_DATABASE_URL").or_else(|| get("DATABASE_URL")),
            notifier: parsed(&get, "CLINICOS_NOTIFIER", defaults.notifier)?,
            notifier_url: get("CLINICOS_NOTIFIER_URL").or_else(|| get("REDIS_URL")),
            notify_channel: get("CLINICOS_NOTIFY_CHANNEL").unwrap_or(defaults.notify_channel),
            reload_timeout: millis(&get, "CLINICOS_RELOAD_TIMEOUT_MS", defaults.reload_timeout)?,
            resubscribe_backoff: millis(
                &get,
                "CLINICOS_RESUBSCRIBE_BACKOFF_MS",
                defaults.resubscribe_backoff,
            )?,
            seed_on_boot: flag(&get, "CLINICOS_SEED_ON_BOOT", defaults.seed_on_boot)?,
            log_format: parsed(&get, "CLINICOS_LOG_FORMAT", defaults.log_format)?,
            bind_addr: parsed(&get, "CLINICOS_BIND_ADDR", defaults.bind_addr)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.notifier {
            NotifierBackend::Redis if self.notifier_url.is_none() => Err(ConfigError::Missing {
                var: "CLINICOS_NOTIFIER_URL",
                because: "CLINICOS_NOTIFIER=redis",
            }),
            NotifierBackend::Postgres if self.database_url.is_none() => Err(ConfigError::Missing {
                var: "CLINICOS_DATABASE_URL",
                because: "CLINICOS_NOTIFIER=postgres",
            }),
            _ => Ok(()),
        }
    }

    /// The configured model with the bypass toggle applied.
    pub fn model(&self) -> Result<ModelDefinition, ConfigError> {
        let model = ModelDefinition::load_or_default(self.model_path.as_deref())?;
        let bypass = model.superadmin_bypass && self.enable_superadmin_bypass;
        Ok(model.with_superadmin_bypass(bypass))
    }
}

fn flag<G>(get: &G, var: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(value) = get(var) else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value,
            reason: "expected a boolean".to_string(),
        }),
    }
}

fn millis<G>(get: &G, var: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(value) = get(var) else {
        return Ok(default);
    };
    match value.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            var,
            value,
            reason: "must be greater than zero".to_string(),
        }),
        Ok(ms) => Ok(Duration::from_millis(ms)),
        Err(err) => Err(ConfigError::Invalid {
            var,
            value,
            reason: err.to_string(),
        }),
    }
}

fn parsed<G, T>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    let Some(value) = get(var) else {
        return Ok(default);
    };
    value.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
        var,
        reason: err.to_string(),
        value,
    })
}
