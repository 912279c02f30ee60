use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// Settings every service carries regardless of domain. Domain-specific
/// settings live in the service's own config layered on top of this one.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Loads from an optional `configuration` file with `APP__`-prefixed
    /// environment variables taking precedence. `.env` is read first so
    /// local overrides work without exporting anything.
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

/// True when `ENVIRONMENT=prod`. Production deployments must set every
/// variable explicitly; the dev defaults below do not apply there.
pub fn is_prod() -> bool {
    env::var("ENVIRONMENT")
        .map(|v| v == "prod")
        .unwrap_or(false)
}

/// Reads `key`, falling back to `default` outside production.
pub fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

/// Reads and parses `key`, falling back to `default` when unset. An unset
/// variable is fine; a set-but-unparseable one is a hard error.
pub fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(val) => val
            .parse()
            .map_err(|_| AppError::ConfigError(anyhow::anyhow!("{} is not valid: {}", key, val))),
        Err(_) => Ok(default),
    }
}
