use access_core::config::{self as core_config, get_env, parse_env};
use access_core::error::AppError;
use secrecy::Secret;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AccessConfig {
    pub common: core_config::Config,
    pub store: StoreConfig,
    pub auth: AuthConfig,
    pub device: DeviceConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub mongodb_uri: String,
    pub mongodb_database: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: Secret<String>,
    pub cache_window_secs: u64,
    /// Principal ids allowed to administer the platform itself (e.g. the
    /// platform-wide alert feed).
    pub platform_admins: Vec<String>,
}

impl AuthConfig {
    pub fn cache_window(&self) -> Duration {
        Duration::from_secs(self.cache_window_secs)
    }
}

#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub controller_url: String,
    pub sync_timeout_secs: u64,
}

impl DeviceConfig {
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub tick_secs: u64,
}

impl SchedulerConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }
}

impl AccessConfig {
    pub fn load() -> Result<Self, AppError> {
        // Common config handles .env and the APP__ prefix.
        let common = core_config::Config::load()?;

        let is_prod = core_config::is_prod();

        Ok(AccessConfig {
            common,
            store: StoreConfig {
                backend: get_env("STORE_BACKEND", Some("mongo"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
                mongodb_uri: get_env("MONGODB_URI", Some("mongodb://localhost:27017"), is_prod)?,
                mongodb_database: get_env("MONGODB_DATABASE", Some("access_db"), is_prod)?,
            },
            auth: AuthConfig {
                jwt_secret: Secret::new(get_env("JWT_SECRET", Some("dev-secret"), is_prod)?),
                cache_window_secs: parse_env("AUTH_CACHE_WINDOW_SECS", 60)?,
                platform_admins: env::var("PLATFORM_ADMINS")
                    .unwrap_or_default()
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            },
            device: DeviceConfig {
                controller_url: get_env(
                    "DEVICE_CONTROLLER_URL",
                    Some("http://localhost:9500"),
                    is_prod,
                )?,
                sync_timeout_secs: parse_env("DEVICE_SYNC_TIMEOUT_SECS", 5)?,
            },
            scheduler: SchedulerConfig {
                enabled: parse_env("SCHEDULER_ENABLED", true)?,
                tick_secs: parse_env("SCHEDULER_TICK_SECS", 30)?,
            },
        })
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongo" => Ok(StoreBackend::Mongo),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!("Invalid store backend: {}", s)),
        }
    }
}
