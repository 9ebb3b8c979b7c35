use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration tree, loaded from `mediarch.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub providers: Vec<ProviderTomlConfig>,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub gc: GcConfig,

    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/mediarch.sqlite3")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_root")]
    pub root: PathBuf,
}

fn default_cache_root() -> PathBuf {
    PathBuf::from("./data/cache")
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: default_cache_root(),
        }
    }
}

/// One provider's section of `mediarch.toml`. Persisted into `provider_config`
/// on first load; subsequent reads go through the database so that
/// `testConnection` results and runtime toggles survive config reloads.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderTomlConfig {
    pub name: String,

    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en-US".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Fraction of a provider's bucket capacity held back for webhook-priority
    /// requests so background fetches cannot starve them.
    #[serde(default = "default_webhook_reserved")]
    pub webhook_reserved: f64,

    /// Ceiling, in seconds, on the reactive-backoff suspension applied after
    /// repeated HTTP 429 responses.
    #[serde(default = "default_backoff_ceiling_secs")]
    pub backoff_ceiling_secs: u64,
}

fn default_webhook_reserved() -> f64 {
    0.1
}

fn default_backoff_ceiling_secs() -> u64 {
    300
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            webhook_reserved: default_webhook_reserved(),
            backoff_ceiling_secs: default_backoff_ceiling_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_reset_timeout_secs")]
    pub reset_timeout_secs: u64,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_reset_timeout_secs() -> u64 {
    300
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_secs: default_reset_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_file_scanner_interval")]
    pub file_scanner_interval_hours: u32,

    #[serde(default = "default_provider_updater_interval")]
    pub provider_updater_interval_hours: u32,

    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

fn default_file_scanner_interval() -> u32 {
    6
}

fn default_provider_updater_interval() -> u32 {
    24
}

fn default_tick_interval_secs() -> u64 {
    60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            file_scanner_interval_hours: default_file_scanner_interval(),
            provider_updater_interval_hours: default_provider_updater_interval(),
            tick_interval_secs: default_tick_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GcConfig {
    /// Hour of day (local, 0-23) the garbage collector runs at.
    #[serde(default = "default_gc_hour")]
    pub run_at_hour: u32,

    /// Grace period, in days, soft-deleted movies sit before permanent purge.
    #[serde(default = "default_soft_delete_grace_days")]
    pub soft_delete_grace_days: i64,
}

fn default_gc_hour() -> u32 {
    3
}

fn default_soft_delete_grace_days() -> i64 {
    30
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            run_at_hour: default_gc_hour(),
            soft_delete_grace_days: default_soft_delete_grace_days(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub players: Vec<MediaPlayerConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaPlayerConfig {
    pub name: String,
    pub url: String,
    pub api_key: String,

    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
