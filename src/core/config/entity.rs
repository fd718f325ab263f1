use super::constant::*;
use crate::{
    base::{check_validity_for_reuse_statistic, ResourceType},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `AppConfig` names the running service for diagnostics/rule-source tagging.
#[derive(Serialize, Deserialize, Debug)]
pub struct AppConfig {
    pub app_name: String,
    pub app_type: ResourceType,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            app_name: DEFAULT_APP_NAME.into(),
            app_type: DEFAULT_APP_TYPE.into(),
        }
    }
}

/// `LogConfig` represents the configuration of logging in Sentinel: the
/// backend configuration file path, consumed by `logging::logger_init`.
#[derive(Serialize, Deserialize, Debug)]
pub struct LogConfig {
    pub config_file: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            config_file: LOG_CONFIG_FILE.into(),
        }
    }
}

/// `SystemStatConfig` represents the configuration of the system metric
/// collector (component 4.I).
#[derive(Serialize, Deserialize, Debug)]
pub struct SystemStatConfig {
    pub system_interval_ms: u32,
    pub load_interval_ms: u32,
    pub cpu_interval_ms: u32,
    pub memory_interval_ms: u32,
}

impl Default for SystemStatConfig {
    fn default() -> Self {
        SystemStatConfig {
            system_interval_ms: SYSTEM_INTERVAL_MS,
            load_interval_ms: LOAD_INTERVAL_MS,
            cpu_interval_ms: CPU_INTERVAL_MS,
            memory_interval_ms: MEMORY_INTERVAL_MS,
        }
    }
}

/// `StatConfig` represents configuration items related to statistics.
#[derive(Serialize, Deserialize, Debug)]
pub struct StatConfig {
    /// Global default statistic sliding window config.
    pub sample_count_total: u32,
    pub interval_ms_total: u32,
    /// Per-resource default read-only metric statistic; must be reusable
    /// against the global statistic above.
    pub sample_count: u32,
    pub interval_ms: u32,
    pub system: SystemStatConfig,
}

impl Default for StatConfig {
    fn default() -> Self {
        use crate::base::{
            DEFAULT_INTERVAL_MS, DEFAULT_INTERVAL_MS_TOTAL, DEFAULT_SAMPLE_COUNT,
            DEFAULT_SAMPLE_COUNT_TOTAL,
        };
        StatConfig {
            sample_count_total: DEFAULT_SAMPLE_COUNT_TOTAL,
            interval_ms_total: DEFAULT_INTERVAL_MS_TOTAL,
            sample_count: DEFAULT_SAMPLE_COUNT,
            interval_ms: DEFAULT_INTERVAL_MS,
            system: SystemStatConfig::default(),
        }
    }
}

/// `SentinelConfig` is the general configuration of Sentinel.
#[derive(Serialize, Deserialize, Debug)]
pub struct SentinelConfig {
    pub app: AppConfig,
    pub log: LogConfig,
    pub stat: StatConfig,
    /// Whether to serve `curr_time_millis()` from the background ticker
    /// cache rather than a direct syscall. `true` by default.
    pub use_cache_time: bool,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        SentinelConfig {
            use_cache_time: true,
            app: AppConfig::default(),
            log: LogConfig::default(),
            stat: StatConfig::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ConfigEntity {
    pub version: String,
    pub config: SentinelConfig,
}

impl Default for ConfigEntity {
    fn default() -> Self {
        ConfigEntity {
            version: SENTINEL_VERSION.into(),
            config: SentinelConfig::default(),
        }
    }
}

impl ConfigEntity {
    pub fn new() -> Self {
        ConfigEntity::default()
    }

    pub fn check(&self) -> Result<()> {
        if self.version.is_empty() {
            return Err(Error::msg("empty version"));
        }
        if self.config.app.app_name.is_empty() {
            return Err(Error::msg("empty app name"));
        }
        check_validity_for_reuse_statistic(
            self.config.stat.sample_count,
            self.config.stat.interval_ms,
            self.config.stat.sample_count_total,
            self.config.stat.interval_ms_total,
        )?;
        Ok(())
    }
}

impl fmt::Display for ConfigEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmtted = serde_json::to_string_pretty(self).unwrap();
        write!(f, "{}", fmtted)
    }
}
