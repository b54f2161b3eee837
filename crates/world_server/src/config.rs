//! Configuration management for the world server.
//!
//! The TOML file has three sections: `[server]` for the host loop, `[logging]`
//! for the subscriber and `[world]` for the world core itself.

use horizon_world::WorldConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

fn default_tick_interval() -> u64 {
    50 // 20 ticks per second
}

fn default_stats_interval() -> u64 {
    60
}

fn default_maps() -> Vec<u32> {
    vec![0]
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Host loop settings
    #[serde(default)]
    pub server: ServerSettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
    /// World core settings, passed through unchanged
    #[serde(default)]
    pub world: WorldConfig,
}

/// Host loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// World tick interval in milliseconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Seconds between statistics reports (0 to disable)
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
    /// JSON spawn data file. Without one every map starts empty.
    #[serde(default)]
    pub spawn_data: Option<String>,
    /// Continents created at startup
    #[serde(default = "default_maps")]
    pub maps: Vec<u32>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            stats_interval_secs: default_stats_interval(),
            spawn_data: None,
            maps: default_maps(),
        }
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, writes the default configuration there and
    /// returns it.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("📝 Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Spawn data path, if configured.
    pub fn spawn_data_path(&self) -> Option<PathBuf> {
        self.server.spawn_data.as_ref().map(PathBuf::from)
    }

    /// Validates the configuration for consistency and correctness.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.tick_interval_ms == 0 {
            return Err("server.tick_interval_ms must be greater than 0".to_string());
        }

        if self.server.maps.is_empty() {
            return Err("server.maps must name at least one map".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        self.world.validate().map_err(|e| format!("world: {e}"))
    }
}
