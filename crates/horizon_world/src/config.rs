//! World Core Configuration
//!
//! This module provides configuration structures for grid streaming, visibility,
//! respawn persistence and the map manager's worker pool.

use crate::grid::SIZE_OF_GRIDS;
use serde::{Deserialize, Serialize};

/// Complete world core configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Grid streaming settings
    #[serde(default)]
    pub grid: GridConfig,
    /// Sight ranges and notification cadence
    #[serde(default)]
    pub visibility: VisibilityConfig,
    /// Respawn-time persistence
    #[serde(default)]
    pub respawn: RespawnConfig,
    /// Map manager settings
    #[serde(default)]
    pub manager: ManagerConfig,
}

/// Grid load/unload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// Idle time before an unobserved grid is unloaded (in milliseconds)
    pub grid_expiry_ms: u64,
    /// Master switch for idle unloading
    pub unload_enabled: bool,
    /// Grids within this distance of a player or always-active entity stay loaded
    pub activation_range: f32,
    /// Preload every grid when a map is created
    pub preload_all: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            grid_expiry_ms: 300_000, // 5 minutes
            unload_enabled: true,
            activation_range: SIZE_OF_GRIDS / 4.0,
            preload_all: false,
        }
    }
}

/// Visibility configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilityConfig {
    /// Default sight range between two entities
    pub visibility_distance: f32,
    /// Sight range of far-visible (world container) entities
    pub world_object_visibility_distance: f32,
    /// Minimum time between visibility recomputations (in milliseconds)
    pub notify_period_ms: u64,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            visibility_distance: 100.0,
            world_object_visibility_distance: 250.0,
            notify_period_ms: 0, // every tick
        }
    }
}

/// Respawn-time persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespawnConfig {
    /// Write respawn times to the store as soon as they change
    pub save_immediately: bool,
    /// Flush interval for delayed saves (in milliseconds)
    pub flush_interval_ms: u64,
}

impl Default for RespawnConfig {
    fn default() -> Self {
        Self {
            save_immediately: true,
            flush_interval_ms: 60_000, // 1 minute
        }
    }
}

/// Map manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Worker threads updating maps in parallel (0 = one per core)
    pub update_threads: usize,
    /// Upper bound on concurrently live instanced maps
    pub max_instances: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            update_threads: 0,
            max_instances: 1000,
        }
    }
}

/// Configuration builder for easier setup
pub struct WorldConfigBuilder {
    config: WorldConfig,
}

impl WorldConfigBuilder {
    /// Creates a new configuration builder with default values
    pub fn new() -> Self {
        Self {
            config: WorldConfig::default(),
        }
    }

    /// Sets grid expiry and whether idle grids unload at all
    pub fn with_grid_expiry(mut self, grid_expiry_ms: u64, unload_enabled: bool) -> Self {
        self.config.grid.grid_expiry_ms = grid_expiry_ms;
        self.config.grid.unload_enabled = unload_enabled;
        self
    }

    pub fn with_activation_range(mut self, range: f32) -> Self {
        self.config.grid.activation_range = range;
        self
    }

    pub fn with_preload(mut self, preload_all: bool) -> Self {
        self.config.grid.preload_all = preload_all;
        self
    }

    /// Sets the default and world-object sight ranges
    pub fn with_visibility(mut self, visibility_distance: f32, world_object_distance: f32) -> Self {
        self.config.visibility.visibility_distance = visibility_distance;
        self.config.visibility.world_object_visibility_distance = world_object_distance;
        self
    }

    pub fn with_notify_period(mut self, notify_period_ms: u64) -> Self {
        self.config.visibility.notify_period_ms = notify_period_ms;
        self
    }

    /// Chooses immediate or delayed respawn-time saves
    pub fn with_respawn_saves(mut self, save_immediately: bool, flush_interval_ms: u64) -> Self {
        self.config.respawn.save_immediately = save_immediately;
        self.config.respawn.flush_interval_ms = flush_interval_ms;
        self
    }

    pub fn with_update_threads(mut self, update_threads: usize) -> Self {
        self.config.manager.update_threads = update_threads;
        self
    }

    pub fn with_max_instances(mut self, max_instances: usize) -> Self {
        self.config.manager.max_instances = max_instances;
        self
    }

    /// Builds the final configuration
    pub fn build(self) -> WorldConfig {
        self.config
    }
}

impl Default for WorldConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Preset configurations for common use cases
pub mod presets {
    use super::*;

    /// Development configuration: short grid expiry so streaming is easy to observe
    pub fn development() -> WorldConfig {
        WorldConfigBuilder::new()
            .with_grid_expiry(30_000, true)
            .with_visibility(100.0, 250.0)
            .with_respawn_saves(true, 10_000)
            .with_update_threads(2)
            .build()
    }

    /// Testing configuration: deterministic, single worker, immediate expiry
    pub fn testing() -> WorldConfig {
        WorldConfigBuilder::new()
            .with_grid_expiry(0, true)
            .with_visibility(100.0, 250.0)
            .with_respawn_saves(true, 1_000)
            .with_update_threads(1)
            .with_max_instances(16)
            .build()
    }

    /// Production configuration: long grid expiry and batched respawn saves
    pub fn production() -> WorldConfig {
        WorldConfigBuilder::new()
            .with_grid_expiry(300_000, true)
            .with_visibility(100.0, 500.0)
            .with_respawn_saves(false, 60_000)
            .with_update_threads(0)
            .with_max_instances(5000)
            .build()
    }
}

/// Configuration validation
impl WorldConfig {
    /// Validates the configuration and returns any errors
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !self.grid.activation_range.is_finite() || self.grid.activation_range < 0.0 {
            return Err(ConfigValidationError::InvalidValue("activation_range must be >= 0.0".to_string()));
        }

        if !(self.visibility.visibility_distance > 0.0) {
            return Err(ConfigValidationError::InvalidValue("visibility_distance must be > 0.0".to_string()));
        }

        if self.visibility.world_object_visibility_distance < self.visibility.visibility_distance {
            return Err(ConfigValidationError::Conflict(
                "world_object_visibility_distance must be >= visibility_distance".to_string(),
            ));
        }

        if self.visibility.world_object_visibility_distance > SIZE_OF_GRIDS * 2.0 {
            return Err(ConfigValidationError::InvalidValue(format!(
                "world_object_visibility_distance cannot exceed {}",
                SIZE_OF_GRIDS * 2.0
            )));
        }

        if !self.respawn.save_immediately && self.respawn.flush_interval_ms == 0 {
            return Err(ConfigValidationError::MissingRequired(
                "flush_interval_ms is required when respawn saves are delayed".to_string(),
            ));
        }

        if self.manager.max_instances == 0 {
            return Err(ConfigValidationError::InvalidValue("max_instances must be > 0".to_string()));
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
    #[error("Conflicting configuration: {0}")]
    Conflict(String),
}
