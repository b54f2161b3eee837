//! Main application logic and lifecycle management.
//!
//! The `Application` owns the map manager and drives it: a tick task advances
//! every map on a fixed interval, a monitoring task reports statistics, and the
//! main task waits for a shutdown signal before tearing the world down.

use crate::{
    cli::CliArgs,
    config::AppConfig,
    shutdown::{wait_for_signal, Shutdown, ShutdownListener},
    sink::TracingPacketSink,
};
use horizon_world::{InMemorySpawnStore, ManagerStats, MapManager, WorldServices};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Ticks slower than this many intervals are reported.
const SLOW_TICK_FACTOR: u32 = 2;

/// How long the tick task gets to finish its current tick on shutdown.
const TICK_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Application {
    config: AppConfig,
    manager: Arc<MapManager>,
    sink: Arc<TracingPacketSink>,
}

impl Application {
    /// Loads configuration, applies CLI overrides, validates, loads spawn data and
    /// creates the configured continents.
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(spawn_path) = args.spawn_path {
            config.server.spawn_data = Some(spawn_path.to_string_lossy().to_string());
        }
        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }
        if let Some(tick_ms) = args.tick_ms {
            config.server.tick_interval_ms = tick_ms;
        }

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner();
        Self::from_config(config)
    }

    /// Builds the world from an already validated configuration.
    pub fn from_config(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store = match config.spawn_data_path() {
            Some(path) => InMemorySpawnStore::from_json_file(&path)?,
            None => {
                warn!("⚠️ No spawn data configured; maps start empty");
                InMemorySpawnStore::new()
            }
        };

        let sink = Arc::new(TracingPacketSink::new());
        let services = WorldServices::new(Arc::new(store), sink.clone(), config.world.clone());
        let manager = Arc::new(MapManager::new(services)?);
        for &map_id in &config.server.maps {
            manager.create_map(map_id)?;
            info!("🗺️ Map {} created", map_id);
        }

        Ok(Self { config, manager, sink })
    }

    pub fn manager(&self) -> &Arc<MapManager> {
        &self.manager
    }

    /// Advances every map by `diff_ms` on a blocking thread.
    pub async fn tick(&self, diff_ms: u64) -> Result<(), tokio::task::JoinError> {
        let manager = Arc::clone(&self.manager);
        tokio::task::spawn_blocking(move || manager.update(diff_ms)).await
    }

    /// Runs until SIGINT or SIGTERM, then unloads every map. A second signal
    /// during the unload exits the process at once.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        self.run_until(async {
            match wait_for_signal().await {
                Ok(signal) => info!("📡 Received {} - initiating graceful shutdown", signal),
                Err(e) => error!("❌ Signal handler failed, shutting down: {e}"),
            }
            tokio::spawn(async {
                if wait_for_signal().await.is_ok() {
                    warn!("Shutdown signal received again, exiting without unloading maps");
                    std::process::exit(1);
                }
            });
        })
        .await
    }

    /// Ticks the world until `stop` resolves, then lets the running tick finish,
    /// unloads every map and flushes respawn times.
    pub async fn run_until(self, stop: impl Future<Output = ()>) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting Horizon World Server");
        self.log_configuration_summary();

        let shutdown = Shutdown::new();
        let tick_handle = self.spawn_tick_task(shutdown.subscribe());
        let monitoring_handle = self.spawn_monitoring_task(shutdown.subscribe());

        info!("✅ Horizon World Server is now running!");
        stop.await;

        shutdown.trigger();
        if let Some(handle) = monitoring_handle {
            let _ = handle.await;
        }
        match tokio::time::timeout(TICK_DRAIN_TIMEOUT, tick_handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("❌ Tick task failed: {:?}", e),
            Err(_) => warn!("⏰ Tick task did not stop within {:?}", TICK_DRAIN_TIMEOUT),
        }

        info!("🧹 Unloading maps and flushing respawn times...");
        log_statistics(&self.manager.stats(), &self.sink);
        let manager = Arc::clone(&self.manager);
        tokio::task::spawn_blocking(move || manager.shutdown()).await?;

        info!("✅ Horizon World Server shutdown complete");
        Ok(())
    }

    fn spawn_tick_task(&self, mut stopped: ShutdownListener) -> JoinHandle<()> {
        let manager = Arc::clone(&self.manager);
        let tick_interval = Duration::from_millis(self.config.server.tick_interval_ms);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut last = Instant::now();
            loop {
                tokio::select! {
                    _ = stopped.triggered() => break,
                    _ = interval.tick() => {}
                }
                let now = Instant::now();
                let diff_ms = now.duration_since(last).as_millis() as u64;
                last = now;

                let manager = Arc::clone(&manager);
                let started = Instant::now();
                if let Err(e) = tokio::task::spawn_blocking(move || manager.update(diff_ms)).await {
                    error!("❌ World tick panicked: {:?}", e);
                    break;
                }
                let elapsed = started.elapsed();
                if elapsed > tick_interval * SLOW_TICK_FACTOR {
                    warn!("🐢 Slow world tick: {:?} (interval {:?})", elapsed, tick_interval);
                }
            }
        })
    }

    fn spawn_monitoring_task(&self, mut stopped: ShutdownListener) -> Option<JoinHandle<()>> {
        if self.config.server.stats_interval_secs == 0 {
            return None;
        }
        let manager = Arc::clone(&self.manager);
        let sink = Arc::clone(&self.sink);
        let period = Duration::from_secs(self.config.server.stats_interval_secs);
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = stopped.triggered() => break,
                    _ = interval.tick() => log_statistics(&manager.stats(), &sink),
                }
            }
        }))
    }

    fn log_configuration_summary(&self) {
        let world = &self.config.world;
        info!("📋 Configuration Summary:");
        info!("  ⏱️ Tick interval: {}ms", self.config.server.tick_interval_ms);
        info!("  🗺️ Maps: {:?}", self.config.server.maps);
        info!(
            "  🧱 Grid expiry: {}ms (unloading {})",
            world.grid.grid_expiry_ms,
            if world.grid.unload_enabled { "enabled" } else { "disabled" }
        );
        info!(
            "  👁️ Visibility: {} / {} (world objects)",
            world.visibility.visibility_distance, world.visibility.world_object_visibility_distance
        );
    }
}

fn display_banner() {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("UNK");
    info!("🌍 Horizon World Server v{}", version);
    info!("   🧱 grid streaming | 📡 differential replication | ⚡ parallel map updates");
}

fn log_statistics(stats: &ManagerStats, sink: &TracingPacketSink) {
    let totals = &stats.totals;
    info!(
        "📊 World Health - {} maps ({} instances) | {} grids | {} objects | {} players",
        stats.maps, stats.instances, totals.loaded_grids, totals.residents, totals.players
    );
    info!(
        "📡 Replication - {} packets | {} blocks | {} bytes (sink saw {} packets)",
        totals.packets_sent,
        totals.blocks_sent,
        totals.bytes_sent,
        sink.packets()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use horizon_world::{EntityKind, MapKey, Position, WorldObject};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_application_from_file_creates_maps() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("world.toml");
        tokio::fs::write(&config_path, "[server]\nmaps = [0, 1]\ntick_interval_ms = 20\n")
            .await
            .unwrap();

        let args = CliArgs {
            config_path,
            spawn_path: None,
            log_level: Some("debug".to_string()),
            json_logs: false,
            tick_ms: Some(40),
        };
        let app = Application::new(args).await.unwrap();
        assert_eq!(app.config.server.tick_interval_ms, 40);
        assert_eq!(app.config.logging.level, "debug");
        assert_eq!(app.manager().map_count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_override_is_rejected() {
        let dir = TempDir::new().unwrap();
        let args = CliArgs {
            config_path: dir.path().join("world.toml"),
            spawn_path: None,
            log_level: Some("chatty".to_string()),
            json_logs: false,
            tick_ms: None,
        };
        assert!(Application::new(args).await.is_err());
    }

    #[tokio::test]
    async fn test_run_ticks_until_stopped_then_unloads() {
        let mut config = AppConfig::default();
        config.server.tick_interval_ms = 10;
        config.server.stats_interval_secs = 1;
        let app = Application::from_config(config).unwrap();
        let manager = Arc::clone(app.manager());

        let observer = Arc::clone(&manager);
        let ticks_before_stop = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let seen = Arc::clone(&ticks_before_stop);
        let stop = async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            seen.store(observer.stats().totals.ticks, std::sync::atomic::Ordering::SeqCst);
        };
        tokio::time::timeout(Duration::from_secs(10), app.run_until(stop))
            .await
            .unwrap()
            .unwrap();

        assert!(ticks_before_stop.load(std::sync::atomic::Ordering::SeqCst) > 0);
        assert_eq!(manager.map_count(), 0);
    }

    #[tokio::test]
    async fn test_spawn_file_populates_maps() {
        let dir = TempDir::new().unwrap();
        let spawns = dir.path().join("spawns.json");
        tokio::fs::write(
            &spawns,
            r#"{"creatures": [{"spawn_id": 1, "map_id": 0, "entry": 300,
                "position": {"x": 100.0, "y": 100.0, "z": 0.0, "orientation": 0.0}}]}"#,
        )
        .await
        .unwrap();

        let mut config = AppConfig::default();
        config.server.spawn_data = Some(spawns.to_string_lossy().to_string());
        let app = Application::from_config(config).unwrap();

        let creature = app
            .manager()
            .with_map(MapKey::continent(0), |map| {
                let guid = map.generate_guid(EntityKind::Player, 0);
                map.add_to_map(WorldObject::player(guid, "Ana", Position::new(100.0, 120.0, 0.0)))
                    .unwrap();
                map.creature_by_spawn_id(1).map(WorldObject::guid)
            })
            .unwrap();
        assert!(creature.is_some());

        app.tick(50).await.unwrap();
        app.tick(50).await.unwrap();
        assert!(app.sink.packets() >= 1);
        assert_eq!(app.manager().stats().totals.ticks, 2);
    }
}
