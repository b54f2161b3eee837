//! # Horizon World Server - Main Entry Point
//!
//! Hosts a [`horizon_world::MapManager`], ticks it on a fixed interval and tears
//! it down on shutdown. This entry point handles CLI parsing, configuration
//! loading and the application lifecycle.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration (writes world.toml when missing)
//! world_server
//!
//! # Custom configuration and spawn data
//! world_server --config production.toml --spawns spawns.json
//!
//! # Faster ticks and JSON logs
//! world_server --tick-ms 25 --json-logs --log-level debug
//! ```
//!
//! ## Signal Handling
//!
//! SIGINT/SIGTERM (Ctrl+C on Windows) stop the tick loop after its current tick,
//! then every map is unloaded and pending respawn times are flushed. A second
//! signal exits at once.

use tracing::error;

mod app;
mod cli;
mod config;
mod logging;
mod shutdown;
mod sink;

use app::Application;
use cli::CliArgs;
use config::AppConfig;

/// Runs the server until shutdown.
///
/// # Exit Codes
///
/// * **0**: Successful execution and shutdown
/// * **1**: Error during startup, configuration, or runtime
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let mut config = AppConfig::load_from_file(&args.config_path).await.unwrap_or_default();
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    if let Err(e) = logging::setup_logging(&config.logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}

pub use config::{LoggingSettings, ServerSettings};
pub use sink::TracingPacketSink;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_config_builds_application() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());

        let app = Application::from_config(config).expect("default config starts");
        assert_eq!(app.manager().map_count(), 1);
        app.tick(50).await.expect("tick runs");
        assert_eq!(app.manager().stats().totals.ticks, 1);
    }
}
