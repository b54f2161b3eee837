//! Tracing setup for the world server.
//!
//! The configured level applies to the server and the world core. Everything else
//! (tokio, rayon) stays at `warn` so per-tick debug output is not buried. `RUST_LOG`
//! replaces the whole filter when set.

use crate::config::LoggingSettings;
use tracing::info;
use tracing_subscriber::{filter::ParseError, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Crates whose output follows the configured level.
const WORLD_TARGETS: [&str; 3] = ["horizon_world", "lib_world_server", "world_server"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// JSON when either the file or the command line asks for it.
    pub fn select(settings: &LoggingSettings, json_override: bool) -> Self {
        if json_override || settings.json_format {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Filter directives for `level`, e.g. `warn,horizon_world=debug,...`.
pub fn filter_directives(level: &str) -> String {
    let mut directives = String::from("warn");
    for target in WORLD_TARGETS {
        directives.push_str(&format!(",{target}={level}"));
    }
    directives
}

fn world_filter(level: &str) -> Result<EnvFilter, ParseError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(filter_directives(level)),
    }
}

/// Installs the global subscriber.
pub fn setup_logging(settings: &LoggingSettings, json_override: bool) -> Result<(), Box<dyn std::error::Error>> {
    let filter = world_filter(&settings.level)?;
    let format = LogFormat::select(settings, json_override);
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false).with_thread_names(true))
            .try_init()?,
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(false).with_thread_names(true))
            .try_init()?,
    }

    info!("🔧 Logging initialized ({:?}, world level {})", format, settings.level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_crates_follow_configured_level() {
        let directives = filter_directives("debug");
        assert!(directives.starts_with("warn,"));
        for target in WORLD_TARGETS {
            assert!(directives.contains(&format!("{target}=debug")));
        }
        assert!(EnvFilter::try_new(directives).is_ok());
    }

    #[test]
    fn test_json_from_either_source() {
        let mut settings = LoggingSettings::default();
        assert_eq!(LogFormat::select(&settings, false), LogFormat::Pretty);
        assert_eq!(LogFormat::select(&settings, true), LogFormat::Json);
        settings.json_format = true;
        assert_eq!(LogFormat::select(&settings, false), LogFormat::Json);
    }
}
