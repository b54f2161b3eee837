//! Command-line interface handling for the world server.
//!
//! Every option overrides the matching setting of the configuration file.

use clap::{Arg, ArgMatches, Command};
use std::ffi::OsString;
use std::path::PathBuf;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for the spawn data file
    pub spawn_path: Option<PathBuf>,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Optional override for the tick interval in milliseconds
    pub tick_ms: Option<u64>,
}

fn command() -> Command {
    Command::new("Horizon World Server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Grid-streamed world maps with differential replication")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("world.toml"),
        )
        .arg(
            Arg::new("spawns")
                .short('s')
                .long("spawns")
                .value_name("FILE")
                .help("Spawn data file (JSON)"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("tick-ms")
                .short('t')
                .long("tick-ms")
                .value_name("MS")
                .help("World tick interval in milliseconds")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

impl CliArgs {
    /// Parses the process arguments. Exits with usage on invalid input.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    /// Parses an explicit argument list, first item being the binary name.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = command().try_get_matches_from(args)?;
        Ok(Self::from_matches(&matches))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("world.toml")),
            spawn_path: matches.get_one::<String>("spawns").map(PathBuf::from),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            tick_ms: matches.get_one::<u64>("tick-ms").copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_arguments() {
        let args = CliArgs::try_parse_from(["world_server"]).unwrap();
        assert_eq!(args.config_path, PathBuf::from("world.toml"));
        assert!(args.spawn_path.is_none());
        assert!(!args.json_logs);
        assert!(args.tick_ms.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let args = CliArgs::try_parse_from([
            "world_server",
            "--config",
            "prod.toml",
            "-s",
            "spawns.json",
            "--log-level",
            "debug",
            "--json-logs",
            "--tick-ms",
            "25",
        ])
        .unwrap();
        assert_eq!(args.config_path, PathBuf::from("prod.toml"));
        assert_eq!(args.spawn_path, Some(PathBuf::from("spawns.json")));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.json_logs);
        assert_eq!(args.tick_ms, Some(25));
    }

    #[test]
    fn zero_tick_is_rejected() {
        assert!(CliArgs::try_parse_from(["world_server", "--tick-ms", "0"]).is_err());
    }
}
