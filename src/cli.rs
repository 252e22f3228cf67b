//! Command-line interface definition using clap
//!
//! Provides structured argument parsing with automatic help generation.

use crate::config::Config;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

// =============================================================================
// CLI Definition
// =============================================================================

/// Heartbeat and liveness monitor for Cube Touch devices
#[derive(Parser, Debug, Default)]
#[command(name = "cube-heartbeat")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (default: config.toml next to the binary or in the cwd)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Print one JSON object per status update instead of a table
    #[arg(long, global = true)]
    pub json: bool,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Settings that take precedence over the config file
#[derive(Args, Debug, Default, Clone, PartialEq)]
pub struct Overrides {
    /// UDP port to listen for heartbeats on
    #[arg(long, value_name = "PORT", global = true)]
    pub port: Option<u16>,

    /// Local address to bind
    #[arg(long, value_name = "ADDR", global = true)]
    pub bind: Option<String>,

    /// Silence (ms) after which a device is marked offline
    #[arg(long, value_name = "MS", global = true)]
    pub timeout_ms: Option<u64>,

    /// Disable latency probing
    #[arg(long, global = true)]
    pub no_probe: bool,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Monitor the fleet until interrupted (default)
    Run,

    /// Print the effective configuration as TOML and exit
    PrintConfig,
}

impl Cli {
    /// Subcommand to run, `run` when none was given
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }
}

impl Overrides {
    /// Apply command-line values on top of a loaded config
    pub fn apply(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.liveness.timeout_ms = timeout_ms;
        }
        if self.no_probe {
            config.probe.enabled = false;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_defaults() {
        let cli = Cli::parse_from(["cube-heartbeat"]);
        assert!(!cli.verbose);
        assert!(cli.config.is_none());
        assert!(cli.command.is_none());
        assert_eq!(cli.command(), Command::Run);
        assert!(!cli.json);
        assert_eq!(cli.overrides, Overrides::default());
    }

    #[test]
    fn test_cli_parse_verbose() {
        let cli = Cli::parse_from(["cube-heartbeat", "-v"]);
        assert!(cli.verbose);

        let cli = Cli::parse_from(["cube-heartbeat", "run", "--verbose"]);
        assert!(cli.verbose);
    }

    #[test]
    fn test_cli_parse_run_json() {
        let cli = Cli::parse_from(["cube-heartbeat", "run", "--json", "--port", "1600"]);
        assert_eq!(cli.command(), Command::Run);
        assert!(cli.json);
        assert_eq!(cli.overrides.port, Some(1600));

        let cli = Cli::parse_from(["cube-heartbeat", "--json"]);
        assert!(cli.json);
    }

    #[test]
    fn test_cli_parse_print_config() {
        let cli = Cli::parse_from(["cube-heartbeat", "print-config", "--no-probe"]);
        assert_eq!(cli.command(), Command::PrintConfig);
        assert!(cli.overrides.no_probe);
    }

    #[test]
    fn test_cli_parse_config_path() {
        let cli = Cli::parse_from(["cube-heartbeat", "--config", "/etc/cube.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/cube.toml")));
    }

    #[test]
    fn test_cli_rejects_bad_port() {
        assert!(Cli::try_parse_from(["cube-heartbeat", "--port", "99999"]).is_err());
    }

    #[test]
    fn test_overrides_apply() {
        let cli = Cli::parse_from([
            "cube-heartbeat",
            "--port",
            "1600",
            "--bind",
            "127.0.0.1",
            "--timeout-ms",
            "5000",
            "--no-probe",
        ]);
        let mut config = Config::default();

        cli.overrides.apply(&mut config);

        assert_eq!(config.listener.port, 1600);
        assert_eq!(config.listener.bind_address, "127.0.0.1");
        assert_eq!(config.liveness.timeout_ms, 5000);
        assert!(!config.probe.enabled);
    }

    #[test]
    fn test_overrides_empty_keeps_config() {
        let mut config = Config::default();
        Overrides::default().apply(&mut config);
        assert_eq!(config, Config::default());
    }
}
