//! Command-line interface for crashvault.
//!
//! This module provides the CLI structure and command handlers for the
//! `cvault` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{ConfigCommand, ListCommand, OutputFormat, PruneCommand, StatsCommand};

/// cvault - Inspect and maintain the native crash vault
///
/// Tooling over the on-disk crash report store: list recovered crash files,
/// show retention statistics, and prune evidence beyond the retention cap.
#[derive(Debug, Parser)]
#[command(name = "cvault")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List crash report files in the crash directory
    List(ListCommand),

    /// Show crash directory statistics
    Stats(StatsCommand),

    /// Enforce the retention cap and sweep orphan files
    Prune(PruneCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn stats_cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: Command::Stats(StatsCommand { json: false }),
        }
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "cvault");
    }

    #[test]
    fn test_verbosity_quiet() {
        assert_eq!(
            stats_cli(0, true).verbosity(),
            crate::logging::Verbosity::Quiet
        );
    }

    #[test]
    fn test_verbosity_normal() {
        assert_eq!(
            stats_cli(0, false).verbosity(),
            crate::logging::Verbosity::Normal
        );
    }

    #[test]
    fn test_verbosity_verbose() {
        assert_eq!(
            stats_cli(1, false).verbosity(),
            crate::logging::Verbosity::Verbose
        );
    }

    #[test]
    fn test_verbosity_trace() {
        assert_eq!(
            stats_cli(2, false).verbosity(),
            crate::logging::Verbosity::Trace
        );
    }

    #[test]
    fn test_cli_verify() {
        // Verify the CLI structure is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_list() {
        let cli = Cli::try_parse_from(["cvault", "list", "--oldest-first"]).unwrap();
        match cli.command {
            Command::List(cmd) => assert!(cmd.oldest_first),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_stats() {
        let cli = Cli::try_parse_from(["cvault", "stats"]).unwrap();
        assert!(matches!(cli.command, Command::Stats(_)));
    }

    #[test]
    fn test_parse_prune() {
        let cli = Cli::try_parse_from(["cvault", "prune", "--dry-run"]).unwrap();
        match cli.command {
            Command::Prune(cmd) => assert!(cmd.dry_run),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_config_validate() {
        let cli = Cli::try_parse_from(["cvault", "config", "validate"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Validate { .. })
        ));
    }

    #[test]
    fn test_parse_with_config() {
        let cli = Cli::try_parse_from(["cvault", "-c", "/custom/config.toml", "stats"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_with_verbose() {
        let cli = Cli::try_parse_from(["cvault", "-v", "stats"]).unwrap();
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_parse_with_quiet() {
        let cli = Cli::try_parse_from(["cvault", "-q", "stats"]).unwrap();
        assert!(cli.quiet);
    }
}
