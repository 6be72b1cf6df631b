//! `cvault` - CLI for crashvault
//!
//! This binary provides command-line tooling over the on-disk crash report
//! store: listing crash files, retention statistics, and pruning.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use chrono::{TimeZone, Utc};
use clap::Parser;

use crashvault::cli::{Cli, Command, ConfigCommand, ListCommand, OutputFormat, PruneCommand};
use crashvault::repository::MAX_RETAINED_CRASHES;
use crashvault::{init_logging, Config, CrashReportRepository, SortOrder};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;
    let repository = CrashReportRepository::new(vec![config.crash_dir()]);

    // Execute the command
    match cli.command {
        Command::List(list_cmd) => handle_list(&repository, &list_cmd),
        Command::Stats(stats_cmd) => handle_stats(&config, &repository, stats_cmd.json),
        Command::Prune(prune_cmd) => {
            handle_prune(&repository, &prune_cmd);
            Ok(())
        }
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

fn format_timestamp(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map_or_else(|| timestamp_ms.to_string(), |t| t.to_rfc3339())
}

fn handle_list(
    repository: &CrashReportRepository,
    cmd: &ListCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    let order = if cmd.oldest_first {
        SortOrder::OldestFirst
    } else {
        SortOrder::NewestFirst
    };
    let crashes = repository.list_crash_files(order);

    match cmd.format {
        OutputFormat::Json => {
            let entries: Vec<_> = crashes
                .iter()
                .map(|crash| {
                    serde_json::json!({
                        "path": crash.path,
                        "timestamp_ms": crash.timestamp_ms,
                        "session_id": crash.session_id,
                        "pid": crash.pid,
                        "foreground": crash.foreground,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Plain => {
            for crash in &crashes {
                println!("{}", crash.path.display());
            }
        }
        OutputFormat::Table => {
            if crashes.is_empty() {
                println!("No crash files found.");
                return Ok(());
            }
            println!(
                "{:<26} {:<34} {:>7}  {}",
                "TIMESTAMP", "SESSION", "PID", "STATE"
            );
            for crash in &crashes {
                println!(
                    "{:<26} {:<34} {:>7}  {}",
                    format_timestamp(crash.timestamp_ms),
                    crash.session_id.as_deref().unwrap_or("-"),
                    crash.pid,
                    if crash.foreground {
                        "foreground"
                    } else {
                        "background"
                    }
                );
            }
        }
    }
    Ok(())
}

fn handle_stats(
    config: &Config,
    repository: &CrashReportRepository,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let stats = repository.stats();
    if json {
        let status = serde_json::json!({
            "crash_dir": config.crash_dir(),
            "retention_cap": MAX_RETAINED_CRASHES,
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("cvault stats");
        println!("------------");
        println!("Crash dir:     {}", config.crash_dir().display());
        println!("Retention cap: {MAX_RETAINED_CRASHES}");
        println!("Crash files:   {}", stats.crash_files);
        println!("Error files:   {}", stats.error_files);
        println!("Map files:     {}", stats.map_files);
        println!("Orphans:       {}", stats.orphans);
    }
    Ok(())
}

fn handle_prune(repository: &CrashReportRepository, cmd: &PruneCommand) {
    let stats = repository.stats();
    let evictable = stats.crash_files.saturating_sub(MAX_RETAINED_CRASHES);

    if cmd.dry_run {
        println!(
            "Would delete {} crash file(s) beyond the retention cap and {} orphan file(s).",
            evictable, stats.orphans
        );
        return;
    }

    repository.enforce_retention();
    println!(
        "Pruned {} crash file(s) and {} orphan file(s).",
        evictable, stats.orphans
    );
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Native]");
                println!("  Enabled:            {}", config.native.enabled);
                println!(
                    "  Handler detection:  {}",
                    config.native.handler_detection_enabled
                );
                println!(
                    "  Deferred retrieval: {}",
                    config.native.deferred_retrieval
                );
                println!("  Dev logging:        {}", config.native.dev_logging);
                println!("  Crash dir:          {}", config.crash_dir().display());
                println!(
                    "  Marker file:        {}",
                    config.marker_file_path().display()
                );
                println!("  Symbols file:       {}", config.symbols_path().display());
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
