//! mssql-ct-replicate CLI - SQL Server change-tracking replication.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use mssql_ct_replicate::{Config, Orchestrator, ReplicateError};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "mssql-ct-replicate")]
#[command(about = "Replicate SQL Server change-tracking deltas to one or more destinations")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "replication.yaml")]
    config: PathBuf,

    /// Log planned statements without touching any destination
    #[arg(long)]
    dry_run: bool,

    /// Output JSON run report to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

/// Returns whether the run completed without any destination erroring.
async fn run() -> Result<bool, ReplicateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    let report = Orchestrator::new(config, cli.dry_run).run().await;

    if cli.output_json {
        println!("{}", report.to_json()?);
    } else {
        let status_msg = if cli.dry_run {
            "Dry run completed"
        } else if report.failed {
            "Replication completed with errors"
        } else {
            "Replication completed"
        };
        println!("\n{}", status_msg);
        println!("  Run ID: {}", report.run_id);
        println!("  Duration: {:.2}s", report.duration_seconds);
        println!("  Sets: {}", report.sets_total);
        println!(
            "  Destinations: {} synced, {} skipped, {} failed",
            report.destinations_synced, report.destinations_skipped, report.destinations_failed
        );
        println!(
            "  Changes: {} extracted, {} applied",
            report.changes_extracted, report.changes_applied
        );
        for err in &report.errors {
            println!("  Error: {}", err);
        }
    }

    Ok(!report.failed)
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
