use clap::{Parser, Subcommand};
use std::path::PathBuf;
use triage_core::{Severity, TriageConfig};

mod commands;
mod logging;

use logging::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "triage", version, about = "Alert triage and ticket dispatch")]
struct Cli {
    /// Configuration file (YAML). Defaults apply when omitted.
    #[arg(long, short = 'c', global = true, env = "TRIAGE_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process alerts from a JSON array or JSON Lines file ("-" for stdin).
    Process {
        input: PathBuf,

        /// Alerts processed at the same time.
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },

    /// Search logs across all hosts and raise one alert per host with errors.
    Scan {
        /// How far back to scan, in minutes.
        #[arg(long)]
        window_minutes: Option<u64>,

        /// Search expression selecting error lines.
        #[arg(long)]
        query: Option<String>,

        /// Upper bound on matched lines.
        #[arg(long)]
        max_events: Option<usize>,
    },

    /// List recorded outcomes, newest first.
    List {
        #[arg(long)]
        host: Option<String>,

        /// Only outcomes with at least this priority.
        #[arg(long)]
        min_priority: Option<Severity>,

        /// Include duplicate outcomes.
        #[arg(long, default_value_t = false)]
        duplicates: bool,

        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Print full outcomes as JSON lines.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show the outcome and activity trail for one alert.
    Show {
        alert_id: String,
    },

    /// Summarize recorded outcomes.
    Stats {
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Run the built-in demo alerts against mock capabilities.
    Demo,

    /// Validate the configuration and print what it selects.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_format);

    let config = match &cli.config {
        Some(path) => TriageConfig::from_file(path)?,
        None => TriageConfig::default(),
    };

    match cli.cmd {
        Command::Process { input, concurrency } => {
            commands::process::run(&config, &input, concurrency).await?
        }
        Command::Scan {
            window_minutes,
            query,
            max_events,
        } => {
            let overrides = commands::scan::ScanOverrides {
                window_minutes,
                query,
                max_events,
            };
            commands::scan::run(&config, overrides).await?
        }
        Command::List {
            host,
            min_priority,
            duplicates,
            limit,
            json,
        } => {
            let filter = commands::query::list_filter(host, min_priority, duplicates, limit);
            commands::query::list(&config, &filter, json).await?
        }
        Command::Show { alert_id } => commands::query::show(&config, &alert_id).await?,
        Command::Stats { json } => commands::query::stats(&config, json).await?,
        Command::Demo => commands::demo::run().await?,
        Command::CheckConfig => commands::check::run(&config, cli.config.as_deref())?,
    }

    Ok(())
}
