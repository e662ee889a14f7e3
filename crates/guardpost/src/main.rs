//! Guardpost findings monitor.
//!
//! One-shot incremental pipeline, meant to be invoked by an external
//! scheduler: scan the findings store for objects newer than the last
//! recorded run, alert on each, advance the watermark.

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::error;

use guardpost::checkpoint::CheckpointStore;
use guardpost::config::{self, RunConfig};
use guardpost::dispatch::{AlertChannel, CommandChannel, Dispatcher, UnconfiguredChannel};
use guardpost::logging::{init_logging, LogConfig};
use guardpost::pipeline::{self, RunReport};
use guardpost::store::DirStore;

/// Exit code for a run that finished but skipped at least one item.
const EXIT_PARTIAL: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "guardpost", about = "Incremental security findings monitor", version)]
struct Cli {
    /// Verbose console logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Skip the log file, log to stderr only
    #[arg(long, global = true)]
    no_log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the pipeline once: scan, alert, advance the watermark
    Run(RunConfig),
    /// Show resolved paths and checkpoint state
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(LogConfig {
        app_name: "guardpost",
        verbose: cli.verbose,
        log_to_file: !cli.no_log_file,
    }) {
        eprintln!("Failed to initialize logging: {err:#}");
        return ExitCode::FAILURE;
    }

    match cli.command {
        Commands::Run(cfg) => run_pipeline(cfg),
        Commands::Config { json } => show_config(json),
    }
}

fn run_pipeline(cfg: RunConfig) -> ExitCode {
    let store = DirStore::new(&cfg.store_root);
    let checkpoint = CheckpointStore::new(cfg.checkpoint_path());

    let channel: Box<dyn AlertChannel> = match &cfg.alert_cmd {
        Some(program) => Box::new(CommandChannel::new(
            program.clone(),
            cfg.alert_args.clone(),
            cfg.alert_timeout(),
        )),
        None => Box::new(UnconfiguredChannel),
    };
    let mut dispatcher = Dispatcher::new(channel.as_ref());

    match pipeline::run_once(&store, &checkpoint, &mut dispatcher, &cfg.prefix) {
        Ok(report) => {
            if cfg.json {
                print_report(&report);
            }
            if report.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_PARTIAL)
            }
        }
        Err(err) => {
            error!(error = %err, "Run aborted");
            ExitCode::FAILURE
        }
    }
}

fn print_report(report: &RunReport) {
    match serde_json::to_string_pretty(report) {
        Ok(rendered) => println!("{rendered}"),
        Err(err) => error!(error = %err, "Failed to render run report"),
    }
}

fn show_config(as_json: bool) -> ExitCode {
    match try_show_config(as_json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Failed to show configuration");
            ExitCode::FAILURE
        }
    }
}

fn try_show_config(as_json: bool) -> Result<()> {
    let home = config::guardpost_home();
    let checkpoint_path = config::env_checkpoint_path();
    let watermark = CheckpointStore::new(&checkpoint_path).read();
    let store_root = std::env::var("GUARDPOST_STORE_ROOT").ok();
    let prefix = std::env::var("GUARDPOST_PREFIX")
        .unwrap_or_else(|_| config::DEFAULT_PREFIX.to_string());

    if as_json {
        let payload = json!({
            "home": home,
            "logs_dir": config::logs_dir(),
            "checkpoint": checkpoint_path,
            "watermark": watermark,
            "store_root": store_root,
            "prefix": prefix,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("home:       {}", home.display());
        println!("logs:       {}", config::logs_dir().display());
        println!("checkpoint: {}", checkpoint_path.display());
        println!("watermark:  {watermark}");
        println!(
            "store root: {}",
            store_root.as_deref().unwrap_or("(unset: GUARDPOST_STORE_ROOT)")
        );
        println!("prefix:     {prefix}");
    }
    Ok(())
}
