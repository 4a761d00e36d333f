//! Media Rescan CLI
//!
//! Rescans directory trees for images and records them in a SQLite index.

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use media_rescan::{
    poll_until_settled, DatabaseIndexer, JsonProgressReporter, ScanConfig, ScanError,
    ScanLifecycle, ScanOutcome, ScanRegistry,
};

const ABOUT: &str = r#"
Media Rescan - recursive image rescanner

Examples:
  media_rescan scan -r /photos                      rescan one tree
  media_rescan scan -r /photos -r /dcim/img.jpg     mix directories and files
  media_rescan scan -r /photos -d index.db          choose the index database
  media_rescan scan -r /photos --pause-after-ms 200 pause, then resume
"#;

/// Recursive image rescanner
#[derive(Parser)]
#[command(name = "media_rescan")]
#[command(author, version, about = ABOUT, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rescan directories and image files
    Scan {
        /// Root directory or image file (repeatable)
        #[arg(short = 'r', long)]
        roots: Vec<PathBuf>,

        /// JSON config file; command line flags override it
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        /// SQLite database file
        #[arg(short = 'd', long)]
        db: Option<PathBuf>,

        /// Skip file hashing
        #[arg(long)]
        no_hash: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Do not write progress to stderr
        #[arg(short = 'q', long)]
        quiet: bool,

        /// Progress polling interval
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Pause the scan after this many milliseconds, then resume it
        #[arg(long)]
        pause_after_ms: Option<u64>,
    },
}

struct ScanArgs {
    config: ScanConfig,
    json: bool,
    pause_after: Option<Duration>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Scan {
            roots,
            config,
            db,
            no_hash,
            json,
            quiet,
            interval_ms,
            pause_after_ms,
        }) => {
            let mut config = match config {
                Some(path) => match ScanConfig::load(&path) {
                    Ok(config) => config,
                    Err(e) => {
                        error!("{}", e);
                        return ExitCode::FAILURE;
                    }
                },
                None => ScanConfig::default(),
            };
            config.roots.extend(roots);
            if let Some(db) = db {
                config.db_path = Some(db);
            }
            if no_hash {
                config.compute_hash = false;
            }
            if quiet {
                config.show_progress = false;
            }
            if let Some(interval) = interval_ms {
                config.progress_interval_ms = interval;
            }
            if config.db_path.is_none() {
                config.db_path = Some(PathBuf::from("media_rescan.db"));
            }
            if config.roots.is_empty() {
                error!("No roots given, use -r <path>");
                return ExitCode::FAILURE;
            }

            let args = ScanArgs {
                config,
                json,
                pause_after: pause_after_ms.map(Duration::from_millis),
            };
            match run_scan(args) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!("{}", e);
                    ExitCode::FAILURE
                }
            }
        }
        None => {
            println!("{}", ABOUT);
            println!("Use 'media_rescan scan -h' for the scan options");
            ExitCode::SUCCESS
        }
    }
}

fn run_scan(args: ScanArgs) -> Result<(), ScanError> {
    let config = args.config;
    info!("Roots: {:?}", config.roots);
    info!("Database: {:?}", config.db_path);

    let started = Instant::now();
    let registry = Arc::new(ScanRegistry::new());
    let indexer = Arc::new(DatabaseIndexer::open(&config)?);
    let reporter = Arc::new(JsonProgressReporter::new(
        config.show_progress,
        config.progress_interval_ms,
    ));
    let interval = Duration::from_millis(config.progress_interval_ms.max(1));
    let request = config.root_strings();

    let scan = ScanLifecycle::new(
        Arc::clone(&registry),
        indexer.clone(),
        config.image_filter(),
        "command line",
    );
    scan.attach_observer(reporter.clone());
    reporter.report_start(scan.label(), &request);
    scan.start(request)?;

    let mut outcomes = Vec::new();
    if let Some(pause_after) = args.pause_after {
        if scan.wait_timeout(pause_after).is_none() && scan.request_cancel(Some(Vec::new())) {
            info!("Pausing scan after {}ms", pause_after.as_millis());
        }
    }
    outcomes.extend(poll_until_settled(&scan, reporter.as_ref(), interval));

    // a paused scan leaves its successor in the slot
    if let Some(successor) = registry.current() {
        successor.attach_observer(reporter.clone());
        if successor.resume_if_necessary()? {
            info!("Resuming as '{}'", successor.label());
            outcomes.extend(poll_until_settled(&successor, reporter.as_ref(), interval));
        }
    }

    let changed: u64 = outcomes.iter().map(|o| o.changed).sum();
    let images = indexer.with_db(|db| db.image_count())?;
    print_result(&outcomes, changed, images, started.elapsed(), args.json);
    Ok(())
}

fn print_result(
    outcomes: &[ScanOutcome],
    changed: u64,
    images: u64,
    elapsed: Duration,
    json: bool,
) {
    if json {
        let result = serde_json::json!({
            "changed": changed,
            "images": images,
            "runs": outcomes,
            "ms": elapsed.as_millis() as u64,
        });
        match serde_json::to_string_pretty(&result) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to encode result: {}", e),
        }
    } else {
        println!("Scan finished:");
        println!("  Runs: {}", outcomes.len());
        println!("  Changed entries: {}", changed);
        println!("  Indexed images: {}", images);
        println!("  Duration: {}ms", elapsed.as_millis());
    }
}
