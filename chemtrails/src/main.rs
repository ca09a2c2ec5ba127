//! # chemtrails - Main Entry Point
//!
//! - `record`: run a hub with the periodic scheduler, then print statistics
//! - `show`: load any archive and render it
//! - `sniff`: print an archive's header blocks as JSON

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::{Duration as StdDuration, Instant};

use chemtrails::archive;
use chemtrails::cli::{Args, Command, RecordArgs};
use chemtrails::display;
use chemtrails::domain::{ArchiveError, Duration, HubError};
use chemtrails::hub::{Hub, HubConfig, Scheduler};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_BAD_ARCHIVE: i32 = 65;
const EXIT_CANT_CREATE: i32 = 73;

fn main() {
    env_logger::init();
    let args = Args::parse();
    std::process::exit(match run(args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            exit_code_for(&e)
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<ArchiveError>().is_some_and(|e| !matches!(e, ArchiveError::Io(_))) {
        EXIT_BAD_ARCHIVE
    } else if err.downcast_ref::<HubError>().is_some() {
        EXIT_CANT_CREATE
    } else {
        EXIT_ERROR
    }
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Show { file } => show(&file),
        Command::Sniff { file } => sniff(&file),
        Command::Record(record_args) => record(&record_args),
    }
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn show(path: &Path) -> Result<()> {
    let record = archive::load_any(open(path)?)?;
    print!("{}", display::render(&record));
    Ok(())
}

fn sniff(path: &Path) -> Result<()> {
    let (version, metadata, class_metadata) = archive::sniff(open(path)?)?;
    let header = serde_json::json!({
        "version": version,
        "metadata": metadata,
        "class_metadata": class_metadata,
    });
    println!("{}", serde_json::to_string_pretty(&header)?);
    Ok(())
}

fn record(args: &RecordArgs) -> Result<()> {
    let mut config = HubConfig::from_env(&args.output).with_compress(!args.no_compress);
    if let Some(workers) = args.workers {
        config = config.with_num_workers(workers);
    }
    if let Some(max_in_flight) = args.max_in_flight {
        config = config.with_max_in_flight(max_in_flight);
    }

    let hub = Hub::new(config)?;
    info!("Recording {} snapshots into {} as hub {}", args.count, args.output.display(), hub.id());

    let started = Instant::now();
    let scheduler = Scheduler::new(hub.clone(), StdDuration::from_millis(args.period_ms))
        .with_limit(args.count)
        .start()
        .context("Failed to start scheduler")?;
    let ticks = scheduler.wait();
    hub.shutdown();

    let elapsed = Duration(u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX));
    info!("Scheduler ran {ticks} ticks");
    eprintln!("{}", display::render_stats(&hub.stats(), elapsed));
    Ok(())
}
