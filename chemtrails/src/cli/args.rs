//! CLI argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "chemtrails",
    version,
    about = "Record and inspect process snapshots and traces",
    after_help = "\
EXAMPLES:
    chemtrails record --output ./trails --period-ms 500 --count 20
    chemtrails show ./trails/<hub>_<oid>.snapshot
    chemtrails sniff ./trails/<hub>_<trace>_<oid>.trace"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load an archive and print it
    Show {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print an archive's version and metadata as JSON without decoding the payload
    Sniff {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Take periodic snapshots of this process
    Record(RecordArgs),
}

#[derive(clap::Args, Debug)]
pub struct RecordArgs {
    /// Directory for archive files (must exist)
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// Time between snapshots
    #[arg(long, default_value = "1000")]
    pub period_ms: u64,

    /// Number of snapshots to take
    #[arg(long, default_value = "10")]
    pub count: u64,

    /// Persistence threads (default: online CPUs)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Admission limit for objects waiting to be written
    #[arg(long)]
    pub max_in_flight: Option<usize>,

    /// Store payloads uncompressed
    #[arg(long)]
    pub no_compress: bool,
}
