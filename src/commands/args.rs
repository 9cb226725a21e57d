//! Command-line argument definitions for the bigsid CLI.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::daemon::pool::DEFAULT_POOL_SIZE;

#[derive(Parser)]
#[command(name = "bigsid")]
#[command(about = "Bit-sliced sequence signature index daemon")]
#[command(
    long_about = "Bigsid watches a directory for sequence files, sketches each record
into a Bloom filter, and folds the filters into a bit-sliced index
(BIGSI) that answers k-mer membership queries across every ingested
sequence.

WORKFLOW:
  1. Start the daemon:    bigsid start -c bigsid.json --watch-dir ./incoming
  2. Drop FASTA/FASTQ files into the watch directory
  3. Stop and persist:    bigsid stop -c bigsid.json

The config file doubles as the daemon handshake: it carries the pid and
running flag while the daemon is up."
)]
pub struct Cli {
    /// Enable verbose progress output with timestamps
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Detach and start watching the configured directory
    Start {
        /// Config file to create or reuse
        #[arg(short, long)]
        config: PathBuf,

        /// Directory to watch for new sequence files
        #[arg(long)]
        watch_dir: Option<PathBuf>,

        /// Directory the daemon runs in (log and index live here)
        #[arg(long)]
        working_dir: Option<PathBuf>,

        /// Worker threads in the sketching pool
        #[arg(long, default_value_t = DEFAULT_POOL_SIZE)]
        threads: usize,

        /// Stay in the foreground and log to stderr (for debugging)
        #[arg(long)]
        foreground: bool,
    },

    /// Signal the running daemon and wait for it to exit
    Stop {
        /// Config file the daemon was started with
        #[arg(short, long)]
        config: PathBuf,

        /// Seconds to wait for the running flag to clear
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },

    /// Print the daemon's pid or the full config record
    Info {
        /// Config file the daemon was started with
        #[arg(short, long)]
        config: PathBuf,

        /// Print only the pid
        #[arg(long)]
        pid_only: bool,
    },

    /// Offline: sketch one sequence file, optionally into an index
    Sketch {
        /// Config file providing k-mer and Bloom parameters
        #[arg(short, long)]
        config: PathBuf,

        /// FASTA/FASTQ file to sketch (gzip transparent)
        #[arg(short, long)]
        file: PathBuf,

        /// Freeze the sketches into an index at this directory
        #[arg(long)]
        index_dir: Option<PathBuf>,
    },

    /// Offline maintenance (reserved)
    Shrink {
        /// Config file providing index parameters
        #[arg(short, long)]
        config: PathBuf,
    },
}
