//! File organizer host - worker supervisor and UI bridge
//!
//! This is the binary entry point. All logic lives in the library.

use std::path::PathBuf;

use clap::Parser;
use file_organizer::HostOptions;
use organizer_core::prelude::*;

/// Supervises the file organizer worker and serves the UI bridge on stdin/stdout
#[derive(Parser, Debug)]
#[command(name = "organizer")]
#[command(about = "Worker supervisor and UI bridge for the file organizer", long_about = None)]
struct Args {
    /// Config file (default: <config dir>/file-organizer/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Working directory for the worker process
    #[arg(long, value_name = "DIR")]
    worker_dir: Option<PathBuf>,

    /// Directory listed by get-file-list
    #[arg(long, value_name = "DIR")]
    watch_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    file_organizer::run(HostOptions {
        config_path: args.config,
        worker_dir: args.worker_dir,
        watch_dir: args.watch_dir,
    })
    .await
}
