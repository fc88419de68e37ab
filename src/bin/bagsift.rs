// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # Bagsift CLI
//!
//! Batch front end for the bag filtering engine.
//!
//! ## Usage
//!
//! ```sh
//! # Show container information
//! bagsift inspect info recording.bag
//!
//! # List topics
//! bagsift inspect topics recording.bag
//!
//! # Extract two channels within a time window
//! bagsift filter recording.bag -o subset.bag \
//!     --topics /camera/image_raw,/imu --time-range 2,8
//!
//! # Filter a batch of bags concurrently with a whitelist
//! bagsift filter a.bag b.bag c.bag --output-dir out/ --whitelist sensors.txt
//!
//! # Channel set algebra across bags
//! bagsift topics common a.bag b.bag
//! ```

mod cmd;
mod common;

use std::process;

use clap::{Parser, Subcommand};
use cmd::{FilterCmd, InspectCmd, TopicsCmd};
use common::Result;

/// Bagsift - bag filtering toolkit
///
/// Index timestamped-message log files and extract channel/time-window
/// subsets into new, self-describing containers.
#[derive(Parser, Clone)]
#[command(name = "bagsift")]
#[command(about = "Filter channels and time windows out of bag files", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Clone)]
enum Commands {
    /// Inspect container contents (info, topics)
    #[command(subcommand)]
    Inspect(InspectCmd),

    /// Extract channel/time-window subsets into new bags
    Filter(FilterCmd),

    /// Channel set algebra across several bags (common, union)
    #[command(subcommand)]
    Topics(TopicsCmd),
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect(cmd) => cmd.run(),
        Commands::Filter(cmd) => cmd.run(),
        Commands::Topics(cmd) => cmd.run(),
    }
}

fn main() {
    let result = run();

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
