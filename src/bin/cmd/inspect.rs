// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Inspect command - show container information and topics.

use std::path::PathBuf;

use clap::Subcommand;

use crate::common::{format_duration, format_timestamp, Result};
use bagsift::BagReader;

/// Inspect container contents.
#[derive(Subcommand, Clone, Debug)]
pub enum InspectCmd {
    /// Show basic container information and summary
    Info {
        /// Input bag
        #[arg(value_name = "BAG")]
        input: PathBuf,

        /// Emit machine-readable JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// List all topics in the container
    Topics {
        /// Input bag
        #[arg(value_name = "BAG")]
        input: PathBuf,
    },
}

impl InspectCmd {
    pub fn run(self) -> Result<()> {
        match self {
            InspectCmd::Info { input, json } => cmd_info(input, json),
            InspectCmd::Topics { input } => cmd_topics(input),
        }
    }
}

/// Cmd: Show container info
fn cmd_info(input: PathBuf, json: bool) -> Result<()> {
    let reader = BagReader::open(&input)?;
    let index = reader.index();

    if json {
        let channels: Vec<_> = index
            .channel_names()
            .into_iter()
            .map(|name| {
                let type_id = index.channel(&name).map(|c| c.type_id.clone()).unwrap_or_default();
                serde_json::json!({ "name": name, "type": type_id })
            })
            .collect();

        let info = serde_json::json!({
            "path": index.path,
            "indexed": reader.is_indexed(),
            "record_count": index.record_count,
            "start_time": index.start_time,
            "end_time": index.end_time,
            "channels": channels,
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("=== {} ===", input.display());
    println!("Indexed: {}", if reader.is_indexed() { "yes" } else { "no (recovered by scan)" });
    println!("Channels: {}", index.channels.len());
    println!("Records: {}", index.record_count);

    if !index.is_empty() {
        let (start, end) = index.time_range();
        println!("Start: {}", format_timestamp(start));
        println!("End: {}", format_timestamp(end));
        println!("Duration: {}", format_duration(index.duration()));
    } else {
        println!("Time range: empty container");
    }

    println!();
    println!("Channels:");
    for name in index.channel_names() {
        if let Some(channel) = index.channel(&name) {
            println!("  {} | {}", channel.name, channel.type_id);
        }
    }

    Ok(())
}

/// Cmd: List topics
fn cmd_topics(input: PathBuf) -> Result<()> {
    let reader = BagReader::open(&input)?;
    let index = reader.index();

    println!("Topics in {}:", input.display());
    println!("{:<40} {:<30}", "Topic", "Message Type");
    println!("{}", "-".repeat(72));
    for name in index.channel_names() {
        if let Some(channel) = index.channel(&name) {
            println!("{:<40} {:<30}", channel.name, channel.type_id);
        }
    }

    Ok(())
}
