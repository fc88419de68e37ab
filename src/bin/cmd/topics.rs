// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Topics command - channel set algebra across several bags.

use std::path::PathBuf;

use clap::Subcommand;

use crate::common::Result;
use bagsift::BagManager;

/// Compare channel sets across bags.
#[derive(Subcommand, Clone, Debug)]
pub enum TopicsCmd {
    /// Channels present in every bag
    Common {
        /// Input bags
        #[arg(value_name = "BAG", required = true)]
        bags: Vec<PathBuf>,
    },

    /// Channels across all bags, with the number of bags containing each
    Union {
        /// Input bags
        #[arg(value_name = "BAG", required = true)]
        bags: Vec<PathBuf>,
    },
}

impl TopicsCmd {
    pub fn run(self) -> Result<()> {
        match self {
            TopicsCmd::Common { bags } => cmd_common(bags),
            TopicsCmd::Union { bags } => cmd_union(bags),
        }
    }
}

fn load_all(bags: Vec<PathBuf>) -> Result<BagManager> {
    let mut manager = BagManager::new();
    for bag in bags {
        manager.load(&bag)?;
    }
    Ok(manager)
}

fn cmd_common(bags: Vec<PathBuf>) -> Result<()> {
    let manager = load_all(bags)?;
    let common = manager.common_topics();

    if common.is_empty() {
        println!("No common channels across {} bags", manager.len());
        return Ok(());
    }

    println!("Channels common to all {} bags:", manager.len());
    for name in common {
        println!("  {name}");
    }
    Ok(())
}

fn cmd_union(bags: Vec<PathBuf>) -> Result<()> {
    let manager = load_all(bags)?;

    println!("{:<40} {:>8}", "Channel", "Bags");
    println!("{}", "-".repeat(50));
    for (name, count) in manager.union_topics() {
        println!("{:<40} {:>8}", name, count);
    }
    Ok(())
}
