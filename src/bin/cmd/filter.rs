// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Filter command - run extraction jobs on the concurrent executor.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;

use crate::common::{parse_time_range, ProgressBar, Result};
use bagsift::{
    load_whitelist, BagManager, Config, ExecutorConfig, FilterSpec, JobExecutor, JobRequest,
    JobStatus,
};

/// Extract channel/time-window subsets into new bags.
#[derive(Args, Clone, Debug)]
pub struct FilterCmd {
    /// Input bags
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// Output bag (single input only)
    #[arg(short, long, conflicts_with = "output_dir")]
    output: Option<PathBuf>,

    /// Directory for outputs, named <stem>_filtered.bag
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Channels to keep, comma-separated (omit for all channels)
    #[arg(short, long)]
    topics: Option<String>,

    /// Whitelist file path, or a name from the config's whitelists table
    #[arg(short, long)]
    whitelist: Option<String>,

    /// Config file carrying named default whitelists
    #[arg(long)]
    config: Option<PathBuf>,

    /// Inclusive time window "start,end" (seconds, nanoseconds, or ISO 8601)
    #[arg(long)]
    time_range: Option<String>,

    /// Worker pool size (default: number of CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Warn about requested channels missing from an input
    #[arg(long)]
    validate: bool,
}

impl FilterCmd {
    pub fn run(self) -> Result<()> {
        let config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        let spec = self.build_spec(&config)?;

        // Load inputs up front: open errors surface before any job is
        // submitted, and the indexes give the progress total.
        let mut manager = BagManager::with_config(&config);
        let mut pairs = Vec::new();
        let mut total_records = 0u64;

        for input in &self.inputs {
            let bag = manager.load(input)?;
            total_records += bag.index.record_count;

            if self.validate {
                let missing = spec.missing_channels(&bag.index);
                if !missing.is_empty() {
                    eprintln!(
                        "warning: {} does not contain: {}",
                        input.display(),
                        missing.join(", ")
                    );
                }
            }

            pairs.push((input.clone(), self.output_for(input)?));
        }

        let executor = match self.jobs {
            Some(workers) => {
                JobExecutor::with_config(ExecutorConfig::default().with_workers(workers))
            }
            None => JobExecutor::new(),
        };

        let mut handles = Vec::new();
        for (input, output) in pairs {
            let handle = executor.submit(JobRequest::new(input, output, spec.clone()))?;
            handles.push(handle);
        }

        let progress = ProgressBar::new(total_records, "Filtering");
        while handles.iter().any(|h| !h.is_terminal()) {
            progress.set(handles.iter().map(|h| h.records_written()).sum());
            std::thread::sleep(Duration::from_millis(50));
        }
        let written: u64 = handles.iter().map(|h| h.records_written()).sum();
        progress.finish_with_message(format!("{written} records"));

        let mut failures = 0;
        for handle in &handles {
            match handle.wait() {
                JobStatus::Succeeded => {
                    println!(
                        "{} -> {}: {} records",
                        handle.input().display(),
                        handle.output().display(),
                        handle.records_written()
                    );
                }
                _ => {
                    failures += 1;
                    let reason = handle
                        .error()
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "unknown error".to_string());
                    eprintln!("{}: failed: {reason}", handle.input().display());
                }
            }
        }

        executor.shutdown();

        if failures > 0 {
            anyhow::bail!("{failures} of {} jobs failed", handles.len());
        }
        Ok(())
    }

    fn build_spec(&self, config: &Config) -> Result<FilterSpec> {
        let mut channels: BTreeSet<String> = BTreeSet::new();
        let mut restricted = false;

        if let Some(topics) = &self.topics {
            restricted = true;
            channels.extend(
                topics
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string),
            );
        }

        if let Some(whitelist) = &self.whitelist {
            restricted = true;
            let path = match config.whitelist(whitelist) {
                Some(configured) => configured.clone(),
                None => PathBuf::from(whitelist),
            };
            channels.extend(load_whitelist(&path)?);
        }

        let mut spec = if restricted {
            FilterSpec::for_channels(channels)
        } else {
            FilterSpec::all()
        };

        if let Some(range) = &self.time_range {
            let (start, end) = parse_time_range(range)?;
            spec = spec.with_time_range(start, end)?;
        }

        Ok(spec)
    }

    fn output_for(&self, input: &Path) -> Result<PathBuf> {
        if let Some(output) = &self.output {
            if self.inputs.len() > 1 {
                anyhow::bail!("--output requires exactly one input; use --output-dir");
            }
            return Ok(output.clone());
        }

        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        let name = format!("{stem}_filtered.bag");

        Ok(match &self.output_dir {
            Some(dir) => dir.join(name),
            None => input.with_file_name(name),
        })
    }
}
