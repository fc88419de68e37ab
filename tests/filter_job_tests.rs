// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Filter job pipeline tests: identity copies, channel/time selection,
//! rejection before I/O, and failure behavior.

mod common;

use bagsift::{BagReader, FilterSpec, JobExecutor, JobRequest, JobStatus};
use common::*;

/// Two channels with overlapping time spans: "/a" with 100 records in
/// [0, 10], "/b" with 50 records in [5, 20].
fn overlapping_channels(path: &std::path::Path) {
    let channels = vec![("/a", "test_msgs/A"), ("/b", "test_msgs/B")];
    let mut records: Vec<(&str, u64, Vec<u8>)> = Vec::new();
    for i in 0..100u64 {
        records.push(("/a", i * 10 / 99, format!("a-{i}").into_bytes()));
    }
    for i in 0..50u64 {
        records.push(("/b", 5 + i * 15 / 49, format!("b-{i}").into_bytes()));
    }
    records.sort_by_key(|(_, t, _)| *t);
    write_bag(path, &channels, &records);
}

fn run_job(input: &std::path::Path, output: &std::path::Path, spec: FilterSpec) -> JobStatus {
    let executor = JobExecutor::new();
    let handle = executor
        .submit(JobRequest::new(input, output, spec))
        .unwrap();
    let status = handle.wait();
    executor.shutdown();
    status
}

#[test]
fn test_channel_and_window_selection() {
    let (input, guard) = temp_path("select_in.bag");
    let output = guard.join("select_out.bag");
    overlapping_channels(&input);

    let spec = FilterSpec::for_channels(["/a"]).with_time_range(2, 8).unwrap();
    assert_eq!(run_job(&input, &output, spec), JobStatus::Succeeded);

    let reader = BagReader::open(&output).unwrap();
    let index = reader.index();

    // Only the selected channel appears in the output at all.
    assert_eq!(index.channels.len(), 1);
    assert!(index.has_channel("/a"));
    assert!(!index.has_channel("/b"));

    let records = read_all(&output, None);
    assert!(!records.is_empty());
    assert!(records.iter().all(|(c, _, _)| c == "/a"));
    // Window is inclusive on both ends.
    assert!(records.iter().all(|(_, t, _)| (2..=8).contains(t)));

    // Survivors keep their source order.
    let source: Vec<_> = read_all(&input, None)
        .into_iter()
        .filter(|(c, t, _)| c == "/a" && (2..=8).contains(t))
        .collect();
    assert_eq!(records, source);
}

#[test]
fn test_identity_copy() {
    let (input, guard) = temp_path("identity_in.bag");
    let output = guard.join("identity_out.bag");
    overlapping_channels(&input);

    assert_eq!(run_job(&input, &output, FilterSpec::all()), JobStatus::Succeeded);

    let source = BagReader::open(&input).unwrap();
    let copy = BagReader::open(&output).unwrap();

    assert_eq!(
        source.index().channel_names(),
        copy.index().channel_names()
    );
    assert_eq!(source.index().record_count, copy.index().record_count);
    assert_eq!(source.index().time_range(), copy.index().time_range());
    assert_eq!(read_all(&input, None), read_all(&output, None));
}

#[test]
fn test_explicit_empty_channel_set() {
    let (input, guard) = temp_path("empty_set_in.bag");
    let output = guard.join("empty_set_out.bag");
    overlapping_channels(&input);

    let spec = FilterSpec::for_channels(Vec::<String>::new());
    assert_eq!(run_job(&input, &output, spec), JobStatus::Succeeded);

    // The output is a valid, re-openable, empty container.
    let reader = BagReader::open(&output).unwrap();
    assert!(reader.is_indexed());
    assert!(reader.index().is_empty());
    assert_eq!(reader.index().time_range(), (0, 0));
}

#[test]
fn test_unknown_channel_matches_nothing() {
    let (input, guard) = temp_path("unknown_in.bag");
    let output = guard.join("unknown_out.bag");
    overlapping_channels(&input);

    let spec = FilterSpec::for_channels(["/does/not/exist"]);
    assert_eq!(run_job(&input, &output, spec), JobStatus::Succeeded);
    assert!(BagReader::open(&output).unwrap().index().is_empty());
}

#[test]
fn test_inverted_window_rejected_before_io() {
    let (_, guard) = temp_path("inverted.bag");
    let output = guard.join("inverted_out.bag");

    let err = FilterSpec::all().with_time_range(8, 2).unwrap_err();
    assert_eq!(err.kind(), "invalid_time_range");

    // Rejected at construction: no job ran, no output file was created.
    assert!(!output.exists());
}

#[test]
fn test_missing_input_fails_without_output() {
    let (_, guard) = temp_path("missing_input.bag");
    let input = guard.join("does_not_exist.bag");
    let output = guard.join("missing_out.bag");

    let executor = JobExecutor::new();
    let handle = executor
        .submit(JobRequest::new(&input, &output, FilterSpec::all()))
        .unwrap();
    assert_eq!(handle.wait(), JobStatus::Failed);
    assert_eq!(handle.error().unwrap().kind(), "open");
    assert_eq!(handle.records_written(), 0);

    // The reader failed before the writer was ever created.
    assert!(!output.exists());
    executor.shutdown();
}

#[test]
fn test_failed_job_leaves_partial_output_on_disk() {
    let (input, guard) = temp_path("partial_in.bag");
    let output = guard.join("partial_out.bag");
    write_large_bag(&input, 50_000);

    let executor = JobExecutor::new();
    let handle = executor
        .submit(JobRequest::new(&input, &output, FilterSpec::all()))
        .unwrap();

    // Cancel mid-stream; the job settles and the partial output stays on
    // disk as a valid container rather than being deleted.
    while handle.status() == JobStatus::Queued {
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    executor.cancel(&handle);
    handle.wait();
    executor.shutdown();

    if handle.status() == JobStatus::Failed {
        assert!(handle.error().unwrap().is_cancelled());
        assert!(output.exists());
    }
    let reader = BagReader::open(&output).unwrap();
    assert!(reader.index().record_count <= 50_000);
}

#[test]
fn test_job_observability() {
    let (input, guard) = temp_path("observe_in.bag");
    let output = guard.join("observe_out.bag");
    overlapping_channels(&input);

    let executor = JobExecutor::new();
    let handle = executor
        .submit(JobRequest::new(&input, &output, FilterSpec::all()))
        .unwrap();
    assert_eq!(handle.wait(), JobStatus::Succeeded);

    assert_eq!(handle.records_written(), 150);
    assert!(handle.elapsed().is_some());
    assert!(handle.error().is_none());

    let update = handle.update();
    assert_eq!(update.status, JobStatus::Succeeded);
    assert_eq!(update.records_written, 150);
    assert!(update.error.is_none());
    executor.shutdown();
}
