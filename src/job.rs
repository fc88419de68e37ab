// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Filter jobs: one reader-to-writer pipeline per (input, output, spec)
//! triple, with an observable status state machine.
//!
//! Status transitions are forward-only: `Queued -> Running ->
//! {Succeeded | Failed}`, and the terminal states are sinks. Status is
//! mutated only by the executor thread driving the job; any number of
//! observers may read it through a [`JobHandle`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{BagError, Result};
use crate::io::{BagReader, BagWriter, FilterSpec};

/// One filtering run: copy the matching records of `input` into
/// `output`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    /// Source container
    pub input: PathBuf,
    /// Output container to create
    pub output: PathBuf,
    /// Record selection
    pub spec: FilterSpec,
}

impl JobRequest {
    /// Create a request.
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, spec: FilterSpec) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            spec,
        }
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, waiting for a worker
    Queued,
    /// Executing on a worker
    Running,
    /// Finished with the output finalized
    Succeeded,
    /// Finished with a captured error; partial output is left on disk
    Failed,
}

impl JobStatus {
    /// Whether this status is a sink.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Running => 1,
            JobStatus::Succeeded | JobStatus::Failed => 2,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One element of the status feed.
#[derive(Debug, Clone, Serialize)]
pub struct JobUpdate {
    /// Job id
    pub job_id: Uuid,
    /// Status after the transition
    pub status: JobStatus,
    /// Records written so far
    pub records_written: u64,
    /// Human-readable failure reason, present on `Failed`
    pub error: Option<String>,
}

struct StatusCell {
    status: JobStatus,
    error: Option<BagError>,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

/// Shared state of one job. Mutated only by the executor; read by any
/// number of handles.
pub(crate) struct JobState {
    pub(crate) id: Uuid,
    pub(crate) request: JobRequest,
    cell: Mutex<StatusCell>,
    settled: Condvar,
    records_written: AtomicU64,
    cancel_requested: AtomicBool,
}

impl JobState {
    pub(crate) fn new(request: JobRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            cell: Mutex::new(StatusCell {
                status: JobStatus::Queued,
                error: None,
                started_at: None,
                finished_at: None,
            }),
            settled: Condvar::new(),
            records_written: AtomicU64::new(0),
            cancel_requested: AtomicBool::new(false),
        }
    }

    /// Apply a forward transition. Returns false when the transition
    /// would move backward or out of a terminal state, in which case
    /// nothing changes.
    pub(crate) fn advance(&self, next: JobStatus, error: Option<BagError>) -> bool {
        let mut cell = self.cell.lock().expect("job status lock poisoned");
        if next.rank() <= cell.status.rank() {
            return false;
        }
        cell.status = next;
        cell.error = error;
        match next {
            JobStatus::Running => cell.started_at = Some(Instant::now()),
            JobStatus::Succeeded | JobStatus::Failed => {
                cell.finished_at = Some(Instant::now());
                self.settled.notify_all();
            }
            JobStatus::Queued => {}
        }
        true
    }

    /// Settle a still-queued job as cancelled. Returns false when the
    /// job already left the queue.
    pub(crate) fn cancel_if_queued(&self) -> bool {
        let mut cell = self.cell.lock().expect("job status lock poisoned");
        if cell.status != JobStatus::Queued {
            return false;
        }
        cell.status = JobStatus::Failed;
        cell.error = Some(BagError::Cancelled);
        cell.finished_at = Some(Instant::now());
        self.settled.notify_all();
        true
    }

    pub(crate) fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::Relaxed);
    }

    pub(crate) fn cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::Relaxed)
    }

    pub(crate) fn add_written(&self) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> JobUpdate {
        let cell = self.cell.lock().expect("job status lock poisoned");
        JobUpdate {
            job_id: self.id,
            status: cell.status,
            records_written: self.records_written.load(Ordering::Relaxed),
            error: cell.error.as_ref().map(|e| e.to_string()),
        }
    }
}

/// Observer handle to a submitted job.
#[derive(Clone)]
pub struct JobHandle {
    pub(crate) state: Arc<JobState>,
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.state.id)
            .finish()
    }
}

impl JobHandle {
    /// The job id.
    pub fn id(&self) -> Uuid {
        self.state.id
    }

    /// The input container path.
    pub fn input(&self) -> &std::path::Path {
        &self.state.request.input
    }

    /// The output container path.
    pub fn output(&self) -> &std::path::Path {
        &self.state.request.output
    }

    /// Current status.
    pub fn status(&self) -> JobStatus {
        self.state.cell.lock().expect("job status lock poisoned").status
    }

    /// The captured error, present once the job has failed.
    pub fn error(&self) -> Option<BagError> {
        self.state
            .cell
            .lock()
            .expect("job status lock poisoned")
            .error
            .clone()
    }

    /// Records written so far (live counter while running).
    pub fn records_written(&self) -> u64 {
        self.state.records_written.load(Ordering::Relaxed)
    }

    /// Whether the job has settled.
    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Wall-clock run time: running so far, total once settled, `None`
    /// before the job starts.
    pub fn elapsed(&self) -> Option<Duration> {
        let cell = self.state.cell.lock().expect("job status lock poisoned");
        let started = cell.started_at?;
        Some(match cell.finished_at {
            Some(finished) => finished.duration_since(started),
            None => started.elapsed(),
        })
    }

    /// Current status-feed snapshot.
    pub fn update(&self) -> JobUpdate {
        self.state.snapshot()
    }

    /// Block until the job settles and return its terminal status.
    pub fn wait(&self) -> JobStatus {
        let mut cell = self.state.cell.lock().expect("job status lock poisoned");
        while !cell.status.is_terminal() {
            cell = self
                .state
                .settled
                .wait(cell)
                .expect("job status lock poisoned");
        }
        cell.status
    }

    /// Block until the job settles or the timeout elapses. Returns the
    /// terminal status, or `None` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<JobStatus> {
        let deadline = Instant::now() + timeout;
        let mut cell = self.state.cell.lock().expect("job status lock poisoned");
        while !cell.status.is_terminal() {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let (guard, result) = self
                .state
                .settled
                .wait_timeout(cell, remaining)
                .expect("job status lock poisoned");
            cell = guard;
            if result.timed_out() && !cell.status.is_terminal() {
                return None;
            }
        }
        Some(cell.status)
    }
}

/// Execute one job: stream the input's records through the spec and
/// append the survivors to a fresh output container.
///
/// Cancellation is observed at record boundaries only, so no record is
/// ever torn mid-write. On any error the writer is still finalized
/// best-effort so partial output is a valid, re-openable container.
pub(crate) fn run(state: &JobState) -> Result<()> {
    let reader = BagReader::open(&state.request.input)?;
    let mut writer = BagWriter::create(&state.request.output)?;

    let outcome = copy_records(&reader, &mut writer, state);

    match outcome {
        Ok(()) => writer.finish(),
        Err(e) => {
            if let Err(close_err) = writer.finish() {
                tracing::warn!(
                    output = %writer.path(),
                    error = %close_err,
                    "failed to finalize partial output after job error"
                );
            }
            Err(e)
        }
    }
}

fn copy_records(reader: &BagReader, writer: &mut BagWriter, state: &JobState) -> Result<()> {
    let records = reader.records(state.request.spec.channels())?;

    for record in records {
        if state.cancel_requested() {
            return Err(BagError::Cancelled);
        }
        let record = record?;
        if state.request.spec.matches(&record.channel, record.time_ns) {
            writer.append(&record)?;
            state.add_written();
        }
    }

    Ok(())
}
