// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Bounded worker pool for filter jobs.
//!
//! Submission never blocks: [`JobExecutor::submit`] enqueues and returns
//! a [`JobHandle`] immediately. A fixed set of workers drains a single
//! FIFO queue, so jobs start in submission order, while completions may
//! land in any order. Status transitions are delivered to subscribers by
//! a dedicated notifier thread, never inline with the transition itself,
//! so an observer can never re-enter the state it is being notified
//! about.
//!
//! Two jobs must never race on one output file: a submission whose
//! output path matches any queued or running job is rejected with
//! `PathInUse`.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Sender};

use crate::core::{BagError, Result};
use crate::job::{self, JobHandle, JobRequest, JobState, JobStatus, JobUpdate};

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Number of worker threads
    pub workers: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().max(1),
        }
    }
}

impl ExecutorConfig {
    /// Set the worker count (clamped to at least one).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

type Subscriber = Arc<dyn Fn(&JobUpdate) + Send + Sync>;

struct Shared {
    /// Output paths of all queued or running jobs
    active_outputs: Mutex<HashSet<PathBuf>>,
    subscribers: Mutex<Vec<Subscriber>>,
}

/// Concurrent executor for filter jobs.
pub struct JobExecutor {
    shared: Arc<Shared>,
    job_tx: Option<Sender<Arc<JobState>>>,
    event_tx: Option<Sender<JobUpdate>>,
    workers: Vec<JoinHandle<()>>,
    notifier: Option<JoinHandle<()>>,
    worker_count: usize,
}

impl JobExecutor {
    /// Create an executor with the default worker count (one per
    /// available execution unit).
    pub fn new() -> Self {
        Self::with_config(ExecutorConfig::default())
    }

    /// Create an executor with an explicit configuration.
    pub fn with_config(config: ExecutorConfig) -> Self {
        let worker_count = config.workers.max(1);

        let shared = Arc::new(Shared {
            active_outputs: Mutex::new(HashSet::new()),
            subscribers: Mutex::new(Vec::new()),
        });

        let (job_tx, job_rx) = unbounded::<Arc<JobState>>();
        let (event_tx, event_rx) = unbounded::<JobUpdate>();

        let notifier = {
            let shared = shared.clone();
            std::thread::spawn(move || {
                for update in event_rx.iter() {
                    let subscribers: Vec<Subscriber> = shared
                        .subscribers
                        .lock()
                        .expect("subscriber lock poisoned")
                        .clone();
                    for subscriber in subscribers {
                        subscriber(&update);
                    }
                }
            })
        };

        let workers = (0..worker_count)
            .map(|_| {
                let job_rx = job_rx.clone();
                let event_tx = event_tx.clone();
                let shared = shared.clone();
                std::thread::spawn(move || {
                    for state in job_rx.iter() {
                        // A job cancelled while queued has already
                        // settled and released its output path.
                        if !state.advance(JobStatus::Running, None) {
                            continue;
                        }
                        let _ = event_tx.send(state.snapshot());

                        let result = job::run(&state);

                        // The writer is closed by the time run() returns,
                        // so the output path must be released before the
                        // job settles: a caller woken by wait() may
                        // immediately resubmit the same path.
                        shared
                            .active_outputs
                            .lock()
                            .expect("output guard lock poisoned")
                            .remove(&state.request.output);

                        match result {
                            Ok(()) => {
                                state.advance(JobStatus::Succeeded, None);
                            }
                            Err(e) => {
                                state.advance(JobStatus::Failed, Some(e));
                            }
                        }
                        let _ = event_tx.send(state.snapshot());
                    }
                })
            })
            .collect();

        Self {
            shared,
            job_tx: Some(job_tx),
            event_tx: Some(event_tx),
            workers,
            notifier: Some(notifier),
            worker_count,
        }
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Enqueue a job without blocking. Returns the handle of the queued
    /// job, or `PathInUse` when another queued or running job already
    /// targets the same output path.
    pub fn submit(&self, request: JobRequest) -> Result<JobHandle> {
        {
            let mut outputs = self
                .shared
                .active_outputs
                .lock()
                .expect("output guard lock poisoned");
            if !outputs.insert(request.output.clone()) {
                return Err(BagError::path_in_use(request.output.to_string_lossy()));
            }
        }

        let state = Arc::new(JobState::new(request));
        let handle = JobHandle {
            state: state.clone(),
        };

        if let Some(tx) = &self.event_tx {
            let _ = tx.send(state.snapshot());
        }

        match &self.job_tx {
            Some(tx) if tx.send(state.clone()).is_ok() => Ok(handle),
            _ => {
                self.shared
                    .active_outputs
                    .lock()
                    .expect("output guard lock poisoned")
                    .remove(&state.request.output);
                Err(BagError::Other("executor is shut down".to_string()))
            }
        }
    }

    /// Best-effort cancellation.
    ///
    /// A job still queued settles `Failed` immediately and never creates
    /// an output file. A running job is asked to stop at its next record
    /// boundary; the record in flight is never torn, and the partial
    /// output is finalized into a valid container. A settled job is left
    /// alone.
    pub fn cancel(&self, handle: &JobHandle) {
        // Holding the path guard across the settle keeps a caller woken
        // by wait() from resubmitting the same output before it is
        // released here.
        let mut outputs = self
            .shared
            .active_outputs
            .lock()
            .expect("output guard lock poisoned");
        if handle.state.cancel_if_queued() {
            outputs.remove(&handle.state.request.output);
            drop(outputs);
            if let Some(tx) = &self.event_tx {
                let _ = tx.send(handle.state.snapshot());
            }
        } else {
            drop(outputs);
            handle.state.request_cancel();
        }
    }

    /// Register an observer invoked on every status transition of every
    /// job. Invocation order across observers is unspecified; each
    /// observer sees a given job's transitions in order.
    pub fn subscribe<F>(&self, subscriber: F)
    where
        F: Fn(&JobUpdate) + Send + Sync + 'static,
    {
        self.shared
            .subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .push(Arc::new(subscriber));
    }

    /// Stop accepting jobs, drain the queue, and join the pool.
    pub fn shutdown(self) {
        // Drop runs the actual teardown.
    }
}

impl Default for JobExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for JobExecutor {
    fn drop(&mut self) {
        // Closing the job queue lets workers drain what is left and
        // exit; closing the event queue afterwards flushes the notifier.
        self.job_tx.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        self.event_tx.take();
        if let Some(notifier) = self.notifier.take() {
            let _ = notifier.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::FilterSpec;

    #[test]
    fn test_default_config_has_workers() {
        assert!(ExecutorConfig::default().workers >= 1);
        assert_eq!(ExecutorConfig::default().with_workers(0).workers, 1);
    }

    #[test]
    fn test_shutdown_drains_cleanly() {
        let executor = JobExecutor::with_config(ExecutorConfig::default().with_workers(2));
        assert_eq!(executor.worker_count(), 2);
        executor.shutdown();
    }

    #[test]
    fn test_submit_returns_queued_handle() {
        let executor = JobExecutor::with_config(ExecutorConfig::default().with_workers(1));
        let handle = executor
            .submit(JobRequest::new(
                "/nonexistent/in.bag",
                std::env::temp_dir().join(format!("bagsift_exec_{}.bag", std::process::id())),
                FilterSpec::all(),
            ))
            .unwrap();
        // The job fails on open, but it must pass through the queue and
        // settle regardless.
        let status = handle.wait();
        assert_eq!(status, JobStatus::Failed);
        assert_eq!(handle.error().unwrap().kind(), "open");
        executor.shutdown();
    }
}
