// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Worker Pool
//!
//! Bounded in-memory queue plus a set of long-lived worker tasks.
//!
//! ## Submission
//!
//! 1. Reserve a queue slot without waiting (`Capacity` if the queue is full)
//! 2. Persist the job as `Accepted`
//! 3. Hand the job function to the reserved slot
//!
//! A rejected submission is therefore never persisted, and a persisted job
//! always has a slot waiting for it.
//!
//! ## Execution
//!
//! Workers share one receiver. A worker claims a job by persisting the
//! `Processing` transition; the store refuses a second claim, so each job
//! runs at most once. The job function runs in its own task so a panic is
//! recorded as a job failure instead of killing the worker.
//!
//! ## Shutdown
//!
//! [`WorkerPool::stop`] cancels the pool token and waits for every worker to
//! finish its current job. Jobs still queued stay `Accepted` in the store and
//! are cleaned up by [`WorkerPool::recover_interrupted`] on the next start.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::types::{Job, JobError, JobState, JobStore, JobType};

/// Error type returned by job functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Future produced by a job function.
pub type JobFuture = Pin<Box<dyn Future<Output = Result<String, BoxError>> + Send>>;

type JobFn = Box<dyn FnOnce(JobContext) -> JobFuture + Send>;

/// Message recorded on jobs that a previous process never finished.
pub const INTERRUPTED_MESSAGE: &str = "interrupted by restart";

/// Execution context handed to a job function.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: Uuid,
    pub job_type: JobType,
    /// Fires only when the pool is stopped.
    pub cancel: CancellationToken,
}

struct QueuedJob {
    job: Job,
    work: JobFn,
}

/// Bounded queue with a growable set of workers.
pub struct WorkerPool {
    store: Arc<dyn JobStore>,
    sender: mpsc::Sender<QueuedJob>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<QueuedJob>>>,
    capacity: usize,
    shutdown: CancellationToken,
    worker_count: AtomicUsize,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a pool with a queue of `capacity` slots and no workers.
    ///
    /// `capacity` is clamped to at least one slot.
    pub fn new(store: Arc<dyn JobStore>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            store,
            sender,
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
            capacity,
            shutdown: CancellationToken::new(),
            worker_count: AtomicUsize::new(0),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of workers started so far.
    pub fn worker_count(&self) -> usize {
        self.worker_count.load(Ordering::SeqCst)
    }

    /// Start `n` more workers. Must be called from within a tokio runtime.
    pub fn add_workers(&self, n: usize) -> Result<(), JobError> {
        if n == 0 {
            return Err(JobError::NoWorkers);
        }
        if self.shutdown.is_cancelled() {
            return Err(JobError::Stopped);
        }

        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        for _ in 0..n {
            let worker_id = self.worker_count.fetch_add(1, Ordering::SeqCst);
            handles.push(tokio::spawn(run_worker(
                worker_id,
                Arc::clone(&self.store),
                Arc::clone(&self.receiver),
                self.shutdown.clone(),
            )));
        }

        info!(added = n, total = self.worker_count(), "Workers started");
        Ok(())
    }

    /// Persist a new job and queue `work` for execution.
    ///
    /// Never waits for a queue slot: a full queue fails with
    /// [`JobError::Capacity`] and nothing is persisted.
    pub fn submit<F, Fut>(&self, job_type: JobType, work: F) -> Result<Job, JobError>
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<String, BoxError>> + Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            return Err(JobError::Stopped);
        }
        if self.worker_count() == 0 {
            return Err(JobError::NoWorkers);
        }

        let permit = self.sender.try_reserve().map_err(|e| match e {
            TrySendError::Full(()) => JobError::Capacity,
            TrySendError::Closed(()) => JobError::Stopped,
        })?;

        let mut job = Job::new(job_type);
        job.transition(JobState::Accepted)?;
        // Dropping the permit on failure gives the slot back.
        self.store.create_job(&job)?;

        permit.send(QueuedJob {
            job: job.clone(),
            work: Box::new(move |ctx| Box::pin(work(ctx))),
        });

        info!(job_id = %job.id, job_type = ?job.job_type, "Job accepted");
        Ok(job)
    }

    /// Fail every job a previous process left `Accepted` or `Processing`.
    ///
    /// Job functions do not survive a restart, so these jobs can never
    /// finish. Call before starting workers. Returns the number of jobs
    /// updated.
    pub fn recover_interrupted(&self) -> Result<usize, JobError> {
        let mut recovered = 0;
        for mut job in self.store.list_jobs()? {
            if job.state == JobState::Accepted {
                job.transition(JobState::Processing)?;
                self.store.update_job(&job)?;
            }
            if job.state != JobState::Processing {
                continue;
            }
            job.fail(INTERRUPTED_MESSAGE)?;
            self.store.update_job(&job)?;
            recovered += 1;
        }

        if recovered > 0 {
            warn!(count = recovered, "Marked interrupted jobs as failed");
        }
        Ok(recovered)
    }

    /// Signal every worker to exit and wait for them.
    ///
    /// Running jobs see their context token fire and are awaited; queued
    /// jobs keep their last persisted state.
    pub async fn stop(&self) {
        self.shutdown.cancel();

        let handles =
            std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker task ended abnormally");
            }
        }

        info!("Worker pool stopped");
    }
}

async fn run_worker(
    worker_id: usize,
    store: Arc<dyn JobStore>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<QueuedJob>>>,
    shutdown: CancellationToken,
) {
    debug!(worker_id, "Worker running");

    loop {
        let next = {
            let mut rx = receiver.lock().await;
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                queued = rx.recv() => queued,
            }
        };

        let Some(queued) = next else {
            break;
        };
        execute(worker_id, store.as_ref(), queued, &shutdown).await;
    }

    debug!(worker_id, "Worker exiting");
}

/// Claim, run and record one job.
///
/// If the `Processing` claim cannot be persisted the job function is
/// dropped unrun and the record stays `Accepted`; the store refuses
/// `Accepted -> Error`, so it is failed by the next
/// [`WorkerPool::recover_interrupted`].
async fn execute(
    worker_id: usize,
    store: &dyn JobStore,
    queued: QueuedJob,
    shutdown: &CancellationToken,
) {
    let QueuedJob { mut job, work } = queued;

    if let Err(e) = job.transition(JobState::Processing) {
        error!(job_id = %job.id, error = %e, "Dequeued job in unexpected state");
        return;
    }
    // The store only accepts Accepted -> Processing once.
    if let Err(e) = store.update_job(&job) {
        error!(job_id = %job.id, worker_id, error = %e, "Could not claim job, skipping");
        return;
    }
    debug!(job_id = %job.id, worker_id, "Job processing");

    let ctx = JobContext {
        job_id: job.id,
        job_type: job.job_type,
        cancel: shutdown.child_token(),
    };

    // Call the closure inside the task too: it may panic before returning
    // its future.
    let outcome = match tokio::spawn(async move { work(ctx).await }).await {
        Ok(outcome) => outcome,
        Err(e) => Err(format!("job function aborted: {e}").into()),
    };

    let finished = match outcome {
        Ok(result) => job.complete(result),
        Err(e) => {
            warn!(job_id = %job.id, error = %e, "Job failed");
            job.fail(e.to_string())
        }
    };
    if let Err(e) = finished {
        error!(job_id = %job.id, error = %e, "Could not finish job");
        return;
    }

    match store.update_job(&job) {
        Ok(()) => info!(job_id = %job.id, state = %job.state, "Job finished"),
        Err(e) => error!(job_id = %job.id, error = %e, "Failed to persist job outcome"),
    }
}
