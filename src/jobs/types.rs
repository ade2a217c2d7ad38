// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Job records and their state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::storage::StorageError;

/// Lifecycle state of a job.
///
/// ```text
/// Init → Accepted → Processing → Complete
///                              ↘ Error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum JobState {
    /// Constructed but not yet persisted
    Init,
    /// Persisted and waiting in the queue
    Accepted,
    /// Owned by a worker
    Processing,
    /// Finished successfully, `result` is set
    Complete,
    /// Finished with a failure, `error` is set
    Error,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Complete | JobState::Error)
    }

    /// Whether `self → next` is an edge of the state machine.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Init, JobState::Accepted)
                | (JobState::Accepted, JobState::Processing)
                | (JobState::Processing, JobState::Complete)
                | (JobState::Processing, JobState::Error)
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Which kind of work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    CreateAccount,
    TransferToken,
}

/// Durable record of one asynchronous unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Job {
    /// Unique job identifier (UUID v4)
    pub id: Uuid,
    pub job_type: JobType,
    pub state: JobState,
    /// Output of the job function (an address, a transaction id, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Failure description when `state` is `Error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a job in the `Init` state.
    pub fn new(job_type: JobType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            job_type,
            state: JobState::Init,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next`, refusing edges outside the state machine.
    pub fn transition(&mut self, next: JobState) -> Result<(), JobError> {
        if !self.state.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                id: self.id,
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Finish successfully with `result`.
    pub fn complete(&mut self, result: String) -> Result<(), JobError> {
        self.transition(JobState::Complete)?;
        self.result = Some(result);
        self.error = None;
        Ok(())
    }

    /// Finish with a failure description.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), JobError> {
        self.transition(JobState::Error)?;
        self.error = Some(message.into());
        self.result = None;
        Ok(())
    }
}

/// Durable store of job records.
pub trait JobStore: Send + Sync {
    /// Insert a new job. Fails if the id already exists.
    fn create_job(&self, job: &Job) -> Result<(), StorageError>;

    /// Replace a job record. Fails if the stored state cannot move to the
    /// new state, so terminal jobs can never be rewritten.
    fn update_job(&self, job: &Job) -> Result<(), StorageError>;

    fn get_job(&self, id: Uuid) -> Result<Job, StorageError>;

    /// All jobs, newest first.
    fn list_jobs(&self) -> Result<Vec<Job>, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("max capacity reached, try again later")]
    Capacity,

    #[error("no workers are running")]
    NoWorkers,

    #[error("worker pool is stopped")]
    Stopped,

    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: JobState,
        to: JobState,
    },

    #[error("job store error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for JobError {
    fn from(e: StorageError) -> Self {
        JobError::Storage(e)
    }
}
