// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Read access to job records.

use std::sync::Arc;

use uuid::Uuid;

use super::types::{Job, JobError, JobStore};
use crate::storage::StorageError;

#[derive(Clone)]
pub struct JobService {
    store: Arc<dyn JobStore>,
}

impl JobService {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// All jobs, newest first.
    pub fn list(&self) -> Result<Vec<Job>, JobError> {
        Ok(self.store.list_jobs()?)
    }

    pub fn details(&self, id: Uuid) -> Result<Job, JobError> {
        self.store.get_job(id).map_err(|e| match e {
            StorageError::NotFound(_) => JobError::NotFound(id),
            other => JobError::Storage(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{JobState, JobType};
    use crate::storage::temp_db;

    #[test]
    fn details_of_unknown_job_is_not_found() {
        let (db, _dir) = temp_db();
        let service = JobService::new(Arc::new(db));

        let id = Uuid::new_v4();
        assert!(matches!(service.details(id), Err(JobError::NotFound(missing)) if missing == id));
    }

    #[test]
    fn list_and_details_return_stored_jobs() {
        let (db, _dir) = temp_db();
        let db = Arc::new(db);
        let mut job = Job::new(JobType::TransferToken);
        job.transition(JobState::Accepted).unwrap();
        db.create_job(&job).unwrap();

        let service = JobService::new(db);

        assert_eq!(service.list().unwrap(), vec![job.clone()]);
        assert_eq!(service.details(job.id).unwrap(), job);
    }
}
