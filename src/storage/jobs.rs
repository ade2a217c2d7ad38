// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Job table.

use redb::{ReadableDatabase, ReadableTable};
use uuid::Uuid;

use super::{Database, StorageError, StorageResult, JOBS};
use crate::jobs::{Job, JobStore};

impl JobStore for Database {
    fn create_job(&self, job: &Job) -> StorageResult<()> {
        let id = job.id.to_string();
        let json = serde_json::to_vec(job)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(JOBS)?;
            if table.get(id.as_str())?.is_some() {
                return Err(StorageError::AlreadyExists(format!("Job {id}")));
            }
            table.insert(id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn update_job(&self, job: &Job) -> StorageResult<()> {
        let id = job.id.to_string();
        let json = serde_json::to_vec(job)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(JOBS)?;

            // Read existing value and deserialize before mutating
            let existing: Job = {
                let existing = table
                    .get(id.as_str())?
                    .ok_or_else(|| StorageError::NotFound(format!("Job {id}")))?;
                serde_json::from_slice(existing.value())?
            };

            if !existing.state.can_transition_to(job.state) {
                return Err(StorageError::Conflict(format!(
                    "Job {id} is {} and cannot become {}",
                    existing.state, job.state
                )));
            }

            table.insert(id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get_job(&self, id: Uuid) -> StorageResult<Job> {
        let key = id.to_string();
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(JOBS)?;
        match table.get(key.as_str())? {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Err(StorageError::NotFound(format!("Job {key}"))),
        }
    }

    fn list_jobs(&self) -> StorageResult<Vec<Job>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(JOBS)?;

        let mut jobs = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            jobs.push(serde_json::from_slice::<Job>(value.value())?);
        }
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }
}
