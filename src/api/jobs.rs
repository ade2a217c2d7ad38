// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Job status endpoints.
//!
//! Jobs are created by the account and transfer endpoints; these handlers
//! only read them.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{error::ApiError, jobs::Job, state::AppState};

/// Response containing a list of jobs.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobListResponse {
    /// Jobs, newest first.
    pub jobs: Vec<Job>,
    /// Total count of jobs.
    pub total: usize,
}

/// List all jobs.
#[utoipa::path(
    get,
    path = "/v1/jobs",
    tag = "Jobs",
    responses(
        (status = 200, description = "List of jobs", body = JobListResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_jobs(State(state): State<AppState>) -> Result<Json<JobListResponse>, ApiError> {
    let jobs = state.jobs.list()?;
    let total = jobs.len();
    Ok(Json(JobListResponse { jobs, total }))
}

/// Get a job by ID.
#[utoipa::path(
    get,
    path = "/v1/jobs/{job_id}",
    tag = "Jobs",
    params(
        ("job_id" = String, Path, description = "Job ID (UUID)")
    ),
    responses(
        (status = 200, description = "Job details", body = Job),
        (status = 400, description = "Malformed job ID"),
        (status = 404, description = "Job not found")
    )
)]
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    let id = Uuid::parse_str(&job_id)
        .map_err(|_| ApiError::bad_request(format!("Invalid job ID: {job_id}")))?;
    Ok(Json(state.jobs.details(id)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_state;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn list_and_get_submitted_job() {
        let (state, _harness) = test_state(4);
        let job = state.accounts.create_async().unwrap();

        let Json(list) = list_jobs(State(state.clone())).await.unwrap();
        assert_eq!(list.total, 1);
        assert_eq!(list.jobs[0].id, job.id);

        let Json(found) = get_job(State(state), Path(job.id.to_string()))
            .await
            .unwrap();
        assert_eq!(found.id, job.id);
        assert_eq!(found.job_type, job.job_type);
    }

    #[tokio::test]
    async fn malformed_id_is_bad_request() {
        let (state, _harness) = test_state(4);

        let err = get_job(State(state), Path("not-a-uuid".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let (state, _harness) = test_state(4);

        let err = get_job(State(state), Path(Uuid::new_v4().to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
