// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::accounts::ServiceError;
use crate::jobs::JobError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Retryable condition, e.g. a full job queue.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<JobError> for ApiError {
    fn from(e: JobError) -> Self {
        match e {
            JobError::Capacity => Self::service_unavailable(e.to_string()),
            JobError::NotFound(_) => Self::not_found(e.to_string()),
            JobError::NoWorkers | JobError::Stopped => Self::service_unavailable(e.to_string()),
            JobError::InvalidTransition { .. } | JobError::Storage(_) => {
                tracing::error!(error = %e, "Job operation failed");
                Self::internal(e.to_string())
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::InvalidAddress(_) | ServiceError::InvalidAmount(_) => {
                Self::bad_request(e.to_string())
            }
            ServiceError::AccountNotFound(_) => Self::not_found(e.to_string()),
            ServiceError::Job(job) => job.into(),
            // Key errors never carry key material in their message.
            other => {
                tracing::error!(error = %other, "Service operation failed");
                Self::internal(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use uuid::Uuid;

    #[test]
    fn constructors_set_status_and_message() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.message, "missing");

        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.message, "bad");

        let busy = ApiError::service_unavailable("busy");
        assert_eq!(busy.status, StatusCode::SERVICE_UNAVAILABLE);

        let internal = ApiError::internal("oops");
        assert_eq!(internal.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data"}"#);
    }

    #[tokio::test]
    async fn capacity_maps_to_retryable_503() {
        let err: ApiError = ServiceError::Job(JobError::Capacity).into();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);

        let body_bytes = to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(
            body_bytes.as_ref(),
            br#"{"error":"max capacity reached, try again later"}"#
        );
    }

    #[test]
    fn domain_errors_map_to_status_codes() {
        let invalid: ApiError = ServiceError::InvalidAddress("x".into()).into();
        assert_eq!(invalid.status, StatusCode::BAD_REQUEST);

        let missing: ApiError = ServiceError::AccountNotFound("0x01".into()).into();
        assert_eq!(missing.status, StatusCode::NOT_FOUND);

        let job_missing: ApiError = JobError::NotFound(Uuid::new_v4()).into();
        assert_eq!(job_missing.status, StatusCode::NOT_FOUND);

        let chain: ApiError =
            ServiceError::Chain(crate::chain::ChainError::Rpc("down".into())).into();
        assert_eq!(chain.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
