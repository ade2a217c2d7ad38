// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    accounts::Account,
    jobs::{Job, JobState, JobType},
    state::AppState,
};

pub mod accounts;
pub mod health;
pub mod jobs;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/{job_id}", get(jobs::get_job))
        .route(
            "/accounts",
            get(accounts::list_accounts).post(accounts::create_account),
        )
        .route("/accounts/{address}", get(accounts::get_account))
        .route(
            "/accounts/{address}/transfers",
            post(accounts::create_transfer),
        )
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        jobs::list_jobs,
        jobs::get_job,
        accounts::list_accounts,
        accounts::create_account,
        accounts::get_account,
        accounts::create_transfer
    ),
    components(
        schemas(
            Job,
            JobState,
            JobType,
            Account,
            jobs::JobListResponse,
            accounts::AccountListResponse,
            accounts::CreateTransferRequest,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Jobs", description = "Asynchronous job status"),
        (name = "Accounts", description = "Custodial accounts and token transfers")
    )
)]
struct ApiDoc;

/// Application state over a temp database, a fake chain and one worker.
#[cfg(test)]
pub(crate) fn test_state(capacity: usize) -> (AppState, crate::accounts::tests::Harness) {
    let harness = crate::accounts::tests::harness(capacity);
    let tokens = crate::tokens::TokenService::new(
        harness.keys.clone(),
        harness.chain.clone(),
        harness.pool.clone(),
        crate::accounts::tests::fast_seal(),
    );
    let state = AppState::new(
        harness.db.clone(),
        harness.pool.clone(),
        harness.service.clone(),
        tokens,
    );
    (state, harness)
}
