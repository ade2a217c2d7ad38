// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account and transfer endpoints.
//!
//! Creation and transfers run as jobs: the handlers return `201` with the
//! accepted job, or `503` when the job queue is full.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{accounts::Account, error::ApiError, jobs::Job, state::AppState};

/// Response containing a list of accounts.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountListResponse {
    pub accounts: Vec<Account>,
    /// Total count of accounts.
    pub total: usize,
}

/// Request to transfer native tokens from an account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateTransferRequest {
    /// Recipient account address.
    pub recipient: String,
    /// Decimal amount with at most 8 fractional digits, e.g. `"1.5"`.
    pub amount: String,
}

/// List all accounts created by this service.
#[utoipa::path(
    get,
    path = "/v1/accounts",
    tag = "Accounts",
    responses(
        (status = 200, description = "List of accounts", body = AccountListResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_accounts(
    State(state): State<AppState>,
) -> Result<Json<AccountListResponse>, ApiError> {
    let accounts = state.accounts.list()?;
    let total = accounts.len();
    Ok(Json(AccountListResponse { accounts, total }))
}

/// Create a new account.
///
/// Generates a key, submits the creation transaction from the admin account
/// and returns the job tracking it. The job result is the new address.
#[utoipa::path(
    post,
    path = "/v1/accounts",
    tag = "Accounts",
    responses(
        (status = 201, description = "Account creation accepted", body = Job),
        (status = 503, description = "Job queue full, try again later")
    )
)]
pub async fn create_account(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    let job = state.accounts.create_async()?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// Get an account by address.
#[utoipa::path(
    get,
    path = "/v1/accounts/{address}",
    tag = "Accounts",
    params(
        ("address" = String, Path, description = "Account address")
    ),
    responses(
        (status = 200, description = "Account details", body = Account),
        (status = 400, description = "Invalid address"),
        (status = 404, description = "Account not found")
    )
)]
pub async fn get_account(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<Account>, ApiError> {
    Ok(Json(state.accounts.details(&address)?))
}

/// Transfer native tokens from an account.
///
/// Signs with the account's least recently used key (or the configured key
/// for the admin account). The job result is the transaction id.
#[utoipa::path(
    post,
    path = "/v1/accounts/{address}/transfers",
    tag = "Accounts",
    params(
        ("address" = String, Path, description = "Sender account address")
    ),
    request_body = CreateTransferRequest,
    responses(
        (status = 201, description = "Transfer accepted", body = Job),
        (status = 400, description = "Invalid address or amount"),
        (status = 503, description = "Job queue full, try again later")
    )
)]
pub async fn create_transfer(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(request): Json<CreateTransferRequest>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    let job = state
        .tokens
        .transfer_async(&address, &request.recipient, &request.amount)?;
    Ok((StatusCode::CREATED, Json(job)))
}
