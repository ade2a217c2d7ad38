// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::accounts::AccountService;
use crate::jobs::{JobService, WorkerPool};
use crate::storage::Database;
use crate::tokens::TokenService;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub jobs: JobService,
    pub pool: Arc<WorkerPool>,
    pub accounts: AccountService,
    pub tokens: TokenService,
}

impl AppState {
    pub fn new(
        db: Arc<Database>,
        pool: Arc<WorkerPool>,
        accounts: AccountService,
        tokens: TokenService,
    ) -> Self {
        Self {
            jobs: JobService::new(db.clone()),
            db,
            pool,
            accounts,
            tokens,
        }
    }
}
