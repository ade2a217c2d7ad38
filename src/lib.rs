// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Custody Server - Custodial Account Service
//!
//! Creates and operates on-chain accounts on behalf of end users. Chain
//! operations run as jobs on a bounded worker pool; private keys are
//! generated by pluggable custody backends and encrypted at rest.
//!
//! ## Modules
//!
//! - `jobs` - Job records, worker pool, job queries
//! - `keys` - Key manager, crypter, custody backends
//! - `chain` - Chain gateway client, transaction signing, seal waiting
//! - `storage` - Embedded redb database (jobs, keys, accounts)
//! - `accounts` / `tokens` - Account creation and token transfers
//! - `api` - HTTP API handlers (Axum)

pub mod accounts;
pub mod api;
pub mod chain;
pub mod config;
pub mod error;
pub mod jobs;
pub mod keys;
pub mod state;
pub mod storage;
pub mod tokens;

#[cfg(test)]
pub(crate) mod testing;
