// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `jobs`: job id → serialized [`Job`](crate::jobs::Job)
//! - `account_keys`: `address|index` → serialized [`StoredKey`](crate::keys::StoredKey)
//! - `accounts`: address → serialized [`Account`](crate::accounts::Account)
//!
//! Every mutation is a single redb write transaction, so a state change is
//! durable before the call returns. Readers use MVCC snapshots and never
//! wait on writers.

pub mod accounts;
pub mod jobs;
pub mod keys;

use std::path::Path;

use redb::{Database as Redb, ReadableDatabase, TableDefinition};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary job table: job id (string) → JSON bytes.
const JOBS: TableDefinition<&str, &[u8]> = TableDefinition::new("jobs");

/// Encrypted keys: composite `address|index` → JSON bytes.
const ACCOUNT_KEYS: TableDefinition<&str, &[u8]> = TableDefinition::new("account_keys");

/// Accounts created by this service: address → JSON bytes.
const ACCOUNTS: TableDefinition<&str, &[u8]> = TableDefinition::new("accounts");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// Database
// =============================================================================

/// Embedded ACID database holding jobs, encrypted keys and accounts.
pub struct Database {
    db: Redb,
}

impl Database {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Redb::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(JOBS)?;
            let _ = write_txn.open_table(ACCOUNT_KEYS)?;
            let _ = write_txn.open_table(ACCOUNTS)?;
        }
        write_txn.commit()?;

        tracing::info!(path = %path.display(), "Database opened");
        Ok(Self { db })
    }

    /// Verify the database answers a read transaction.
    pub fn health_check(&self) -> StorageResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(JOBS)?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn temp_db() -> (Database, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("test.redb")).unwrap();
    (db, dir)
}
