// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Accounts
//!
//! Creating an account:
//!
//! 1. Generate a key with the default backend
//! 2. The admin account submits a create-account transaction carrying the
//!    new public key
//! 3. Wait for the seal and read the new address from the created event
//! 4. Store the account and its encrypted key in one database transaction
//!
//! [`AccountService::create_async`] runs the same steps as a job whose
//! result is the new address.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;
use utoipa::ToSchema;

use crate::chain::{
    sign_envelope, wait_for_seal, ChainClient, ChainError, SealPolicy, TransactionEnvelope,
};
use crate::jobs::{BoxError, Job, JobError, JobType, WorkerPool};
use crate::keys::{KeyError, KeyManager};
use crate::storage::{Database, StorageError};

/// Gateway template that creates an account paid for by the proposer.
pub const CREATE_ACCOUNT_SCRIPT: &str = "create_account";

/// Event type carrying the address of a newly created account.
pub const ACCOUNT_CREATED_EVENT: &str = "flow.AccountCreated";

/// Number of hex digits in an account address.
pub const ADDRESS_HEX_LEN: usize = 16;

/// Account created and managed by this service.
///
/// Keys are deliberately absent: they never leave the key store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Account {
    /// `0x`-prefixed lowercase address
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Errors of the account and token services.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("account {0} not found")]
    AccountNotFound(String),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Validate an account address and normalise it to `0x` + 16 lowercase hex
/// digits.
pub fn validate_address(address: &str) -> Result<String, ServiceError> {
    let trimmed = address.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if hex_part.len() != ADDRESS_HEX_LEN || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ServiceError::InvalidAddress(address.to_string()));
    }
    Ok(format!("0x{}", hex_part.to_ascii_lowercase()))
}

/// Everything account creation needs, without the pool.
///
/// Cloned into job functions.
#[derive(Clone)]
struct AccountCreator {
    db: Arc<Database>,
    keys: Arc<KeyManager>,
    chain: Arc<dyn ChainClient>,
    seal: SealPolicy,
}

impl AccountCreator {
    async fn create(&self, cancel: &CancellationToken) -> Result<Account, ServiceError> {
        let wrapped = self.keys.generate_default().await?;
        let admin = self.keys.admin_authorizer().await?;

        let envelope = TransactionEnvelope::new(
            CREATE_ACCOUNT_SCRIPT,
            vec![serde_json::to_value(&wrapped.public_key)?],
            &admin,
        );
        let signed = sign_envelope(envelope, &[&admin]).await?;
        let tx_id = self.chain.send_transaction(&signed).await?;

        let result = wait_for_seal(self.chain.as_ref(), &tx_id, self.seal, cancel).await?;
        let address = result
            .event(ACCOUNT_CREATED_EVENT)
            .and_then(|event| event.payload.get("address"))
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                ChainError::InvalidResponse(format!(
                    "transaction {tx_id} has no {ACCOUNT_CREATED_EVENT} event"
                ))
            })?;
        let address = validate_address(address).map_err(|_| {
            ChainError::InvalidResponse(format!("created account has malformed address {address}"))
        })?;

        let stored = self.keys.save(&wrapped.key, &address)?;
        let now = Utc::now();
        let account = Account {
            address,
            created_at: now,
            updated_at: now,
        };
        self.db.insert_account(&account, &[stored])?;

        info!(address = %account.address, tx_id = %tx_id, "Account created");
        Ok(account)
    }
}

/// Account creation and lookup.
#[derive(Clone)]
pub struct AccountService {
    creator: AccountCreator,
    pool: Arc<WorkerPool>,
}

impl AccountService {
    pub fn new(
        db: Arc<Database>,
        keys: Arc<KeyManager>,
        chain: Arc<dyn ChainClient>,
        pool: Arc<WorkerPool>,
        seal: SealPolicy,
    ) -> Self {
        Self {
            creator: AccountCreator {
                db,
                keys,
                chain,
                seal,
            },
            pool,
        }
    }

    /// Create an account and wait for it to be sealed.
    pub async fn create(&self, cancel: &CancellationToken) -> Result<Account, ServiceError> {
        self.creator.create(cancel).await
    }

    /// Submit account creation as a job. The job result is the new address.
    pub fn create_async(&self) -> Result<Job, ServiceError> {
        let creator = self.creator.clone();
        let job = self.pool.submit(JobType::CreateAccount, move |ctx| async move {
            let account = creator.create(&ctx.cancel).await?;
            Ok::<_, BoxError>(account.address)
        })?;
        Ok(job)
    }

    /// All accounts, oldest first.
    pub fn list(&self) -> Result<Vec<Account>, ServiceError> {
        Ok(self.creator.db.list_accounts()?)
    }

    pub fn details(&self, address: &str) -> Result<Account, ServiceError> {
        let address = validate_address(address)?;
        self.creator.db.get_account(&address).map_err(|e| match e {
            StorageError::NotFound(_) => ServiceError::AccountNotFound(address),
            other => ServiceError::Storage(other),
        })
    }

    pub fn validate_address(&self, address: &str) -> Result<String, ServiceError> {
        validate_address(address)
    }
}
