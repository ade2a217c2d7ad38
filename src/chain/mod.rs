// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain integration.
//!
//! This module provides functionality for:
//! - Fetching accounts and their on-chain keys
//! - Building and signing transaction envelopes
//! - Submitting transactions and waiting for them to be sealed

pub mod gateway;
pub mod seal;
pub mod transaction;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use gateway::HttpChainClient;
pub use seal::{wait_for_seal, SealPolicy};
pub use transaction::{sign_envelope, SignedTransaction, TransactionEnvelope, TransactionSignature};

/// Signature algorithm of an account key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum SignatureAlgorithm {
    #[serde(rename = "ECDSA_P256")]
    EcdsaP256,
    #[serde(rename = "ECDSA_secp256k1")]
    EcdsaSecp256k1,
}

/// Hash algorithm applied before signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum HashAlgorithm {
    #[serde(rename = "SHA2_256")]
    Sha2_256,
    #[serde(rename = "SHA3_256")]
    Sha3_256,
}

/// One key of an on-chain account, as currently recorded on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountKey {
    pub index: u32,
    /// Hex-encoded public key
    pub public_key: String,
    pub sign_algo: SignatureAlgorithm,
    pub hash_algo: HashAlgorithm,
    pub weight: u32,
    /// Next sequence number this key must use as a proposal key
    pub sequence_number: u64,
    pub revoked: bool,
}

/// On-chain account with its key list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainAccount {
    pub address: String,
    /// Native token balance in the smallest unit
    pub balance: u64,
    pub keys: Vec<AccountKey>,
}

/// Execution status of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Finalized,
    Executed,
    Sealed,
    Expired,
}

/// Event emitted by a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: serde_json::Value,
}

/// Result of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionResult {
    pub status: TransactionStatus,
    /// Execution error, if the transaction reverted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub events: Vec<TransactionEvent>,
}

impl TransactionResult {
    /// First event of the given type.
    pub fn event(&self, event_type: &str) -> Option<&TransactionEvent> {
        self.events.iter().find(|e| e.event_type == event_type)
    }
}

/// Errors that can occur during chain operations.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid gateway URL: {0}")]
    InvalidUrl(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Transaction {tx_id} failed: {message}")]
    TransactionFailed { tx_id: String, message: String },

    #[error("Transaction {0} expired before being sealed")]
    Expired(String),

    #[error("Timed out waiting for transaction {0} to be sealed")]
    SealTimeout(String),

    #[error("Cancelled while waiting for transaction {0}")]
    Cancelled(String),
}

/// Access to the chain. Implementations must be safe to share across workers.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Fetch an account and its current key list.
    async fn get_account(&self, address: &str) -> Result<ChainAccount, ChainError>;

    /// Submit a signed transaction, returning its id.
    async fn send_transaction(&self, tx: &SignedTransaction) -> Result<String, ChainError>;

    /// Fetch the current result of a submitted transaction.
    async fn get_transaction_result(&self, tx_id: &str) -> Result<TransactionResult, ChainError>;
}
