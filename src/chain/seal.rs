// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Waiting for submitted transactions to be sealed.
//!
//! Retrying lives here rather than in the worker pool: a job that submits a
//! transaction polls until the chain reports a final outcome.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{ChainClient, ChainError, TransactionResult, TransactionStatus};

/// Consecutive RPC failures tolerated before giving up.
const MAX_CONSECUTIVE_ERRORS: u32 = 3;

/// How to poll for a seal.
#[derive(Debug, Clone, Copy)]
pub struct SealPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for SealPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Poll `tx_id` until it is sealed.
///
/// Fails if the transaction reverted, expired, did not seal within the
/// policy timeout, or `cancel` fired.
pub async fn wait_for_seal(
    chain: &dyn ChainClient,
    tx_id: &str,
    policy: SealPolicy,
    cancel: &CancellationToken,
) -> Result<TransactionResult, ChainError> {
    let deadline = Instant::now() + policy.timeout;
    let mut consecutive_errors = 0;

    loop {
        match chain.get_transaction_result(tx_id).await {
            Ok(result) => {
                consecutive_errors = 0;

                if let Some(message) = result.error_message.as_ref().filter(|m| !m.is_empty()) {
                    return Err(ChainError::TransactionFailed {
                        tx_id: tx_id.to_string(),
                        message: message.clone(),
                    });
                }

                match result.status {
                    TransactionStatus::Sealed => {
                        tracing::debug!(tx_id = %tx_id, "Transaction sealed");
                        return Ok(result);
                    }
                    TransactionStatus::Expired => {
                        return Err(ChainError::Expired(tx_id.to_string()));
                    }
                    _ => {}
                }
            }
            Err(e) => {
                consecutive_errors += 1;
                tracing::warn!(
                    tx_id = %tx_id,
                    attempt = consecutive_errors,
                    error = %e,
                    "Failed to fetch transaction result"
                );
                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    return Err(e);
                }
            }
        }

        if Instant::now() + policy.poll_interval > deadline {
            return Err(ChainError::SealTimeout(tx_id.to_string()));
        }

        tokio::select! {
            _ = tokio::time::sleep(policy.poll_interval) => {},
            _ = cancel.cancelled() => {
                return Err(ChainError::Cancelled(tx_id.to_string()));
            }
        }
    }
}
