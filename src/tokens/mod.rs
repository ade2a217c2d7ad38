// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Native token transfers.
//!
//! Amounts are fixed-point decimals with 8 fractional digits, carried on
//! chain as a `u64` count of the smallest unit.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::accounts::{validate_address, ServiceError};
use crate::chain::{sign_envelope, wait_for_seal, ChainClient, SealPolicy, TransactionEnvelope};
use crate::jobs::{BoxError, Job, JobType, WorkerPool};
use crate::keys::KeyManager;

/// Gateway template moving native tokens from the proposer to a recipient.
pub const TRANSFER_TOKENS_SCRIPT: &str = "transfer_tokens";

/// Fractional digits of a token amount.
pub const DECIMALS: u32 = 8;

const UNITS_PER_TOKEN: u64 = 10u64.pow(DECIMALS);

/// Strictly positive token amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TokenAmount(u64);

impl TokenAmount {
    /// Amount in the smallest unit.
    pub fn units(&self) -> u64 {
        self.0
    }
}

impl FromStr for TokenAmount {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ServiceError::InvalidAmount(s.to_string());
        let s_trimmed = s.trim();

        let (whole, fraction) = s_trimmed.split_once('.').unwrap_or((s_trimmed, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
            || fraction.len() > DECIMALS as usize
        {
            return Err(invalid());
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let fraction: u64 = if fraction.is_empty() {
            0
        } else {
            let padded = format!("{fraction:0<width$}", width = DECIMALS as usize);
            padded.parse().map_err(|_| invalid())?
        };

        let units = whole
            .checked_mul(UNITS_PER_TOKEN)
            .and_then(|w| w.checked_add(fraction))
            .ok_or_else(invalid)?;
        if units == 0 {
            return Err(invalid());
        }
        Ok(TokenAmount(units))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:0width$}",
            self.0 / UNITS_PER_TOKEN,
            self.0 % UNITS_PER_TOKEN,
            width = DECIMALS as usize
        )
    }
}

#[derive(Clone)]
struct Transferrer {
    keys: Arc<KeyManager>,
    chain: Arc<dyn ChainClient>,
    seal: SealPolicy,
}

impl Transferrer {
    async fn transfer(
        &self,
        sender: &str,
        recipient: &str,
        amount: TokenAmount,
        cancel: &CancellationToken,
    ) -> Result<String, ServiceError> {
        // The admin address resolves to the configured admin key.
        let authorizer = self.keys.user_authorizer(sender).await?;

        let envelope = TransactionEnvelope::new(
            TRANSFER_TOKENS_SCRIPT,
            vec![
                serde_json::Value::String(amount.to_string()),
                serde_json::Value::String(recipient.to_string()),
            ],
            &authorizer,
        );
        let signed = sign_envelope(envelope, &[&authorizer]).await?;
        let tx_id = self.chain.send_transaction(&signed).await?;
        wait_for_seal(self.chain.as_ref(), &tx_id, self.seal, cancel).await?;

        info!(
            sender = %sender,
            recipient = %recipient,
            amount = %amount,
            tx_id = %tx_id,
            "Tokens transferred"
        );
        Ok(tx_id)
    }
}

/// Validated transfer parameters.
struct TransferRequest {
    sender: String,
    recipient: String,
    amount: TokenAmount,
}

impl TransferRequest {
    fn parse(sender: &str, recipient: &str, amount: &str) -> Result<Self, ServiceError> {
        Ok(Self {
            sender: validate_address(sender)?,
            recipient: validate_address(recipient)?,
            amount: amount.parse()?,
        })
    }
}

#[derive(Clone)]
pub struct TokenService {
    transferrer: Transferrer,
    pool: Arc<WorkerPool>,
}

impl TokenService {
    pub fn new(
        keys: Arc<KeyManager>,
        chain: Arc<dyn ChainClient>,
        pool: Arc<WorkerPool>,
        seal: SealPolicy,
    ) -> Self {
        Self {
            transferrer: Transferrer { keys, chain, seal },
            pool,
        }
    }

    /// Transfer `amount` tokens and wait for the seal. Returns the
    /// transaction id.
    pub async fn transfer(
        &self,
        sender: &str,
        recipient: &str,
        amount: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ServiceError> {
        let request = TransferRequest::parse(sender, recipient, amount)?;
        self.transferrer
            .transfer(&request.sender, &request.recipient, request.amount, cancel)
            .await
    }

    /// Validate the transfer, then run it as a job whose result is the
    /// transaction id.
    pub fn transfer_async(
        &self,
        sender: &str,
        recipient: &str,
        amount: &str,
    ) -> Result<Job, ServiceError> {
        let request = TransferRequest::parse(sender, recipient, amount)?;
        let transferrer = self.transferrer.clone();

        let job = self.pool.submit(JobType::TransferToken, move |ctx| async move {
            let tx_id = transferrer
                .transfer(&request.sender, &request.recipient, request.amount, &ctx.cancel)
                .await?;
            Ok::<_, BoxError>(tx_id)
        })?;
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::tests::{harness, wait_for_job, Harness};
    use crate::jobs::{JobState, JobStore};
    use crate::testing::ADMIN_ADDRESS;

    fn token_service(h: &Harness) -> TokenService {
        TokenService::new(
            h.keys.clone(),
            h.chain.clone(),
            h.pool.clone(),
            crate::accounts::tests::fast_seal(),
        )
    }

    #[test]
    fn amount_parsing() {
        assert_eq!("1".parse::<TokenAmount>().unwrap().units(), 100_000_000);
        assert_eq!("1.5".parse::<TokenAmount>().unwrap().units(), 150_000_000);
        assert_eq!("0.00000001".parse::<TokenAmount>().unwrap().units(), 1);
        assert_eq!(".25".parse::<TokenAmount>().unwrap().units(), 25_000_000);
        assert_eq!("12.".parse::<TokenAmount>().unwrap().units(), 1_200_000_000);
    }

    #[test]
    fn amount_rejects_invalid_values() {
        for bad in [
            "", ".", "0", "0.0", "-1", "1.000000001", "1e5", "abc", "1.2.3",
            "184467440738",
        ] {
            assert!(
                matches!(bad.parse::<TokenAmount>(), Err(ServiceError::InvalidAmount(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn amount_displays_with_fixed_decimals() {
        assert_eq!("1.5".parse::<TokenAmount>().unwrap().to_string(), "1.50000000");
        assert_eq!("0.00000001".parse::<TokenAmount>().unwrap().to_string(), "0.00000001");
    }

    #[tokio::test]
    async fn admin_funds_new_account_and_account_sends_back() {
        let h = harness(4);
        let tokens = token_service(&h);
        let cancel = CancellationToken::new();
        let account = h.service.create(&cancel).await.unwrap();

        tokens
            .transfer(ADMIN_ADDRESS, &account.address, "1.0", &cancel)
            .await
            .unwrap();
        tokens
            .transfer(&account.address, ADMIN_ADDRESS, "0.5", &cancel)
            .await
            .unwrap();

        let sent = h.chain.sent_transactions();
        // create_account, admin -> account, account -> admin
        assert_eq!(sent.len(), 3);

        let funding = &sent[1].envelope;
        assert_eq!(funding.script, TRANSFER_TOKENS_SCRIPT);
        assert_eq!(funding.proposal_key.address, ADMIN_ADDRESS);
        assert_eq!(funding.arguments[0], "1.00000000");
        assert_eq!(funding.arguments[1], account.address.as_str());

        let refund = &sent[2].envelope;
        assert_eq!(refund.proposal_key.address, account.address);
        assert_eq!(refund.payer, account.address);
        assert_eq!(sent[2].signatures[0].address, account.address);
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_submission() {
        let h = harness(4);
        let tokens = token_service(&h);

        assert!(matches!(
            tokens.transfer_async("bad", ADMIN_ADDRESS, "1.0"),
            Err(ServiceError::InvalidAddress(_))
        ));
        assert!(matches!(
            tokens.transfer_async(ADMIN_ADDRESS, ADMIN_ADDRESS, "-1"),
            Err(ServiceError::InvalidAmount(_))
        ));
        assert!(h.db.list_jobs().unwrap().is_empty());
        assert!(h.chain.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn transfer_async_records_transaction_id() {
        let h = harness(4);
        let tokens = token_service(&h);
        let account = h.service.create(&CancellationToken::new()).await.unwrap();

        let job = tokens
            .transfer_async(ADMIN_ADDRESS, &account.address, "2")
            .unwrap();
        assert_eq!(job.job_type, JobType::TransferToken);

        let done = wait_for_job(&h.db, &job).await;
        assert_eq!(done.state, JobState::Complete, "error: {:?}", done.error);
        assert_eq!(done.result.as_deref(), Some("tx-2"));
    }

    #[tokio::test]
    async fn transfer_from_unknown_sender_fails_job() {
        let h = harness(4);
        let tokens = token_service(&h);

        let job = tokens
            .transfer_async("0x0000000000000042", ADMIN_ADDRESS, "1")
            .unwrap();
        let done = wait_for_job(&h.db, &job).await;

        assert_eq!(done.state, JobState::Error);
        assert!(done.error.unwrap().contains("no keys found"));
    }
}
