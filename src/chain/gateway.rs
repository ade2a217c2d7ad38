// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! REST client for the chain gateway.
//!
//! The gateway encodes 64-bit integers as decimal strings, so wire types are
//! kept separate from the domain types in [`super`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{
    AccountKey, ChainAccount, ChainClient, ChainError, HashAlgorithm, SignatureAlgorithm,
    SignedTransaction, TransactionResult,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Deserialize)]
struct WireAccount {
    address: String,
    balance: String,
    #[serde(default)]
    keys: Vec<WireAccountKey>,
}

#[derive(Deserialize)]
struct WireAccountKey {
    index: String,
    public_key: String,
    signing_algorithm: SignatureAlgorithm,
    hashing_algorithm: HashAlgorithm,
    sequence_number: String,
    weight: String,
    revoked: bool,
}

#[derive(Deserialize)]
struct WireSubmitted {
    id: String,
}

fn parse_number<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T, ChainError> {
    raw.parse()
        .map_err(|_| ChainError::InvalidResponse(format!("{field} is not a number: {raw}")))
}

impl TryFrom<WireAccountKey> for AccountKey {
    type Error = ChainError;

    fn try_from(wire: WireAccountKey) -> Result<Self, Self::Error> {
        Ok(Self {
            index: parse_number("index", &wire.index)?,
            public_key: wire.public_key.trim_start_matches("0x").to_string(),
            sign_algo: wire.signing_algorithm,
            hash_algo: wire.hashing_algorithm,
            weight: parse_number("weight", &wire.weight)?,
            sequence_number: parse_number("sequence_number", &wire.sequence_number)?,
            revoked: wire.revoked,
        })
    }
}

impl TryFrom<WireAccount> for ChainAccount {
    type Error = ChainError;

    fn try_from(wire: WireAccount) -> Result<Self, Self::Error> {
        let mut keys = wire
            .keys
            .into_iter()
            .map(AccountKey::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        keys.sort_by_key(|k| k.index);

        Ok(Self {
            address: wire.address,
            balance: parse_number("balance", &wire.balance)?,
            keys,
        })
    }
}

/// Chain client backed by the gateway's REST API.
#[derive(Clone)]
pub struct HttpChainClient {
    base_url: url::Url,
    http: reqwest::Client,
}

impl HttpChainClient {
    /// Create a client for the gateway at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, ChainError> {
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url =
            url::Url::parse(&base).map_err(|e| ChainError::InvalidUrl(e.to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ChainError::Rpc(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { base_url, http })
    }

    fn url(&self, path: &str) -> Result<url::Url, ChainError> {
        self.base_url
            .join(path)
            .map_err(|e| ChainError::InvalidUrl(e.to_string()))
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn get_account(&self, address: &str) -> Result<ChainAccount, ChainError> {
        let mut url = self.url(&format!("v1/accounts/{}", address.trim_start_matches("0x")))?;
        url.query_pairs_mut().append_pair("expand", "keys");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ChainError::AccountNotFound(address.to_string()));
        }
        if !response.status().is_success() {
            return Err(ChainError::Rpc(format!(
                "HTTP {} fetching account {address}",
                response.status()
            )));
        }

        let wire: WireAccount = response
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(e.to_string()))?;
        wire.try_into()
    }

    async fn send_transaction(&self, tx: &SignedTransaction) -> Result<String, ChainError> {
        let response = self
            .http
            .post(self.url("v1/transactions")?)
            .json(tx)
            .send()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChainError::Rpc(format!(
                "HTTP {status} submitting transaction: {body}"
            )));
        }

        let submitted: WireSubmitted = response
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(e.to_string()))?;

        tracing::debug!(tx_id = %submitted.id, script = %tx.envelope.script, "Transaction submitted");
        Ok(submitted.id)
    }

    async fn get_transaction_result(&self, tx_id: &str) -> Result<TransactionResult, ChainError> {
        let response = self
            .http
            .get(self.url(&format!("v1/transaction_results/{tx_id}"))?)
            .send()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ChainError::Rpc(format!(
                "HTTP {} fetching result of {tx_id}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(e.to_string()))
    }
}
