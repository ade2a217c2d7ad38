// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory fakes shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use zeroize::Zeroizing;

use crate::accounts::{ACCOUNT_CREATED_EVENT, CREATE_ACCOUNT_SCRIPT};
use crate::chain::{
    AccountKey, ChainAccount, ChainClient, ChainError, HashAlgorithm, SignatureAlgorithm,
    SignedTransaction, TransactionEvent, TransactionResult, TransactionStatus,
};
use crate::config::{AdminKeyConfig, KeyConfig};
use crate::keys::local::{parse_signing_key, public_key_hex};
use crate::keys::{
    Authorizer, CustodyBackend, Key, KeyError, KeyType, PublicKeyDescriptor, TxSigner, WrappedKey,
};

pub const ADMIN_ADDRESS: &str = "0xf8d6e0586b0a20c7";

/// Fixed secp256k1 private key of the admin account.
pub const ADMIN_KEY_HEX: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

pub const ENCRYPTION_KEY: &[u8; 32] = b"0123456789abcdef0123456789abcdef";

/// Key configuration with a local admin key.
pub fn key_config() -> KeyConfig {
    KeyConfig {
        encryption_key: Zeroizing::new(ENCRYPTION_KEY.to_vec()),
        default_key_type: KeyType::Local,
        default_key_index: 0,
        default_key_weight: 1000,
        admin: AdminKeyConfig {
            address: ADMIN_ADDRESS.to_string(),
            key_index: 0,
            key_type: KeyType::Local,
            key_value: Zeroizing::new(ADMIN_KEY_HEX.to_string()),
        },
        remote_custody: None,
    }
}

pub fn account_key(index: u32, public_key: &str, sequence_number: u64) -> AccountKey {
    AccountKey {
        index,
        public_key: public_key.to_string(),
        sign_algo: SignatureAlgorithm::EcdsaSecp256k1,
        hash_algo: HashAlgorithm::Sha2_256,
        weight: 1000,
        sequence_number,
        revoked: false,
    }
}

/// On-chain view of the admin account matching [`ADMIN_KEY_HEX`].
pub fn admin_chain_account() -> ChainAccount {
    let signing_key = parse_signing_key(ADMIN_KEY_HEX).unwrap();
    ChainAccount {
        address: ADMIN_ADDRESS.to_string(),
        balance: 1_000_000_000_000,
        keys: vec![account_key(0, &public_key_hex(&signing_key), 0)],
    }
}

pub fn authorizer_for(
    address: &str,
    index: u32,
    sequence_number: u64,
    signer: Arc<dyn TxSigner>,
) -> Authorizer {
    Authorizer {
        address: address.to_string(),
        key: account_key(index, &"00".repeat(64), sequence_number),
        signer,
    }
}

/// Signer returning a fixed signature and recording what it signed.
pub struct StaticSigner {
    signature: Vec<u8>,
    signed: Mutex<Vec<Vec<u8>>>,
}

impl StaticSigner {
    pub fn new(signature: Vec<u8>) -> Self {
        Self {
            signature,
            signed: Mutex::new(Vec::new()),
        }
    }

    pub fn signed_messages(&self) -> Vec<Vec<u8>> {
        self.signed.lock().unwrap().clone()
    }
}

#[async_trait]
impl TxSigner for StaticSigner {
    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, KeyError> {
        self.signed.lock().unwrap().push(message.to_vec());
        Ok(self.signature.clone())
    }
}

/// Remote custody stand-in: key values are `ref-N` references.
#[derive(Default)]
pub struct FakeCustody {
    generated: Mutex<u32>,
    signer_requests: Mutex<Vec<(String, String)>>,
}

impl FakeCustody {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(address, key reference)` of every signer built so far.
    pub fn signer_requests(&self) -> Vec<(String, String)> {
        self.signer_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CustodyBackend for FakeCustody {
    fn key_type(&self) -> KeyType {
        KeyType::RemoteCustody
    }

    async fn generate(&self, index: u32, weight: u32) -> Result<WrappedKey, KeyError> {
        let n = {
            let mut generated = self.generated.lock().unwrap();
            *generated += 1;
            *generated
        };
        Ok(WrappedKey {
            key: Key {
                index,
                key_type: KeyType::RemoteCustody,
                value: format!("ref-{n}"),
                weight,
            },
            public_key: PublicKeyDescriptor {
                index,
                public_key: format!("{n:0128x}"),
                sign_algo: SignatureAlgorithm::EcdsaP256,
                hash_algo: HashAlgorithm::Sha3_256,
                weight,
            },
        })
    }

    async fn signer(&self, address: &str, key: &Key) -> Result<Arc<dyn TxSigner>, KeyError> {
        self.signer_requests
            .lock()
            .unwrap()
            .push((address.to_string(), key.value.clone()));
        Ok(Arc::new(StaticSigner::new(vec![0x5a; 64])))
    }
}

#[derive(Default)]
struct ChainState {
    accounts: HashMap<String, ChainAccount>,
    results: HashMap<String, VecDeque<Result<TransactionResult, ChainError>>>,
    sent: Vec<SignedTransaction>,
    send_error: Option<String>,
    next_tx: u64,
    next_address: u64,
}

/// In-memory chain.
///
/// Sent transactions seal immediately. A `create_account` transaction
/// creates a new account holding the key passed as its first argument and
/// emits the account-created event. Each sent transaction bumps the
/// proposal key's sequence number.
#[derive(Default)]
pub struct FakeChain {
    state: Mutex<ChainState>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain that already knows the admin account.
    pub fn with_admin() -> Self {
        let chain = Self::new();
        chain.set_account(admin_chain_account());
        chain
    }

    pub fn set_account(&self, account: ChainAccount) {
        self.state
            .lock()
            .unwrap()
            .accounts
            .insert(account.address.to_lowercase(), account);
    }

    pub fn account(&self, address: &str) -> Option<ChainAccount> {
        self.state
            .lock()
            .unwrap()
            .accounts
            .get(&address.to_lowercase())
            .cloned()
    }

    /// Results returned by successive `get_transaction_result` calls.
    ///
    /// The last `Ok` result repeats forever; errors are consumed.
    pub fn script_results(&self, tx_id: &str, results: Vec<Result<TransactionResult, ChainError>>) {
        self.state
            .lock()
            .unwrap()
            .results
            .insert(tx_id.to_string(), results.into());
    }

    /// Make every following `send_transaction` fail.
    pub fn fail_sends(&self, message: &str) {
        self.state.lock().unwrap().send_error = Some(message.to_string());
    }

    pub fn sent_transactions(&self) -> Vec<SignedTransaction> {
        self.state.lock().unwrap().sent.clone()
    }
}

fn sealed(events: Vec<TransactionEvent>) -> TransactionResult {
    TransactionResult {
        status: TransactionStatus::Sealed,
        error_message: None,
        events,
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn get_account(&self, address: &str) -> Result<ChainAccount, ChainError> {
        self.account(address)
            .ok_or_else(|| ChainError::AccountNotFound(address.to_string()))
    }

    async fn send_transaction(&self, tx: &SignedTransaction) -> Result<String, ChainError> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.send_error {
            return Err(ChainError::Rpc(message.clone()));
        }

        state.next_tx += 1;
        let tx_id = format!("tx-{}", state.next_tx);
        state.sent.push(tx.clone());

        let proposal = &tx.envelope.proposal_key;
        if let Some(account) = state.accounts.get_mut(&proposal.address.to_lowercase()) {
            if let Some(key) = account.keys.iter_mut().find(|k| k.index == proposal.key_index) {
                key.sequence_number += 1;
            }
        }

        let mut events = Vec::new();
        if tx.envelope.script == CREATE_ACCOUNT_SCRIPT {
            state.next_address += 1;
            let address = format!("0x{:016x}", 0x01cf_0e2f_0000_0000u64 + state.next_address);

            let keys = tx
                .envelope
                .arguments
                .iter()
                .filter_map(|arg| serde_json::from_value::<PublicKeyDescriptor>(arg.clone()).ok())
                .map(|d| AccountKey {
                    index: d.index,
                    public_key: d.public_key,
                    sign_algo: d.sign_algo,
                    hash_algo: d.hash_algo,
                    weight: d.weight,
                    sequence_number: 0,
                    revoked: false,
                })
                .collect();

            state.accounts.insert(
                address.clone(),
                ChainAccount {
                    address: address.clone(),
                    balance: 0,
                    keys,
                },
            );
            events.push(TransactionEvent {
                event_type: ACCOUNT_CREATED_EVENT.to_string(),
                payload: serde_json::json!({ "address": address }),
            });
        }

        state
            .results
            .entry(tx_id.clone())
            .or_insert_with(|| VecDeque::from([Ok(sealed(events))]));
        Ok(tx_id)
    }

    async fn get_transaction_result(&self, tx_id: &str) -> Result<TransactionResult, ChainError> {
        let mut state = self.state.lock().unwrap();
        let queue = state
            .results
            .get_mut(tx_id)
            .ok_or_else(|| ChainError::Rpc("unknown transaction".to_string()))?;

        if queue.len() == 1 {
            if let Some(Ok(result)) = queue.front() {
                return Ok(result.clone());
            }
        }
        queue
            .pop_front()
            .unwrap_or_else(|| Err(ChainError::Rpc("unknown transaction".to_string())))
    }
}
