// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Key Management
//!
//! Everything that touches private key material lives in this module:
//!
//! - [`Crypter`] encrypts key values before they reach storage
//! - [`CustodyBackend`] implementations generate keys and build signers
//!   ([`LocalBackend`] in-process, [`RemoteCustodyBackend`] via an external
//!   custody service)
//! - [`KeyManager`] ties these together and hands out [`Authorizer`]s
//!
//! ## Security Model
//!
//! - Key values are only persisted as ciphertext ([`StoredKey`])
//! - Plaintext values exist only inside a [`Key`], which zeroizes on drop
//! - Error messages never include key values

pub mod backend;
pub mod crypter;
pub mod local;
pub mod manager;
pub mod remote;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::chain::{AccountKey, ChainError, HashAlgorithm, SignatureAlgorithm};
use crate::storage::StorageError;

pub use backend::{CustodyBackend, TxSigner};
pub use crypter::{CryptoError, Crypter};
pub use local::LocalBackend;
pub use manager::KeyManager;
pub use remote::RemoteCustodyBackend;

/// Custody backend that owns a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    /// Key pair generated in-process; the value is the private key.
    Local,
    /// Key held by an external custody service; the value is a reference.
    RemoteCustody,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Local => "local",
            KeyType::RemoteCustody => "remote-custody",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a key type tag is not recognised.
#[derive(Debug, thiserror::Error)]
#[error("unrecognised key type `{0}` (expected `local` or `remote-custody`)")]
pub struct ParseKeyTypeError(String);

impl FromStr for KeyType {
    type Err = ParseKeyTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(KeyType::Local),
            "remote-custody" | "remote_custody" => Ok(KeyType::RemoteCustody),
            other => Err(ParseKeyTypeError(other.to_string())),
        }
    }
}

/// A key in plaintext form.
///
/// Only ever held transiently by the key manager. The value is wiped when
/// the key is dropped and never printed by `Debug`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Key {
    #[zeroize(skip)]
    pub index: u32,
    #[zeroize(skip)]
    pub key_type: KeyType,
    pub value: String,
    #[zeroize(skip)]
    pub weight: u32,
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("index", &self.index)
            .field("key_type", &self.key_type)
            .field("value", &"<redacted>")
            .field("weight", &self.weight)
            .finish()
    }
}

/// Encrypted key record as persisted in the key store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredKey {
    /// Account address this key belongs to
    pub address: String,
    /// Position among the account's on-chain keys
    pub index: u32,
    pub key_type: KeyType,
    /// Ciphertext produced by the [`Crypter`]
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
    pub weight: u32,
    pub created_at: DateTime<Utc>,
    /// Last time this key was picked for signing
    pub last_used_at: DateTime<Utc>,
}

/// Public half of a generated key, ready to be added to an account on-chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct PublicKeyDescriptor {
    pub index: u32,
    /// Hex-encoded public key
    pub public_key: String,
    pub sign_algo: SignatureAlgorithm,
    pub hash_algo: HashAlgorithm,
    pub weight: u32,
}

/// A freshly generated key together with its public descriptor.
#[derive(Debug, Clone)]
pub struct WrappedKey {
    pub key: Key,
    pub public_key: PublicKeyDescriptor,
}

/// Signing capability for one account key.
///
/// Built fresh for every signing need because the on-chain sequence number
/// of the key changes after every transaction.
#[derive(Clone)]
pub struct Authorizer {
    pub address: String,
    /// Live on-chain metadata of the key (including sequence number)
    pub key: AccountKey,
    pub signer: Arc<dyn TxSigner>,
}

impl fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authorizer")
            .field("address", &self.address)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Durable storage of encrypted keys, keyed by account address.
pub trait KeyStore: Send + Sync {
    /// Atomically select the least recently used key for `address` and mark
    /// it as used.
    ///
    /// Two concurrent callers for the same address never receive the same
    /// "oldest" key from a single selection round.
    fn least_recently_used_key(&self, address: &str) -> Result<StoredKey, StorageError>;

    /// Persist an encrypted key for `address`.
    fn save_key(&self, address: &str, key: &StoredKey) -> Result<(), StorageError>;
}

/// Errors produced by key management operations.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no backend registered for key type {0}")]
    UnsupportedBackend(KeyType),

    #[error("no keys found for account {0}")]
    NotFound(String),

    #[error("key index {index} out of range for account {address}")]
    KeyIndexOutOfRange { address: String, index: u32 },

    #[error("key {index} of account {address} is revoked")]
    KeyRevoked { address: String, index: u32 },

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("custody backend error: {0}")]
    Backend(String),

    #[error("chain access failed: {0}")]
    Chain(#[from] ChainError),

    #[error("key store error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for KeyError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(what) => KeyError::NotFound(what),
            other => KeyError::Storage(other),
        }
    }
}

/// Serde helper storing byte vectors as base64 text.
pub(crate) mod base64_bytes {
    use base64ct::{Base64, Encoding};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&Base64::encode_string(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Base64::decode_vec(&encoded).map_err(D::Error::custom)
    }
}
