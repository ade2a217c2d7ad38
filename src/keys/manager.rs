// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Key Manager
//!
//! Single entry point for key material:
//!
//! - `generate` delegates to the configured default backend
//! - `save` / `load` move key values through the [`Crypter`]
//! - `admin_authorizer` / `user_authorizer` build signers on demand
//!
//! ## Authorizer Construction
//!
//! 1. Pick the key: static admin key, or the least recently used stored key
//! 2. Decrypt it (user keys only)
//! 3. Fetch the live on-chain key (index, sequence number, revocation)
//! 4. Ask the backend matching the key's type for a signer
//!
//! Authorizers are never cached; sequence numbers move with every
//! transaction.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::local::parse_signing_key;
use super::{
    Authorizer, Crypter, CustodyBackend, Key, KeyError, KeyStore, KeyType, LocalBackend,
    RemoteCustodyBackend, StoredKey, WrappedKey,
};
use crate::chain::ChainClient;
use crate::config::{AdminKeyConfig, KeyConfig};

/// Generates, protects and hands out keys for every custody backend.
pub struct KeyManager {
    crypter: Crypter,
    store: Arc<dyn KeyStore>,
    chain: Arc<dyn ChainClient>,
    backends: HashMap<KeyType, Arc<dyn CustodyBackend>>,
    default_key_type: KeyType,
    default_key_index: u32,
    default_key_weight: u32,
    admin: AdminKeyConfig,
}

impl KeyManager {
    /// Build a key manager with the backends enabled by `config`.
    ///
    /// The local backend is always available; the remote custody backend is
    /// registered when its endpoint is configured.
    pub fn new(
        config: &KeyConfig,
        store: Arc<dyn KeyStore>,
        chain: Arc<dyn ChainClient>,
    ) -> Result<Self, KeyError> {
        let mut backends: Vec<Arc<dyn CustodyBackend>> = vec![Arc::new(LocalBackend::new())];
        if let Some(remote) = &config.remote_custody {
            backends.push(Arc::new(RemoteCustodyBackend::new(remote)?));
        }
        Self::with_backends(config, store, chain, backends)
    }

    /// Build a key manager over an explicit set of backends.
    ///
    /// Fails if the default backend or the admin key's backend is missing,
    /// or if a local admin key cannot be parsed.
    pub fn with_backends(
        config: &KeyConfig,
        store: Arc<dyn KeyStore>,
        chain: Arc<dyn ChainClient>,
        backends: Vec<Arc<dyn CustodyBackend>>,
    ) -> Result<Self, KeyError> {
        let crypter = Crypter::new(&config.encryption_key)
            .map_err(|e| KeyError::Configuration(e.to_string()))?;

        let backends: HashMap<KeyType, Arc<dyn CustodyBackend>> = backends
            .into_iter()
            .map(|backend| (backend.key_type(), backend))
            .collect();

        if !backends.contains_key(&config.default_key_type) {
            return Err(KeyError::Configuration(format!(
                "default key type {} has no registered backend",
                config.default_key_type
            )));
        }

        let admin = &config.admin;
        if admin.address.trim().is_empty() {
            return Err(KeyError::Configuration("admin address is empty".to_string()));
        }
        if !backends.contains_key(&admin.key_type) {
            return Err(KeyError::Configuration(format!(
                "admin key type {} has no registered backend",
                admin.key_type
            )));
        }
        if admin.key_type == KeyType::Local {
            parse_signing_key(&admin.key_value).map_err(|_| {
                KeyError::Configuration("admin key value is not a valid local key".to_string())
            })?;
        }

        info!(
            default_key_type = %config.default_key_type,
            backends = backends.len(),
            admin = %admin.address,
            "Key manager ready"
        );

        Ok(Self {
            crypter,
            store,
            chain,
            backends,
            default_key_type: config.default_key_type,
            default_key_index: config.default_key_index,
            default_key_weight: config.default_key_weight,
            admin: admin.clone(),
        })
    }

    /// Add or replace the backend for its key type.
    pub fn register_backend(&mut self, backend: Arc<dyn CustodyBackend>) {
        self.backends.insert(backend.key_type(), backend);
    }

    pub fn admin_address(&self) -> &str {
        &self.admin.address
    }

    fn backend(&self, key_type: KeyType) -> Result<&Arc<dyn CustodyBackend>, KeyError> {
        self.backends
            .get(&key_type)
            .ok_or(KeyError::UnsupportedBackend(key_type))
    }

    /// Generate a key with the default backend.
    pub async fn generate(&self, index: u32, weight: u32) -> Result<WrappedKey, KeyError> {
        let wrapped = self
            .backend(self.default_key_type)?
            .generate(index, weight)
            .await?;
        debug!(key_type = %self.default_key_type, index, weight, "Key generated");
        Ok(wrapped)
    }

    /// Generate a key with the configured default index and weight.
    pub async fn generate_default(&self) -> Result<WrappedKey, KeyError> {
        self.generate(self.default_key_index, self.default_key_weight)
            .await
    }

    /// Encrypt `key` into a record ready to be stored for `address`.
    pub fn save(&self, key: &Key, address: &str) -> Result<StoredKey, KeyError> {
        let value = self.crypter.encrypt(key.value.as_bytes())?;
        let now = Utc::now();
        Ok(StoredKey {
            address: address.to_string(),
            index: key.index,
            key_type: key.key_type,
            value,
            weight: key.weight,
            created_at: now,
            last_used_at: now,
        })
    }

    /// Decrypt a stored record back into a plaintext key.
    pub fn load(&self, stored: &StoredKey) -> Result<Key, KeyError> {
        let plaintext = self.crypter.decrypt(&stored.value)?;
        let value = std::str::from_utf8(&plaintext)
            .map_err(|_| KeyError::Backend("decrypted key value is not UTF-8".to_string()))?;

        Ok(Key {
            index: stored.index,
            key_type: stored.key_type,
            value: value.to_owned(),
            weight: stored.weight,
        })
    }

    /// Authorizer for the service's own account, from static configuration.
    pub async fn admin_authorizer(&self) -> Result<Authorizer, KeyError> {
        let key = Key {
            index: self.admin.key_index,
            key_type: self.admin.key_type,
            value: (*self.admin.key_value).clone(),
            weight: 0,
        };
        self.make_authorizer(&self.admin.address, key).await
    }

    /// Authorizer for a user account, signing with its least recently used key.
    ///
    /// The admin address is always served from configuration.
    pub async fn user_authorizer(&self, address: &str) -> Result<Authorizer, KeyError> {
        if same_address(address, &self.admin.address) {
            return self.admin_authorizer().await;
        }

        let stored = self.store.least_recently_used_key(address)?;
        let key = self.load(&stored)?;
        self.make_authorizer(address, key).await
    }

    async fn make_authorizer(&self, address: &str, mut key: Key) -> Result<Authorizer, KeyError> {
        let account = self.chain.get_account(address).await?;

        let on_chain = account
            .keys
            .iter()
            .find(|k| k.index == key.index)
            .cloned()
            .ok_or_else(|| KeyError::KeyIndexOutOfRange {
                address: address.to_string(),
                index: key.index,
            })?;
        if on_chain.revoked {
            return Err(KeyError::KeyRevoked {
                address: address.to_string(),
                index: key.index,
            });
        }
        key.weight = on_chain.weight;

        let signer = self.backend(key.key_type)?.signer(address, &key).await?;

        debug!(
            address = %address,
            key_index = key.index,
            key_type = %key.key_type,
            sequence_number = on_chain.sequence_number,
            "Authorizer built"
        );

        Ok(Authorizer {
            address: address.to_string(),
            key: on_chain,
            signer,
        })
    }
}

fn same_address(a: &str, b: &str) -> bool {
    a.trim_start_matches("0x")
        .eq_ignore_ascii_case(b.trim_start_matches("0x"))
}
