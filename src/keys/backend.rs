// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Capability traits implemented by every custody backend.
//!
//! The key manager only ever talks to backends through these traits, so a
//! new backend is one more implementation plus a registry entry.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Key, KeyError, KeyType, WrappedKey};

/// Produces signatures over transaction payloads.
#[async_trait]
pub trait TxSigner: Send + Sync {
    /// Sign `message`, returning the raw signature bytes.
    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, KeyError>;
}

/// A mechanism that generates keys and turns stored keys into signers.
#[async_trait]
pub trait CustodyBackend: Send + Sync {
    /// Tag stored alongside every key this backend produces.
    fn key_type(&self) -> KeyType;

    /// Generate a new key pair for the given on-chain index and weight.
    async fn generate(&self, index: u32, weight: u32) -> Result<WrappedKey, KeyError>;

    /// Build a signer for a key previously produced by this backend.
    async fn signer(&self, address: &str, key: &Key) -> Result<Arc<dyn TxSigner>, KeyError>;
}
