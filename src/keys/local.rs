// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process custody backend.
//!
//! Keys are secp256k1 key pairs generated with the OS RNG. The key value is
//! the private key in PKCS#8 PEM form; it only leaves this process as
//! ciphertext produced by the key manager's crypter.

use std::sync::Arc;

use async_trait::async_trait;
use k256::ecdsa::{signature::Signer, Signature, SigningKey};
use k256::elliptic_curve::rand_core::OsRng;
use k256::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use k256::SecretKey;

use super::{CustodyBackend, Key, KeyError, KeyType, PublicKeyDescriptor, TxSigner, WrappedKey};
use crate::chain::{HashAlgorithm, SignatureAlgorithm};

/// Signature algorithm of every local key.
pub const SIGN_ALGO: SignatureAlgorithm = SignatureAlgorithm::EcdsaSecp256k1;

/// Hash algorithm applied to messages before signing.
pub const HASH_ALGO: HashAlgorithm = HashAlgorithm::Sha2_256;

/// Backend that holds raw private keys in process memory.
#[derive(Debug, Default, Clone)]
pub struct LocalBackend;

impl LocalBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CustodyBackend for LocalBackend {
    fn key_type(&self) -> KeyType {
        KeyType::Local
    }

    async fn generate(&self, index: u32, weight: u32) -> Result<WrappedKey, KeyError> {
        let signing_key = SigningKey::random(&mut OsRng);

        let private_key_pem = signing_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| KeyError::Backend(format!("failed to encode private key: {e}")))?;

        Ok(WrappedKey {
            key: Key {
                index,
                key_type: KeyType::Local,
                value: private_key_pem.as_str().to_owned(),
                weight,
            },
            public_key: PublicKeyDescriptor {
                index,
                public_key: public_key_hex(&signing_key),
                sign_algo: SIGN_ALGO,
                hash_algo: HASH_ALGO,
                weight,
            },
        })
    }

    async fn signer(&self, _address: &str, key: &Key) -> Result<Arc<dyn TxSigner>, KeyError> {
        let signing_key = parse_signing_key(&key.value)?;
        Ok(Arc::new(LocalSigner { signing_key }))
    }
}

/// Signer over an in-memory secp256k1 key.
pub struct LocalSigner {
    signing_key: SigningKey,
}

#[async_trait]
impl TxSigner for LocalSigner {
    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, KeyError> {
        let signature: Signature = self.signing_key.sign(message);
        Ok(signature.to_bytes().to_vec())
    }
}

/// Hex-encoded uncompressed public key without the `0x04` SEC1 tag.
pub fn public_key_hex(signing_key: &SigningKey) -> String {
    let point = signing_key.verifying_key().to_encoded_point(false);
    hex::encode(&point.as_bytes()[1..])
}

/// Parse a private key from PKCS#8 PEM, SEC1 PEM, or raw hex.
///
/// Raw hex is accepted for admin keys supplied through configuration.
pub fn parse_signing_key(value: &str) -> Result<SigningKey, KeyError> {
    let value = value.trim();

    if value.starts_with("-----BEGIN") {
        let pem = pem::parse(value)
            .map_err(|e| KeyError::Backend(format!("invalid PEM: {e}")))?;
        let secret_key = SecretKey::from_pkcs8_der(pem.contents())
            .or_else(|_| SecretKey::from_sec1_der(pem.contents()))
            .map_err(|_| KeyError::Backend("unsupported private key encoding".to_string()))?;
        return Ok(SigningKey::from(secret_key));
    }

    let bytes = hex::decode(value.trim_start_matches("0x"))
        .map_err(|_| KeyError::Backend("private key is neither PEM nor hex".to_string()))?;
    SigningKey::from_slice(&bytes)
        .map_err(|_| KeyError::Backend("invalid secp256k1 private key".to_string()))
}
