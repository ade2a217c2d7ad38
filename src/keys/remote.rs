// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Remote custody backend.
//!
//! Keys are created and held by an external custody service. The stored key
//! value is the opaque reference returned by that service; signing is a
//! round trip to the service, so raw private keys never enter this process.
//!
//! ## Protocol
//!
//! | Call | Request | Response |
//! |------|---------|----------|
//! | `POST /v1/keys` | `{"weight": u32}` | `{"key_ref": str, "public_key": hex, "sign_algo": str, "hash_algo": str}` |
//! | `POST /v1/keys/{key_ref}/sign` | `{"address": str, "message": base64}` | `{"signature": base64}` |
//!
//! Every request carries `X-Custody-Signature`, the hex HMAC-SHA256 of the
//! request body under the shared secret.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use hmac::{Hmac, Mac};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::{CustodyBackend, Key, KeyError, KeyType, PublicKeyDescriptor, TxSigner, WrappedKey};
use crate::chain::{HashAlgorithm, SignatureAlgorithm};
use crate::config::RemoteCustodyConfig;

/// Header carrying the request body signature.
pub const SIGNATURE_HEADER: &str = "X-Custody-Signature";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct CreateKeyRequest {
    weight: u32,
}

#[derive(Deserialize)]
struct CreateKeyResponse {
    key_ref: String,
    public_key: String,
    sign_algo: SignatureAlgorithm,
    hash_algo: HashAlgorithm,
}

#[derive(Serialize)]
struct SignRequest<'a> {
    address: &'a str,
    message: String,
}

#[derive(Deserialize)]
struct SignResponse {
    signature: String,
}

struct CustodyClient {
    base_url: url::Url,
    secret: Zeroizing<Vec<u8>>,
    http: reqwest::Client,
}

impl CustodyClient {
    fn body_signature(&self, body: &[u8]) -> Result<String, KeyError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.secret)
            .map_err(|e| KeyError::Configuration(format!("invalid custody secret: {e}")))?;
        mac.update(body);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Base URL extended by `segments`, each percent-encoded as one path
    /// segment.
    fn endpoint(&self, segments: &[&str]) -> Result<url::Url, KeyError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| KeyError::Configuration("custody URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post<Req, Resp>(&self, segments: &[&str], request: &Req) -> Result<Resp, KeyError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let path = segments.join("/");
        let url = self.endpoint(segments)?;
        let body = serde_json::to_vec(request)
            .map_err(|e| KeyError::Backend(format!("failed to encode request: {e}")))?;
        let signature = self.body_signature(&body)?;

        let response = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .map_err(|e| KeyError::Backend(format!("custody service unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(KeyError::Backend(format!(
                "custody service returned HTTP {} for {path}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| KeyError::Backend(format!("invalid custody response: {e}")))
    }
}

/// Custody key references are opaque tokens of `[A-Za-z0-9_-]`.
fn check_key_ref(key_ref: &str) -> Result<(), KeyError> {
    let valid = !key_ref.is_empty()
        && key_ref
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(KeyError::Backend("malformed custody key reference".to_string()));
    }
    Ok(())
}

/// Backend delegating key generation and signing to a custody service.
pub struct RemoteCustodyBackend {
    client: Arc<CustodyClient>,
}

impl RemoteCustodyBackend {
    pub fn new(config: &RemoteCustodyConfig) -> Result<Self, KeyError> {
        let base_url = url::Url::parse(&config.base_url)
            .map_err(|e| KeyError::Configuration(format!("invalid custody URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(KeyError::Configuration(format!(
                "custody URL {} cannot be a base",
                config.base_url
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| KeyError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client: Arc::new(CustodyClient {
                base_url,
                secret: Zeroizing::new(config.secret.as_bytes().to_vec()),
                http,
            }),
        })
    }
}

#[async_trait]
impl CustodyBackend for RemoteCustodyBackend {
    fn key_type(&self) -> KeyType {
        KeyType::RemoteCustody
    }

    async fn generate(&self, index: u32, weight: u32) -> Result<WrappedKey, KeyError> {
        let created: CreateKeyResponse = self
            .client
            .post(&["v1", "keys"], &CreateKeyRequest { weight })
            .await?;
        check_key_ref(&created.key_ref)?;

        tracing::debug!(key_ref = %created.key_ref, "Remote custody key created");

        Ok(WrappedKey {
            key: Key {
                index,
                key_type: KeyType::RemoteCustody,
                value: created.key_ref,
                weight,
            },
            public_key: PublicKeyDescriptor {
                index,
                public_key: created.public_key,
                sign_algo: created.sign_algo,
                hash_algo: created.hash_algo,
                weight,
            },
        })
    }

    async fn signer(&self, address: &str, key: &Key) -> Result<Arc<dyn TxSigner>, KeyError> {
        check_key_ref(&key.value)?;
        Ok(Arc::new(RemoteSigner {
            client: Arc::clone(&self.client),
            address: address.to_string(),
            key_ref: key.value.clone(),
        }))
    }
}

/// Signer that asks the custody service to sign.
pub struct RemoteSigner {
    client: Arc<CustodyClient>,
    address: String,
    key_ref: String,
}

#[async_trait]
impl TxSigner for RemoteSigner {
    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, KeyError> {
        let response: SignResponse = self
            .client
            .post(
                &["v1", "keys", self.key_ref.as_str(), "sign"],
                &SignRequest {
                    address: &self.address,
                    message: Base64::encode_string(message),
                },
            )
            .await?;

        Base64::decode_vec(&response.signature)
            .map_err(|e| KeyError::Backend(format!("invalid signature encoding: {e}")))
    }
}
