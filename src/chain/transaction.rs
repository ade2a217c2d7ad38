// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction envelope construction and signing.

use serde::{Deserialize, Serialize};

use crate::keys::{Authorizer, KeyError};

/// Default computation limit for service transactions.
pub const DEFAULT_GAS_LIMIT: u64 = 9999;

/// The key whose sequence number orders the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalKey {
    pub address: String,
    pub key_index: u32,
    pub sequence_number: u64,
}

/// Unsigned transaction body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    /// Name of the gateway transaction template to execute
    pub script: String,
    pub arguments: Vec<serde_json::Value>,
    pub gas_limit: u64,
    pub proposal_key: ProposalKey,
    pub payer: String,
    pub authorizers: Vec<String>,
}

impl TransactionEnvelope {
    /// Build an envelope where `proposer` proposes, pays and authorizes.
    pub fn new(
        script: impl Into<String>,
        arguments: Vec<serde_json::Value>,
        proposer: &Authorizer,
    ) -> Self {
        Self {
            script: script.into(),
            arguments,
            gas_limit: DEFAULT_GAS_LIMIT,
            proposal_key: ProposalKey {
                address: proposer.address.clone(),
                key_index: proposer.key.index,
                sequence_number: proposer.key.sequence_number,
            },
            payer: proposer.address.clone(),
            authorizers: vec![proposer.address.clone()],
        }
    }

    /// Canonical bytes that signers sign.
    pub fn signing_payload(&self) -> Result<Vec<u8>, KeyError> {
        serde_json::to_vec(self)
            .map_err(|e| KeyError::Backend(format!("failed to encode envelope: {e}")))
    }
}

/// Signature of one account key over an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    pub address: String,
    pub key_index: u32,
    /// Hex-encoded signature
    pub signature: String,
}

/// Envelope plus the signatures the gateway needs to submit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub envelope: TransactionEnvelope,
    pub signatures: Vec<TransactionSignature>,
}

/// Sign `envelope` with every authorizer in `signers`.
pub async fn sign_envelope(
    envelope: TransactionEnvelope,
    signers: &[&Authorizer],
) -> Result<SignedTransaction, KeyError> {
    let payload = envelope.signing_payload()?;

    let mut signatures = Vec::with_capacity(signers.len());
    for authorizer in signers {
        let signature = authorizer.signer.sign(&payload).await?;
        signatures.push(TransactionSignature {
            address: authorizer.address.clone(),
            key_index: authorizer.key.index,
            signature: hex::encode(signature),
        });
    }

    Ok(SignedTransaction {
        envelope,
        signatures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{authorizer_for, StaticSigner};
    use std::sync::Arc;

    #[tokio::test]
    async fn envelope_uses_live_sequence_number() {
        let authorizer = authorizer_for("0x01cf0e2f2f715450", 2, 41, Arc::new(StaticSigner::new(vec![7; 64])));

        let envelope = TransactionEnvelope::new("create_account", vec![], &authorizer);

        assert_eq!(envelope.proposal_key.address, "0x01cf0e2f2f715450");
        assert_eq!(envelope.proposal_key.key_index, 2);
        assert_eq!(envelope.proposal_key.sequence_number, 41);
        assert_eq!(envelope.payer, "0x01cf0e2f2f715450");
        assert_eq!(envelope.authorizers, vec!["0x01cf0e2f2f715450".to_string()]);
    }

    #[tokio::test]
    async fn sign_envelope_collects_hex_signatures() {
        let signer = Arc::new(StaticSigner::new(vec![0xab, 0xcd]));
        let authorizer = authorizer_for("0x01cf0e2f2f715450", 0, 0, signer.clone());
        let envelope = TransactionEnvelope::new("transfer_tokens", vec![], &authorizer);
        let expected_payload = envelope.signing_payload().unwrap();

        let signed = sign_envelope(envelope, &[&authorizer]).await.unwrap();

        assert_eq!(signed.signatures.len(), 1);
        assert_eq!(signed.signatures[0].signature, "abcd");
        assert_eq!(signed.signatures[0].key_index, 0);
        assert_eq!(signer.signed_messages(), vec![expected_payload]);
    }
}
