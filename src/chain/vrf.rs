// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! VRF service contract.
//!
//! Stores pending randomness requests, binds each request's seed to the
//! block it was created in, and keeps fulfilled random words together with
//! their proof so anyone can verify them later against the registered
//! public key.
//!
//! `on_fulfill` does not verify the proof itself; verification is a
//! read-only safety net for downstream consumers. The trust anchor at
//! fulfillment time is the gateway caller check plus the TEE attestation
//! chain.

use std::collections::HashMap;

use alloy::primitives::B256;
use k256::ecdsa::signature::Verifier;
use k256::ecdsa::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};

use super::gateway::ServiceContract;
use super::runtime::{CallContext, ContractHash};
use super::{ChainEvent, ContractError};

/// Bounds on the number of random words per request.
pub const MIN_NUM_WORDS: u8 = 1;
pub const MAX_NUM_WORDS: u8 = 10;

/// Request payload a user contract submits through the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VrfRequestPayload {
    /// Caller-supplied entropy.
    pub seed: Vec<u8>,
    /// Number of 32-byte random words requested (1..=10).
    pub num_words: u8,
}

/// Fulfillment payload submitted by the TEE through the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VrfFulfillment {
    /// Derived random words.
    pub random_words: Vec<[u8; 32]>,
    /// ECDSA signature over `enhanced_seed || random_words`.
    pub proof: Vec<u8>,
}

/// Pending request record; present iff the request awaits fulfillment.
#[derive(Debug, Clone)]
pub struct StoredVrfRequest {
    pub user_contract: ContractHash,
    pub enhanced_seed: Vec<u8>,
    pub num_words: u8,
}

/// Fulfilled result kept permanently for later verification.
#[derive(Debug, Clone)]
pub struct StoredRandomness {
    pub random_words: Vec<B256>,
    pub proof: Vec<u8>,
}

/// VRF service contract storage.
pub struct VrfContract {
    gateway: ContractHash,
    /// SEC1-encoded public key of the TEE's VRF signing key.
    public_key: Vec<u8>,
    pending: HashMap<u64, StoredVrfRequest>,
    results: HashMap<u64, StoredRandomness>,
}

impl VrfContract {
    pub fn new(gateway: ContractHash, public_key: Vec<u8>) -> Self {
        Self {
            gateway,
            public_key,
            pending: HashMap::new(),
            results: HashMap::new(),
        }
    }

    /// Re-point the registered gateway. Only the current gateway may do
    /// this.
    pub fn set_gateway(
        &mut self,
        ctx: &CallContext,
        new_gateway: ContractHash,
    ) -> Result<(), ContractError> {
        if ctx.calling_contract != self.gateway {
            return Err(ContractError::Unauthorized);
        }
        self.gateway = new_gateway;
        Ok(())
    }

    /// Stored random words, or `None` while unfulfilled.
    pub fn get_randomness(&self, request_id: u64) -> Option<&[B256]> {
        self.results
            .get(&request_id)
            .map(|r| r.random_words.as_slice())
    }

    /// Stored proof, or `None` while unfulfilled.
    pub fn get_proof(&self, request_id: u64) -> Option<&[u8]> {
        self.results.get(&request_id).map(|r| r.proof.as_slice())
    }

    /// Whether a request is pending fulfillment.
    pub fn is_pending(&self, request_id: u64) -> bool {
        self.pending.contains_key(&request_id)
    }

    /// Stored pending request, for watchers recovering after a missed
    /// event.
    pub fn pending_request(&self, request_id: u64) -> Option<&StoredVrfRequest> {
        self.pending.get(&request_id)
    }

    /// Verify an ECDSA proof over `seed || random_words` against the
    /// registered public key.
    ///
    /// Returns a boolean rather than erroring: malformed keys, proofs, or
    /// mismatched signatures all read as "unverified", and the caller
    /// decides what that means.
    pub fn verify_proof(&self, seed: &[u8], random_words: &[B256], proof: &[u8]) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(&self.public_key) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(proof) else {
            return false;
        };
        verifying_key
            .verify(&proof_message(seed, random_words), &signature)
            .is_ok()
    }

    fn require_gateway(&self, ctx: &CallContext) -> Result<(), ContractError> {
        if ctx.calling_contract != self.gateway {
            return Err(ContractError::Unauthorized);
        }
        Ok(())
    }
}

/// Message signed by the TEE: seed followed by every word in order.
pub fn proof_message(seed: &[u8], random_words: &[B256]) -> Vec<u8> {
    let mut message = Vec::with_capacity(seed.len() + random_words.len() * 32);
    message.extend_from_slice(seed);
    for word in random_words {
        message.extend_from_slice(word.as_slice());
    }
    message
}

/// Bind a caller seed to the requesting block and request id.
///
/// The block hash prevents replaying a seed across blocks; the request id
/// separates two requests landing in the same block.
fn enhance_seed(seed: &[u8], ctx: &CallContext, request_id: u64) -> Vec<u8> {
    let mut enhanced = Vec::with_capacity(seed.len() + 40);
    enhanced.extend_from_slice(seed);
    enhanced.extend_from_slice(ctx.block.hash.as_slice());
    enhanced.extend_from_slice(&request_id.to_be_bytes());
    enhanced
}

impl ServiceContract for VrfContract {
    fn on_request(
        &mut self,
        ctx: &CallContext,
        request_id: u64,
        user_contract: ContractHash,
        payload: &[u8],
    ) -> Result<ChainEvent, ContractError> {
        self.require_gateway(ctx)?;

        let payload: VrfRequestPayload = serde_json::from_slice(payload)
            .map_err(|e| ContractError::InvalidPayload(e.to_string()))?;

        if payload.num_words < MIN_NUM_WORDS || payload.num_words > MAX_NUM_WORDS {
            return Err(ContractError::InvalidNumWords(payload.num_words));
        }
        if self.pending.contains_key(&request_id) {
            return Err(ContractError::DuplicateRequest(request_id));
        }

        let enhanced_seed = enhance_seed(&payload.seed, ctx, request_id);
        self.pending.insert(
            request_id,
            StoredVrfRequest {
                user_contract,
                enhanced_seed: enhanced_seed.clone(),
                num_words: payload.num_words,
            },
        );

        Ok(ChainEvent::VrfRequested {
            request_id,
            user_contract,
            seed: enhanced_seed,
            num_words: payload.num_words,
        })
    }

    fn on_fulfill(
        &mut self,
        ctx: &CallContext,
        request_id: u64,
        result: &[u8],
    ) -> Result<ChainEvent, ContractError> {
        self.require_gateway(ctx)?;

        let fulfillment: VrfFulfillment = serde_json::from_slice(result)
            .map_err(|e| ContractError::InvalidPayload(e.to_string()))?;

        // Presence of the stored request is the authoritative pending
        // marker; a second fulfillment aborts here.
        let stored = self
            .pending
            .remove(&request_id)
            .ok_or(ContractError::UnknownRequest(request_id))?;

        if fulfillment.random_words.len() != stored.num_words as usize {
            let expected = stored.num_words;
            // Put the request back: a mismatched fulfillment must leave the
            // pending state untouched.
            self.pending.insert(request_id, stored);
            return Err(ContractError::InvalidPayload(format!(
                "expected {expected} random words"
            )));
        }

        let random_words: Vec<B256> = fulfillment
            .random_words
            .iter()
            .map(|w| B256::from(*w))
            .collect();

        self.results.insert(
            request_id,
            StoredRandomness {
                random_words: random_words.clone(),
                proof: fulfillment.proof.clone(),
            },
        );

        Ok(ChainEvent::VrfFulfilled {
            request_id,
            random_words,
            proof: fulfillment.proof,
        })
    }
}
