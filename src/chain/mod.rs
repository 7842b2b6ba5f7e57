// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # On-chain Model
//!
//! Deterministic state machines for the gateway and the two service
//! contract variants, plus the [`Chain`] harness that applies transactions
//! and publishes events to watchers.
//!
//! ## Trust Model
//!
//! Only the registered gateway may create or complete pending requests on a
//! service contract (single-writer invariant). The oracle variant places
//! all result trust in the gateway + TEE attestation chain; the VRF variant
//! additionally stores a proof that anyone can check via `verify_proof`.
//!
//! ## Consistency
//!
//! The off-chain request row and the on-chain stored request are two
//! independently-owned state machines correlated by request id. The event
//! stream published here is the actual trigger for TEE action; the
//! off-chain row is an audit/retry aid, not the dispatch authority.

pub mod events;
pub mod gateway;
pub mod oracle;
pub mod runtime;
pub mod vrf;

pub use events::ChainEvent;
pub use gateway::{ServiceContract, ServiceGateway};
pub use oracle::{OracleContract, OracleRequestPayload};
pub use runtime::{Block, CallContext, ContractHash};
pub use vrf::{VrfContract, VrfFulfillment, VrfRequestPayload};

use std::sync::Mutex;

use alloy::primitives::B256;
use thiserror::Error;
use tokio::sync::broadcast;

/// Error type for contract execution. Any error aborts the transaction
/// with no partial state change.
#[derive(Debug, Error)]
pub enum ContractError {
    /// Caller is not the registered gateway.
    #[error("unauthorized: caller is not the registered gateway")]
    Unauthorized,

    /// Payload bytes did not deserialize into the expected shape.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Oracle request carried an empty URL.
    #[error("url is required")]
    EmptyUrl,

    /// Requested word count outside `[1, 10]`.
    #[error("num_words {0} outside allowed range 1..=10")]
    InvalidNumWords(u8),

    /// A pending request already exists under this id.
    #[error("request {0} already pending")]
    DuplicateRequest(u64),

    /// No pending request under this id (unknown or already fulfilled).
    #[error("no pending request {0}")]
    UnknownRequest(u64),

    /// Chain harness internal failure.
    #[error("chain error: {0}")]
    Internal(String),
}

/// Capacity of the event broadcast channel. A watcher lagging behind this
/// many events starts missing them and must fall back to reading pending
/// requests from contract storage.
const EVENT_CHANNEL_CAPACITY: usize = 256;

struct ChainInner {
    gateway: ServiceGateway,
    oracle: OracleContract,
    vrf: VrfContract,
    block: Block,
}

/// In-process deterministic chain: gateway + service contracts + block
/// counter, with transactions applied under a single lock.
pub struct Chain {
    inner: Mutex<ChainInner>,
    events: broadcast::Sender<ChainEvent>,
}

impl Chain {
    /// Create a chain with the gateway at `gateway_hash` and the VRF
    /// contract registered with `vrf_public_key` (SEC1 bytes).
    pub fn new(gateway_hash: ContractHash, vrf_public_key: Vec<u8>) -> Self {
        let gateway = ServiceGateway::new(gateway_hash);
        let oracle = OracleContract::new(gateway_hash);
        let vrf = VrfContract::new(gateway_hash, vrf_public_key);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(ChainInner {
                gateway,
                oracle,
                vrf,
                block: Block::genesis(),
            }),
            events,
        }
    }

    /// Subscribe to the contract event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.events.subscribe()
    }

    /// Mine an empty block (advances the height/hash used to bind seeds).
    pub fn advance_block(&self) -> Result<Block, ContractError> {
        let mut inner = self.lock()?;
        inner.block = inner.block.next();
        Ok(inner.block)
    }

    /// Current block.
    pub fn current_block(&self) -> Result<Block, ContractError> {
        Ok(self.lock()?.block)
    }

    /// Submit an oracle request transaction from `user_contract`.
    pub fn submit_oracle_request(
        &self,
        user_contract: ContractHash,
        payload: &OracleRequestPayload,
    ) -> Result<u64, ContractError> {
        let bytes = serde_json::to_vec(payload)
            .map_err(|e| ContractError::Internal(e.to_string()))?;
        let mut inner = self.lock()?;
        inner.block = inner.block.next();
        let block = inner.block;
        let ChainInner {
            gateway, oracle, ..
        } = &mut *inner;
        let (request_id, event) =
            gateway.forward_request(oracle, block, user_contract, &bytes)?;
        drop(inner);
        self.publish(event);
        Ok(request_id)
    }

    /// Submit a VRF request transaction from `user_contract`.
    pub fn submit_vrf_request(
        &self,
        user_contract: ContractHash,
        payload: &VrfRequestPayload,
    ) -> Result<u64, ContractError> {
        let bytes = serde_json::to_vec(payload)
            .map_err(|e| ContractError::Internal(e.to_string()))?;
        let mut inner = self.lock()?;
        inner.block = inner.block.next();
        let block = inner.block;
        let ChainInner { gateway, vrf, .. } = &mut *inner;
        let (request_id, event) = gateway.forward_request(vrf, block, user_contract, &bytes)?;
        drop(inner);
        self.publish(event);
        Ok(request_id)
    }

    /// Submit an oracle fulfillment transaction (TEE → gateway → contract).
    pub fn fulfill_oracle(&self, request_id: u64, result: &[u8]) -> Result<(), ContractError> {
        let mut inner = self.lock()?;
        inner.block = inner.block.next();
        let block = inner.block;
        let ChainInner {
            gateway, oracle, ..
        } = &mut *inner;
        let event = gateway.forward_fulfillment(oracle, block, request_id, result)?;
        drop(inner);
        self.publish(event);
        Ok(())
    }

    /// Submit a VRF fulfillment transaction (TEE → gateway → contract).
    pub fn fulfill_vrf(
        &self,
        request_id: u64,
        fulfillment: &VrfFulfillment,
    ) -> Result<(), ContractError> {
        let bytes = serde_json::to_vec(fulfillment)
            .map_err(|e| ContractError::Internal(e.to_string()))?;
        let mut inner = self.lock()?;
        inner.block = inner.block.next();
        let block = inner.block;
        let ChainInner { gateway, vrf, .. } = &mut *inner;
        let event = gateway.forward_fulfillment(vrf, block, request_id, &bytes)?;
        drop(inner);
        self.publish(event);
        Ok(())
    }

    // ========================================================================
    // Read surface (anyone may call)
    // ========================================================================

    /// Oracle result bytes, or `None` while unfulfilled.
    pub fn oracle_result(&self, request_id: u64) -> Result<Option<Vec<u8>>, ContractError> {
        Ok(self
            .lock()?
            .oracle
            .get_result(request_id)
            .map(<[u8]>::to_vec))
    }

    /// VRF random words, or `None` while unfulfilled.
    pub fn randomness(&self, request_id: u64) -> Result<Option<Vec<B256>>, ContractError> {
        Ok(self.lock()?.vrf.get_randomness(request_id).map(<[B256]>::to_vec))
    }

    /// VRF proof, or `None` while unfulfilled.
    pub fn proof(&self, request_id: u64) -> Result<Option<Vec<u8>>, ContractError> {
        Ok(self.lock()?.vrf.get_proof(request_id).map(<[u8]>::to_vec))
    }

    /// Check a proof against the registered VRF public key.
    pub fn verify_proof(
        &self,
        seed: &[u8],
        random_words: &[B256],
        proof: &[u8],
    ) -> Result<bool, ContractError> {
        Ok(self.lock()?.vrf.verify_proof(seed, random_words, proof))
    }

    /// Whether a VRF request is still pending on-chain.
    pub fn vrf_pending(&self, request_id: u64) -> Result<bool, ContractError> {
        Ok(self.lock()?.vrf.is_pending(request_id))
    }

    /// Whether an oracle request is still pending on-chain.
    pub fn oracle_pending(&self, request_id: u64) -> Result<bool, ContractError> {
        Ok(self.lock()?.oracle.is_pending(request_id))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ChainInner>, ContractError> {
        self.inner
            .lock()
            .map_err(|_| ContractError::Internal("chain lock poisoned".to_string()))
    }

    fn publish(&self, event: ChainEvent) {
        // Send only fails when no watcher is subscribed, which is fine: the
        // contracts' stored requests remain the source of truth.
        let _ = self.events.send(event);
    }
}
