// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Typed contract events consumed by the TEE watcher.
//!
//! Events are the only channel from chain to executor: each request event
//! carries everything the TEE needs to act without further on-chain reads,
//! and each fulfillment event mirrors what was stored. Event names match
//! the notification names emitted by the deployed contracts.

use std::collections::BTreeMap;

use alloy::primitives::B256;

use super::runtime::ContractHash;

/// Event emitted by a service contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    /// A randomness request is pending fulfillment. `seed` is the enhanced
    /// seed (caller seed bound to block hash and request id).
    VrfRequested {
        request_id: u64,
        user_contract: ContractHash,
        seed: Vec<u8>,
        num_words: u8,
    },
    /// A randomness request was fulfilled.
    VrfFulfilled {
        request_id: u64,
        random_words: Vec<B256>,
        proof: Vec<u8>,
    },
    /// An oracle fetch is pending fulfillment.
    OracleRequested {
        request_id: u64,
        user_contract: ContractHash,
        url: String,
        method: String,
        headers: BTreeMap<String, String>,
        json_path: Option<String>,
    },
    /// An oracle fetch was fulfilled.
    OracleFulfilled { request_id: u64, result: Vec<u8> },
}

impl ChainEvent {
    /// Notification name, as the watcher sees it.
    pub fn name(&self) -> &'static str {
        match self {
            Self::VrfRequested { .. } => "VRFRequest",
            Self::VrfFulfilled { .. } => "VRFFulfilled",
            Self::OracleRequested { .. } => "OracleRequest",
            Self::OracleFulfilled { .. } => "OracleFulfilled",
        }
    }

    /// Request id the event refers to.
    pub fn request_id(&self) -> u64 {
        match self {
            Self::VrfRequested { request_id, .. }
            | Self::VrfFulfilled { request_id, .. }
            | Self::OracleRequested { request_id, .. }
            | Self::OracleFulfilled { request_id, .. } => *request_id,
        }
    }
}
