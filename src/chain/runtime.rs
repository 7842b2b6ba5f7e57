// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Deterministic contract runtime primitives.
//!
//! On-chain execution is single-threaded per transaction: a contract method
//! receives a [`CallContext`] describing who invoked it and at which block,
//! mutates its own storage, and emits events. There is no ambient global
//! state; everything a contract can observe arrives through the context.

use alloy::primitives::{keccak256, Address, B256};

/// Hash identifying a deployed contract (its script hash).
pub type ContractHash = Address;

/// Block the current transaction executes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub height: u64,
    pub hash: B256,
}

impl Block {
    /// Genesis block of the deterministic chain model.
    pub fn genesis() -> Self {
        Self {
            height: 0,
            hash: keccak256(b"genesis"),
        }
    }

    /// Derive the successor block: height + 1, hash chained from the
    /// predecessor.
    pub fn next(&self) -> Self {
        let mut preimage = [0u8; 40];
        preimage[..32].copy_from_slice(self.hash.as_slice());
        preimage[32..].copy_from_slice(&(self.height + 1).to_be_bytes());
        Self {
            height: self.height + 1,
            hash: keccak256(preimage),
        }
    }
}

/// Per-transaction execution context handed to contract methods.
#[derive(Debug, Clone, Copy)]
pub struct CallContext {
    /// Script hash of the contract (or entry script) making this call.
    pub calling_contract: ContractHash,
    /// Block the transaction is included in.
    pub block: Block,
}

impl CallContext {
    pub fn new(calling_contract: ContractHash, block: Block) -> Self {
        Self {
            calling_contract,
            block,
        }
    }
}
