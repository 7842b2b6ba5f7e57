// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Oracle service contract.
//!
//! Stores pending HTTP-fetch requests, emits the request event the TEE
//! watcher acts on, and stores raw result bytes on fulfillment. There is no
//! contract-side content verification: trust is placed in the gateway and
//! the TEE attestation chain, unlike the VRF variant whose results can be
//! verified against the registered public key.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::gateway::ServiceContract;
use super::runtime::{CallContext, ContractHash};
use super::{ChainEvent, ContractError};

fn default_method() -> String {
    "GET".to_string()
}

/// Request payload a user contract submits through the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleRequestPayload {
    /// URL to fetch. Must be non-empty and parse as an absolute URL.
    pub url: String,
    /// HTTP method; defaults to GET.
    #[serde(default = "default_method")]
    pub method: String,
    /// Headers forwarded verbatim to the fetch.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Optional dotted JSON path extracted from the response body.
    #[serde(default)]
    pub json_path: Option<String>,
}

/// Pending request record; present iff the request awaits fulfillment.
#[derive(Debug, Clone)]
pub struct StoredOracleRequest {
    pub user_contract: ContractHash,
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub json_path: Option<String>,
}

/// Oracle service contract storage.
pub struct OracleContract {
    gateway: ContractHash,
    pending: HashMap<u64, StoredOracleRequest>,
    results: HashMap<u64, Vec<u8>>,
}

impl OracleContract {
    pub fn new(gateway: ContractHash) -> Self {
        Self {
            gateway,
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

    /// Stored result bytes, or `None` while unfulfilled.
    pub fn get_result(&self, request_id: u64) -> Option<&[u8]> {
        self.results.get(&request_id).map(Vec::as_slice)
    }

    /// Whether a request is pending fulfillment.
    pub fn is_pending(&self, request_id: u64) -> bool {
        self.pending.contains_key(&request_id)
    }

    /// Stored pending request, for watchers recovering after a missed
    /// event.
    pub fn pending_request(&self, request_id: u64) -> Option<&StoredOracleRequest> {
        self.pending.get(&request_id)
    }

    fn require_gateway(&self, ctx: &CallContext) -> Result<(), ContractError> {
        if ctx.calling_contract != self.gateway {
            return Err(ContractError::Unauthorized);
        }
        Ok(())
    }
}

impl ServiceContract for OracleContract {
    fn on_request(
        &mut self,
        ctx: &CallContext,
        request_id: u64,
        user_contract: ContractHash,
        payload: &[u8],
    ) -> Result<ChainEvent, ContractError> {
        self.require_gateway(ctx)?;

        let payload: OracleRequestPayload = serde_json::from_slice(payload)
            .map_err(|e| ContractError::InvalidPayload(e.to_string()))?;

        let url = payload.url.trim().to_string();
        if url.is_empty() {
            return Err(ContractError::EmptyUrl);
        }
        url::Url::parse(&url).map_err(|e| ContractError::InvalidPayload(e.to_string()))?;

        let method = {
            let m = payload.method.trim().to_uppercase();
            if m.is_empty() {
                default_method()
            } else {
                m
            }
        };

        if self.pending.contains_key(&request_id) {
            return Err(ContractError::DuplicateRequest(request_id));
        }

        self.pending.insert(
            request_id,
            StoredOracleRequest {
                user_contract,
                url: url.clone(),
                method: method.clone(),
                headers: payload.headers.clone(),
                json_path: payload.json_path.clone(),
            },
        );

        Ok(ChainEvent::OracleRequested {
            request_id,
            user_contract,
            url,
            method,
            headers: payload.headers,
            json_path: payload.json_path,
        })
    }

    fn on_fulfill(
        &mut self,
        ctx: &CallContext,
        request_id: u64,
        result: &[u8],
    ) -> Result<ChainEvent, ContractError> {
        self.require_gateway(ctx)?;

        // Presence of the stored request is the authoritative pending
        // marker; a second fulfillment aborts here.
        self.pending
            .remove(&request_id)
            .ok_or(ContractError::UnknownRequest(request_id))?;

        self.results.insert(request_id, result.to_vec());

        Ok(ChainEvent::OracleFulfilled {
            request_id,
            result: result.to_vec(),
        })
    }
}
