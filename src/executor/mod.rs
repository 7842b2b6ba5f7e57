// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # TEE Executor
//!
//! Background worker standing in for the enclave side of the bridge: it
//! watches the chain event stream, performs the requested computation, and
//! submits the signed result back through the gateway. There is no direct
//! call/return between contracts and the executor; the request event is
//! the message, the fulfillment transaction is the reply.
//!
//! ## Strategy
//!
//! 1. **VRF requests**: derive random words from a deterministic (RFC6979)
//!    signature over the enhanced seed, sign `seed || words` as the proof,
//!    submit the fulfillment.
//! 2. **Oracle requests**: run the resolver (HTTP fetch + JSON-path
//!    extraction) and submit the result, truncated to the event size cap.
//!
//! Failures are logged and skipped: the on-chain pending request stays
//! pending, so a later sweep or operator action can retry. The worker
//! itself never dies on a bad request.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown, the
//! same pattern as the off-chain dispatch retries.

pub mod resolver;

use std::sync::Arc;

use alloy::primitives::B256;
use k256::ecdsa::signature::Signer;
use k256::ecdsa::{Signature, SigningKey};
use sha2::{Digest, Sha256};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::chain::vrf::proof_message;
use crate::chain::{Chain, ChainEvent, ContractHash, VrfFulfillment, VrfRequestPayload};
use crate::models::{Key, Request};
use crate::service::dispatch::{DispatchError, DispatchFuture, Dispatcher};

pub use resolver::{HttpResolver, OracleJob, OracleResolver, ResolverError};

/// Cap on oracle result bytes submitted on-chain. Notifications are
/// size-limited on the wire, so oversized results are truncated rather
/// than dropped.
pub const MAX_RESULT_BYTES: usize = 800;

/// TEE-side watcher/fulfiller worker.
pub struct TeeExecutor {
    chain: Arc<Chain>,
    signing_key: SigningKey,
    resolver: Arc<dyn OracleResolver>,
}

impl TeeExecutor {
    pub fn new(chain: Arc<Chain>, signing_key: SigningKey, resolver: Arc<dyn OracleResolver>) -> Self {
        Self {
            chain,
            signing_key,
            resolver,
        }
    }

    /// SEC1-compressed public key matching this executor's signing key.
    ///
    /// This is what the VRF contract must be registered with for
    /// `verify_proof` to accept this executor's fulfillments.
    pub fn public_key(&self) -> Vec<u8> {
        self.signing_key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }

    /// Run the watcher loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(executor.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        let mut events = self.chain.subscribe();
        info!("tee executor starting");

        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => self.handle_event(event).await,
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "tee executor lagged behind event stream");
                    }
                    Err(RecvError::Closed) => {
                        info!("event stream closed; tee executor stopping");
                        return;
                    }
                },
                _ = shutdown.cancelled() => {
                    info!("tee executor shutting down");
                    return;
                }
            }
        }
    }

    /// Process a single chain event. Fulfillment events are ignored; they
    /// exist for downstream consumers.
    pub async fn handle_event(&self, event: ChainEvent) {
        match event {
            ChainEvent::VrfRequested {
                request_id,
                seed,
                num_words,
                ..
            } => {
                if let Err(err) = self.fulfill_vrf(request_id, &seed, num_words) {
                    warn!(request_id, error = %err, "vrf fulfillment failed");
                }
            }
            ChainEvent::OracleRequested {
                request_id,
                url,
                method,
                headers,
                json_path,
                ..
            } => {
                let job = OracleJob {
                    url,
                    method,
                    headers,
                    json_path,
                };
                if let Err(err) = self.fulfill_oracle(request_id, &job).await {
                    warn!(request_id, error = %err, "oracle fulfillment failed");
                }
            }
            ChainEvent::VrfFulfilled { .. } | ChainEvent::OracleFulfilled { .. } => {}
        }
    }

    fn fulfill_vrf(
        &self,
        request_id: u64,
        enhanced_seed: &[u8],
        num_words: u8,
    ) -> Result<(), crate::chain::ContractError> {
        let fulfillment = self.compute_randomness(enhanced_seed, num_words);
        self.chain.fulfill_vrf(request_id, &fulfillment)?;
        info!(request_id, num_words, "vrf request fulfilled");
        Ok(())
    }

    /// Derive random words and the proof for an enhanced seed.
    ///
    /// The base signature is RFC6979-deterministic, so the same seed always
    /// yields the same words while remaining unpredictable without the
    /// signing key.
    pub fn compute_randomness(&self, enhanced_seed: &[u8], num_words: u8) -> VrfFulfillment {
        let base: Signature = self.signing_key.sign(enhanced_seed);
        let base_bytes = base.to_bytes();

        let words: Vec<[u8; 32]> = (0..num_words)
            .map(|i| {
                let mut hasher = Sha256::new();
                hasher.update(base_bytes);
                hasher.update([i]);
                hasher.finalize().into()
            })
            .collect();

        let as_b256: Vec<B256> = words.iter().map(|w| B256::from(*w)).collect();
        let proof: Signature = self
            .signing_key
            .sign(&proof_message(enhanced_seed, &as_b256));

        VrfFulfillment {
            random_words: words,
            proof: proof.to_bytes().to_vec(),
        }
    }

    async fn fulfill_oracle(&self, request_id: u64, job: &OracleJob) -> Result<(), FulfillError> {
        let mut result = self
            .resolver
            .resolve(job)
            .await
            .map_err(FulfillError::Resolve)?;
        result.truncate(MAX_RESULT_BYTES);

        self.chain
            .fulfill_oracle(request_id, &result)
            .map_err(FulfillError::Chain)?;
        info!(request_id, bytes = result.len(), "oracle request fulfilled");
        Ok(())
    }
}

/// Error type for oracle fulfillment attempts.
#[derive(Debug, thiserror::Error)]
enum FulfillError {
    #[error(transparent)]
    Resolve(ResolverError),
    #[error(transparent)]
    Chain(crate::chain::ContractError),
}

// =============================================================================
// On-chain Dispatcher
// =============================================================================

/// Metadata key carrying the requested word count.
pub const NUM_WORDS_METADATA_KEY: &str = "num_words";

/// Dispatcher that hands requests to the TEE channel by submitting them
/// on-chain: the resulting request event is what the executor acts on.
pub struct OnChainDispatcher {
    chain: Arc<Chain>,
}

impl OnChainDispatcher {
    pub fn new(chain: Arc<Chain>) -> Self {
        Self { chain }
    }

    fn submit(&self, request: &Request) -> Result<(), DispatchError> {
        let user_contract: ContractHash = request
            .consumer
            .parse()
            .map_err(|_| DispatchError::Channel(format!(
                "consumer {} is not a contract address",
                request.consumer
            )))?;

        let num_words = request
            .metadata
            .get(NUM_WORDS_METADATA_KEY)
            .and_then(|v| v.parse::<u8>().ok())
            .unwrap_or(1);

        let payload = VrfRequestPayload {
            seed: request.seed.clone().into_bytes(),
            num_words,
        };
        self.chain
            .submit_vrf_request(user_contract, &payload)
            .map_err(|e| DispatchError::Channel(e.to_string()))?;
        Ok(())
    }
}

impl Dispatcher for OnChainDispatcher {
    fn dispatch<'a>(&'a self, request: &'a Request, _key: &'a Key) -> DispatchFuture<'a> {
        Box::pin(async move { self.submit(request) })
    }
}
