// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Service gateway contract.
//!
//! The gateway is the single authorized entry/exit point between arbitrary
//! user contracts and each service contract: inbound requests are forwarded
//! as `on_request`, TEE fulfillments as `on_fulfill`. Service contracts
//! reject both calls from anyone else, so the gateway's script hash is the
//! only identity that can create or complete pending requests.

use super::runtime::{Block, CallContext, ContractHash};
use super::{ChainEvent, ContractError};

/// Seam between the gateway and a service contract variant.
///
/// Methods return the event to emit; errors abort the whole transaction
/// with no partial state change.
pub trait ServiceContract {
    /// Store a pending request and return the request event.
    fn on_request(
        &mut self,
        ctx: &CallContext,
        request_id: u64,
        user_contract: ContractHash,
        payload: &[u8],
    ) -> Result<ChainEvent, ContractError>;

    /// Store the result, delete the pending request, and return the
    /// fulfillment event.
    fn on_fulfill(
        &mut self,
        ctx: &CallContext,
        request_id: u64,
        result: &[u8],
    ) -> Result<ChainEvent, ContractError>;
}

/// Gateway contract state: its own script hash and the request id counter.
///
/// Request ids are allocated by the gateway, so they are unique across all
/// service contracts behind it.
#[derive(Debug)]
pub struct ServiceGateway {
    hash: ContractHash,
    next_request_id: u64,
}

impl ServiceGateway {
    pub fn new(hash: ContractHash) -> Self {
        Self {
            hash,
            next_request_id: 1,
        }
    }

    /// Script hash service contracts must register as their gateway.
    pub fn hash(&self) -> ContractHash {
        self.hash
    }

    /// Forward a user contract's request to a service contract, allocating
    /// the request id.
    pub fn forward_request(
        &mut self,
        contract: &mut dyn ServiceContract,
        block: Block,
        user_contract: ContractHash,
        payload: &[u8],
    ) -> Result<(u64, ChainEvent), ContractError> {
        let request_id = self.next_request_id;
        let ctx = CallContext::new(self.hash, block);
        let event = contract.on_request(&ctx, request_id, user_contract, payload)?;
        // Only consume the id once the contract accepted the request.
        self.next_request_id += 1;
        Ok((request_id, event))
    }

    /// Forward a TEE fulfillment to a service contract.
    pub fn forward_fulfillment(
        &mut self,
        contract: &mut dyn ServiceContract,
        block: Block,
        request_id: u64,
        result: &[u8],
    ) -> Result<ChainEvent, ContractError> {
        let ctx = CallContext::new(self.hash, block);
        contract.on_fulfill(&ctx, request_id, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;

    /// Minimal contract that accepts everything, for gateway-side tests.
    struct Recorder {
        gateway: ContractHash,
        requests: Vec<u64>,
    }

    impl ServiceContract for Recorder {
        fn on_request(
            &mut self,
            ctx: &CallContext,
            request_id: u64,
            user_contract: ContractHash,
            _payload: &[u8],
        ) -> Result<ChainEvent, ContractError> {
            if ctx.calling_contract != self.gateway {
                return Err(ContractError::Unauthorized);
            }
            self.requests.push(request_id);
            Ok(ChainEvent::OracleFulfilled {
                request_id,
                result: user_contract.to_vec(),
            })
        }

        fn on_fulfill(
            &mut self,
            ctx: &CallContext,
            request_id: u64,
            result: &[u8],
        ) -> Result<ChainEvent, ContractError> {
            if ctx.calling_contract != self.gateway {
                return Err(ContractError::Unauthorized);
            }
            Ok(ChainEvent::OracleFulfilled {
                request_id,
                result: result.to_vec(),
            })
        }
    }

    #[test]
    fn request_ids_are_monotonic() {
        let mut gateway = ServiceGateway::new(Address::repeat_byte(0x11));
        let mut contract = Recorder {
            gateway: gateway.hash(),
            requests: Vec::new(),
        };
        let block = Block::genesis();
        let user = Address::repeat_byte(0x22);

        let (first, _) = gateway
            .forward_request(&mut contract, block, user, b"{}")
            .unwrap();
        let (second, _) = gateway
            .forward_request(&mut contract, block, user, b"{}")
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(contract.requests, vec![1, 2]);
    }

    #[test]
    fn rejected_request_does_not_consume_an_id() {
        let mut gateway = ServiceGateway::new(Address::repeat_byte(0x11));
        // Contract registered against a different gateway rejects the call.
        let mut foreign = Recorder {
            gateway: Address::repeat_byte(0x99),
            requests: Vec::new(),
        };
        let mut own = Recorder {
            gateway: gateway.hash(),
            requests: Vec::new(),
        };
        let block = Block::genesis();
        let user = Address::repeat_byte(0x22);

        assert!(gateway
            .forward_request(&mut foreign, block, user, b"{}")
            .is_err());
        let (id, _) = gateway
            .forward_request(&mut own, block, user, b"{}")
            .unwrap();
        assert_eq!(id, 1);
    }
}
