// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request store trait and in-memory implementation.
//!
//! The request row is the durable record of intent: it is written before
//! dispatch and never rolled back on dispatch failure, so an operator (or a
//! re-dispatch sweep) can always recover a request that never reached the
//! TEE channel.

use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use crate::models::{Request, RequestStatus};

use super::{StoreError, StoreResult};

/// Persistence contract for request lifecycle records.
pub trait RequestStore: Send + Sync {
    /// Persist a new request, assigning its id.
    fn create_request(&self, request: Request) -> StoreResult<Request>;

    /// Advance the status of a stored request.
    fn update_status(&self, request_id: &str, status: RequestStatus) -> StoreResult<Request>;

    /// Fetch a request by id, regardless of owner.
    fn get_request(&self, request_id: &str) -> StoreResult<Request>;

    /// List requests for an account, newest first, at most `limit` records.
    fn list_requests(&self, account_id: &str, limit: usize) -> StoreResult<Vec<Request>>;
}

/// In-memory request store backed by a `RwLock`ed map.
#[derive(Default)]
pub struct InMemoryRequestStore {
    requests: RwLock<HashMap<String, Request>>,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, HashMap<String, Request>>> {
        self.requests
            .read()
            .map_err(|_| StoreError::Backend("request store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, HashMap<String, Request>>> {
        self.requests
            .write()
            .map_err(|_| StoreError::Backend("request store lock poisoned".to_string()))
    }
}

impl RequestStore for InMemoryRequestStore {
    fn create_request(&self, mut request: Request) -> StoreResult<Request> {
        if request.id.is_empty() {
            request.id = Uuid::new_v4().to_string();
        }
        let mut requests = self.write()?;
        if requests.contains_key(&request.id) {
            return Err(StoreError::AlreadyExists {
                resource: "request",
                id: request.id,
            });
        }
        requests.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    fn update_status(&self, request_id: &str, status: RequestStatus) -> StoreResult<Request> {
        let mut requests = self.write()?;
        let request = requests
            .get_mut(request_id)
            .ok_or_else(|| StoreError::NotFound {
                resource: "request",
                id: request_id.to_string(),
            })?;
        request.status = status;
        Ok(request.clone())
    }

    fn get_request(&self, request_id: &str) -> StoreResult<Request> {
        self.read()?
            .get(request_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                resource: "request",
                id: request_id.to_string(),
            })
    }

    fn list_requests(&self, account_id: &str, limit: usize) -> StoreResult<Vec<Request>> {
        let requests = self.read()?;
        let mut scoped: Vec<Request> = requests
            .values()
            .filter(|r| r.account_id == account_id)
            .cloned()
            .collect();
        // Newest first; tie-break on id so repeated listings are identical.
        scoped.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        scoped.truncate(limit);
        Ok(scoped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample_request(account_id: &str, created_secs: i64) -> Request {
        Request {
            id: String::new(),
            account_id: account_id.to_string(),
            key_id: "key1".to_string(),
            consumer: "consumer-svc".to_string(),
            seed: "seed123".to_string(),
            status: RequestStatus::Pending,
            metadata: Default::default(),
            created_at: Utc.timestamp_opt(created_secs, 0).unwrap(),
        }
    }

    #[test]
    fn create_and_advance_status() {
        let store = InMemoryRequestStore::new();
        let created = store.create_request(sample_request("acc1", 100)).unwrap();
        assert_eq!(created.status, RequestStatus::Pending);

        let updated = store
            .update_status(&created.id, RequestStatus::Dispatched)
            .unwrap();
        assert_eq!(updated.status, RequestStatus::Dispatched);
        assert_eq!(
            store.get_request(&created.id).unwrap().status,
            RequestStatus::Dispatched
        );
    }

    #[test]
    fn list_is_newest_first_and_limited() {
        let store = InMemoryRequestStore::new();
        store.create_request(sample_request("acc1", 100)).unwrap();
        let newest = store.create_request(sample_request("acc1", 300)).unwrap();
        store.create_request(sample_request("acc1", 200)).unwrap();
        store.create_request(sample_request("acc2", 400)).unwrap();

        let listed = store.list_requests("acc1", 2).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newest.id);
        assert!(listed[0].created_at >= listed[1].created_at);
    }

    #[test]
    fn repeated_listings_are_identical() {
        let store = InMemoryRequestStore::new();
        // Same timestamp forces the id tie-break.
        for _ in 0..5 {
            store.create_request(sample_request("acc1", 100)).unwrap();
        }

        let first = store.list_requests("acc1", 10).unwrap();
        let second = store.list_requests("acc1", 10).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn update_status_missing_request_errors() {
        let store = InMemoryRequestStore::new();
        assert!(matches!(
            store.update_status("missing", RequestStatus::Failed),
            Err(StoreError::NotFound { .. })
        ));
    }
}
