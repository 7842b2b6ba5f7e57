// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key store trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use crate::models::Key;

use super::{StoreError, StoreResult};

/// Persistence contract for key records.
///
/// Implementations must be internally synchronized; the service layer calls
/// them from concurrent tasks.
pub trait KeyStore: Send + Sync {
    /// Persist a new key, assigning its id.
    fn create_key(&self, key: Key) -> StoreResult<Key>;

    /// Replace a stored key. The id must already exist.
    fn update_key(&self, key: Key) -> StoreResult<Key>;

    /// Fetch a key by id, regardless of owner (ownership is enforced by the
    /// service layer, which knows the caller).
    fn get_key(&self, key_id: &str) -> StoreResult<Key>;

    /// List keys belonging to an account, oldest first.
    fn list_keys(&self, account_id: &str) -> StoreResult<Vec<Key>>;
}

/// In-memory key store backed by a `RwLock`ed map.
#[derive(Default)]
pub struct InMemoryKeyStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    keys: HashMap<String, Key>,
    // Insertion order, for stable listings.
    order: Vec<String>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("key store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("key store lock poisoned".to_string()))
    }
}

impl KeyStore for InMemoryKeyStore {
    fn create_key(&self, mut key: Key) -> StoreResult<Key> {
        if key.id.is_empty() {
            key.id = Uuid::new_v4().to_string();
        }
        let mut inner = self.write()?;
        if inner.keys.contains_key(&key.id) {
            return Err(StoreError::AlreadyExists {
                resource: "key",
                id: key.id,
            });
        }
        inner.order.push(key.id.clone());
        inner.keys.insert(key.id.clone(), key.clone());
        Ok(key)
    }

    fn update_key(&self, key: Key) -> StoreResult<Key> {
        let mut inner = self.write()?;
        if !inner.keys.contains_key(&key.id) {
            return Err(StoreError::NotFound {
                resource: "key",
                id: key.id,
            });
        }
        inner.keys.insert(key.id.clone(), key.clone());
        Ok(key)
    }

    fn get_key(&self, key_id: &str) -> StoreResult<Key> {
        self.read()?
            .keys
            .get(key_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                resource: "key",
                id: key_id.to_string(),
            })
    }

    fn list_keys(&self, account_id: &str) -> StoreResult<Vec<Key>> {
        let inner = self.read()?;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.keys.get(id))
            .filter(|k| k.account_id == account_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KeyStatus;

    fn sample_key(account_id: &str) -> Key {
        Key {
            id: String::new(),
            account_id: account_id.to_string(),
            public_key: "02aa".to_string(),
            wallet_address: "0xwallet".to_string(),
            label: String::new(),
            status: KeyStatus::Inactive,
            attestation: String::new(),
            metadata: Default::default(),
        }
    }

    #[test]
    fn create_assigns_id_and_get_round_trips() {
        let store = InMemoryKeyStore::new();
        let created = store.create_key(sample_key("acc1")).unwrap();
        assert!(!created.id.is_empty());

        let fetched = store.get_key(&created.id).unwrap();
        assert_eq!(fetched, created);
    }

    #[test]
    fn update_missing_key_errors() {
        let store = InMemoryKeyStore::new();
        let mut key = sample_key("acc1");
        key.id = "missing".to_string();
        assert!(matches!(
            store.update_key(key),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn list_is_scoped_and_insertion_ordered() {
        let store = InMemoryKeyStore::new();
        let first = store.create_key(sample_key("acc1")).unwrap();
        let second = store.create_key(sample_key("acc1")).unwrap();
        store.create_key(sample_key("acc2")).unwrap();

        let listed = store.list_keys("acc1").unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, first.id);
        assert_eq!(listed[1].id, second.id);
    }
}
