// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Request Service
//!
//! Orchestrates key registration and request creation/dispatch for the
//! oracle and VRF bridge. The service enforces two invariant families:
//!
//! - **Ownership**: every read and mutation is scoped to the calling
//!   account; a key or request owned by another account is never returned.
//! - **Validation**: public key, wallet address, consumer, and seed must be
//!   non-empty after trimming; key status must be a known value; wallet
//!   addresses must be owned by the account per the signer registry.
//!
//! Request creation is at-least-once from the caller's perspective: the
//! request row is persisted before dispatch and is not rolled back when the
//! dispatcher fails, so the row remains queryable in `pending` for
//! out-of-band re-dispatch.

pub mod dispatch;
pub mod error;

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::models::{normalize_metadata, Key, KeyStatus, Metadata, Request, RequestStatus};
use crate::storage::{AccountDirectory, KeyStore, RequestStore, SignerRegistry};

pub use dispatch::{
    DispatchError, DispatchHooks, DispatchOptions, Dispatcher, DispatcherFn, NoopDispatcher,
    NoopTracer, RetryPolicy, Tracer,
};
pub use error::{ErrorKind, ServiceError};

/// Default page size for listings.
pub const DEFAULT_LIST_LIMIT: i64 = 20;

/// Hard ceiling for listings; larger requests are clamped, never rejected.
pub const MAX_LIST_LIMIT: i64 = 100;

/// Clamp a caller-supplied limit into `[1, MAX_LIST_LIMIT]`.
///
/// Zero and negative values fall back to the default.
pub fn clamp_limit(limit: i64) -> usize {
    if limit <= 0 {
        DEFAULT_LIST_LIMIT as usize
    } else {
        limit.min(MAX_LIST_LIMIT) as usize
    }
}

/// Off-chain orchestration service for keys and requests.
///
/// All methods take `&self` and are safe for concurrent use; the stores
/// synchronize internally.
pub struct RequestService {
    keys: Arc<dyn KeyStore>,
    requests: Arc<dyn RequestStore>,
    accounts: Arc<dyn AccountDirectory>,
    signers: Arc<dyn SignerRegistry>,
    dispatcher: Arc<dyn Dispatcher>,
    dispatch: DispatchOptions,
}

impl RequestService {
    pub fn new(
        keys: Arc<dyn KeyStore>,
        requests: Arc<dyn RequestStore>,
        accounts: Arc<dyn AccountDirectory>,
        signers: Arc<dyn SignerRegistry>,
    ) -> Self {
        Self {
            keys,
            requests,
            accounts,
            signers,
            dispatcher: Arc::new(NoopDispatcher),
            dispatch: DispatchOptions::default(),
        }
    }

    /// Override the dispatcher implementation.
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Configure retry behavior for dispatcher calls.
    pub fn with_dispatcher_retry(mut self, policy: RetryPolicy) -> Self {
        self.dispatch.retry = policy;
        self
    }

    /// Configure optional observability hooks.
    pub fn with_dispatcher_hooks(mut self, hooks: DispatchHooks) -> Self {
        self.dispatch.hooks = hooks;
        self
    }

    /// Configure a tracer for dispatcher operations.
    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.dispatch.tracer = tracer;
        self
    }

    // =========================================================================
    // Key Registry
    // =========================================================================

    /// Register a key for an account.
    pub fn create_key(&self, mut key: Key) -> Result<Key, ServiceError> {
        self.accounts.ensure_account(&key.account_id)?;
        normalize_key(&mut key)?;
        self.ensure_wallet_owned(&key.account_id, &key.wallet_address)?;

        let created = self.keys.create_key(key)?;
        info!(
            key_id = %created.id,
            account_id = %created.account_id,
            "key created"
        );
        Ok(created)
    }

    /// Update mutable fields on a key. `account_id` is immutable: the stored
    /// owner always wins, and a caller that is not the owner is rejected.
    pub fn update_key(&self, account_id: &str, mut key: Key) -> Result<Key, ServiceError> {
        self.accounts.ensure_account(account_id)?;
        let stored = self.keys.get_key(&key.id)?;
        ServiceError::ensure_ownership("key", &key.id, &stored.account_id, account_id)?;

        key.account_id = stored.account_id;
        normalize_key(&mut key)?;
        self.ensure_wallet_owned(account_id, &key.wallet_address)?;

        let updated = self.keys.update_key(key)?;
        info!(key_id = %updated.id, account_id = %updated.account_id, "key updated");
        Ok(updated)
    }

    /// Fetch a key, enforcing ownership.
    pub fn get_key(&self, account_id: &str, key_id: &str) -> Result<Key, ServiceError> {
        let key = self.keys.get_key(key_id)?;
        ServiceError::ensure_ownership("key", key_id, &key.account_id, account_id)?;
        Ok(key)
    }

    /// List keys for an account.
    pub fn list_keys(&self, account_id: &str) -> Result<Vec<Key>, ServiceError> {
        self.accounts.ensure_account(account_id)?;
        Ok(self.keys.list_keys(account_id)?)
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Create a request and hand it to the dispatcher.
    ///
    /// The request row is persisted (status `pending`) before dispatch and
    /// is returned in that state: status advancement is driven by the
    /// executor/reconciliation side, not by the hand-off itself. On
    /// dispatch failure the error carries the persisted row back to the
    /// caller and the row stays `pending` for later recovery.
    pub async fn create_request(
        &self,
        cancel: &CancellationToken,
        account_id: &str,
        key_id: &str,
        consumer: &str,
        seed: &str,
        metadata: Metadata,
    ) -> Result<Request, ServiceError> {
        self.accounts.ensure_account(account_id)?;
        let key = self.keys.get_key(key_id)?;
        ServiceError::ensure_ownership("key", key_id, &key.account_id, account_id)?;

        let consumer = consumer.trim();
        let seed = seed.trim();
        if consumer.is_empty() {
            return Err(ServiceError::Required { field: "consumer" });
        }
        if seed.is_empty() {
            return Err(ServiceError::Required { field: "seed" });
        }

        let request = Request {
            id: String::new(),
            account_id: account_id.to_string(),
            key_id: key.id.clone(),
            consumer: consumer.to_string(),
            seed: seed.to_string(),
            status: RequestStatus::Pending,
            metadata: normalize_metadata(metadata),
            created_at: Utc::now(),
        };
        let created = self.requests.create_request(request)?;

        match self
            .dispatch
            .run("vrf.dispatch", cancel, &created, &key, self.dispatcher.as_ref())
            .await
        {
            Ok(()) => {
                info!(request_id = %created.id, key_id = %key.id, "request dispatched");
                Ok(created)
            }
            Err(err) => {
                warn!(
                    request_id = %created.id,
                    key_id = %key.id,
                    error = %err,
                    "dispatcher error; request left pending"
                );
                Err(ServiceError::Dispatch {
                    request: Box::new(created),
                    source: err,
                })
            }
        }
    }

    /// Fetch a request, enforcing ownership.
    pub fn get_request(&self, account_id: &str, request_id: &str) -> Result<Request, ServiceError> {
        let request = self.requests.get_request(request_id)?;
        ServiceError::ensure_ownership("request", request_id, &request.account_id, account_id)?;
        Ok(request)
    }

    /// List requests for an account, newest first, with a clamped limit.
    pub fn list_requests(
        &self,
        account_id: &str,
        limit: i64,
    ) -> Result<Vec<Request>, ServiceError> {
        self.accounts.ensure_account(account_id)?;
        Ok(self.requests.list_requests(account_id, clamp_limit(limit))?)
    }

    fn ensure_wallet_owned(&self, account_id: &str, wallet: &str) -> Result<(), ServiceError> {
        if wallet.trim().is_empty() {
            return Err(ServiceError::Required {
                field: "wallet_address",
            });
        }
        self.signers
            .ensure_signers_owned(account_id, &[wallet.to_string()])?;
        Ok(())
    }
}

/// Trim and validate key fields in place. Wallet addresses are lowercased;
/// an empty status defaults to `inactive`.
fn normalize_key(key: &mut Key) -> Result<(), ServiceError> {
    key.public_key = key.public_key.trim().to_string();
    key.label = key.label.trim().to_string();
    key.wallet_address = key.wallet_address.trim().to_lowercase();
    key.attestation = key.attestation.trim().to_string();
    key.metadata = normalize_metadata(std::mem::take(&mut key.metadata));

    if key.public_key.is_empty() {
        return Err(ServiceError::Required {
            field: "public_key",
        });
    }
    if key.wallet_address.is_empty() {
        return Err(ServiceError::Required {
            field: "wallet_address",
        });
    }
    Ok(())
}

/// Parse an optional caller-supplied status string.
pub fn parse_status(status: Option<&str>) -> Result<KeyStatus, ServiceError> {
    match status {
        None => Ok(KeyStatus::default()),
        Some(s) => s
            .parse::<KeyStatus>()
            .map_err(ServiceError::InvalidStatus),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use crate::storage::{InMemoryKeyStore, InMemoryRequestStore, StaticDirectory, StoreResult};

    const WALLET: &str = "0xabc123abc123abc123abc123abc123abc123abcd";
    const OTHER_WALLET: &str = "0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef";

    struct Fixture {
        service: RequestService,
        directory: Arc<StaticDirectory>,
    }

    fn fixture() -> Fixture {
        let directory = Arc::new(StaticDirectory::new());
        directory.add_wallet("acc1", WALLET);
        directory.add_account("acc2");

        let service = RequestService::new(
            Arc::new(InMemoryKeyStore::new()),
            Arc::new(InMemoryRequestStore::new()),
            directory.clone(),
            directory.clone(),
        );
        Fixture { service, directory }
    }

    fn sample_key(account_id: &str, wallet: &str) -> Key {
        Key {
            id: String::new(),
            account_id: account_id.to_string(),
            public_key: "03aa".to_string(),
            wallet_address: wallet.to_string(),
            label: String::new(),
            status: KeyStatus::Inactive,
            attestation: String::new(),
            metadata: Default::default(),
        }
    }

    #[test]
    fn create_key_defaults_to_inactive_and_lowercases_wallet() {
        let f = fixture();
        let mut key = sample_key("acc1", &WALLET.to_uppercase());
        key.label = "  primary  ".to_string();

        let created = f.service.create_key(key).unwrap();
        assert!(!created.id.is_empty());
        assert_eq!(created.status, KeyStatus::Inactive);
        assert_eq!(created.wallet_address, WALLET);
        assert_eq!(created.label, "primary");
    }

    #[test]
    fn create_key_requires_fields_and_known_account() {
        let f = fixture();

        let mut missing_pk = sample_key("acc1", WALLET);
        missing_pk.public_key = "  ".to_string();
        assert!(matches!(
            f.service.create_key(missing_pk),
            Err(ServiceError::Required { field: "public_key" })
        ));

        let mut missing_wallet = sample_key("acc1", WALLET);
        missing_wallet.wallet_address = String::new();
        assert!(matches!(
            f.service.create_key(missing_wallet),
            Err(ServiceError::Required { field: "wallet_address" })
        ));

        assert!(matches!(
            f.service.create_key(sample_key("ghost", WALLET)),
            Err(ServiceError::UnknownAccount(_))
        ));
    }

    #[test]
    fn create_key_rejects_unowned_wallet() {
        let f = fixture();
        let err = f
            .service
            .create_key(sample_key("acc1", OTHER_WALLET))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Ownership);
    }

    #[test]
    fn update_key_rejects_cross_tenant_and_keeps_owner() {
        let f = fixture();
        let created = f.service.create_key(sample_key("acc1", WALLET)).unwrap();

        let mut foreign = created.clone();
        foreign.account_id = "acc2".to_string();
        let err = f.service.update_key("acc2", foreign).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Ownership);

        let mut update = created.clone();
        update.label = "updated".to_string();
        update.status = KeyStatus::Active;
        let updated = f.service.update_key("acc1", update).unwrap();
        assert_eq!(updated.label, "updated");
        assert_eq!(updated.status, KeyStatus::Active);
        assert_eq!(updated.account_id, "acc1");
    }

    #[test]
    fn get_key_enforces_ownership() {
        let f = fixture();
        let created = f.service.create_key(sample_key("acc1", WALLET)).unwrap();

        assert!(f.service.get_key("acc1", &created.id).is_ok());
        let err = f.service.get_key("acc2", &created.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Ownership);
    }

    #[tokio::test]
    async fn create_request_dispatches_exactly_once() {
        let f = fixture();
        let key = f.service.create_key(sample_key("acc1", WALLET)).unwrap();

        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::new(Mutex::new(None::<(String, String)>));
        let calls_in = calls.clone();
        let seen_in = seen.clone();
        let service = f.service.with_dispatcher(Arc::new(DispatcherFn(
            move |request: Request, key: Key| {
                calls_in.fetch_add(1, Ordering::SeqCst);
                if let Ok(mut guard) = seen_in.lock() {
                    *guard = Some((request.id.clone(), key.id.clone()));
                }
                async { Ok(()) }
            },
        )));

        let cancel = CancellationToken::new();
        let request = service
            .create_request(&cancel, "acc1", &key.id, "consumer-svc", "seed123", Default::default())
            .await
            .unwrap();

        // The row stays pending: fulfillment is observed on-chain, not here.
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let seen = seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.0, request.id);
        assert_eq!(seen.1, key.id);
    }

    #[tokio::test]
    async fn create_request_keeps_pending_row_on_dispatch_failure() {
        let f = fixture();
        let key = f.service.create_key(sample_key("acc1", WALLET)).unwrap();

        let service = f
            .service
            .with_dispatcher(Arc::new(DispatcherFn(|_: Request, _: Key| async {
                Err(DispatchError::Channel("tee unreachable".to_string()))
            })))
            .with_dispatcher_retry(RetryPolicy::none());

        let cancel = CancellationToken::new();
        let err = service
            .create_request(&cancel, "acc1", &key.id, "consumer-svc", "seed123", Default::default())
            .await
            .unwrap_err();

        let ServiceError::Dispatch { request, .. } = &err else {
            panic!("expected dispatch error, got {err}");
        };
        assert_eq!(request.status, RequestStatus::Pending);

        // Row is still queryable for out-of-band recovery.
        let stored = service.get_request("acc1", &request.id).unwrap();
        assert_eq!(stored.status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn create_request_validates_before_store_write() {
        let f = fixture();
        let key = f.service.create_key(sample_key("acc1", WALLET)).unwrap();
        let cancel = CancellationToken::new();

        assert!(matches!(
            f.service
                .create_request(&cancel, "acc1", &key.id, "", "seed", Default::default())
                .await,
            Err(ServiceError::Required { field: "consumer" })
        ));
        assert!(matches!(
            f.service
                .create_request(&cancel, "acc1", &key.id, "consumer", "  ", Default::default())
                .await,
            Err(ServiceError::Required { field: "seed" })
        ));

        // Nothing was persisted for the rejected inputs.
        assert!(f.service.list_requests("acc1", 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_request_rejects_foreign_key() {
        let f = fixture();
        let key = f.service.create_key(sample_key("acc1", WALLET)).unwrap();
        let cancel = CancellationToken::new();

        let err = f
            .service
            .create_request(&cancel, "acc2", &key.id, "consumer", "seed", Default::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Ownership);
    }

    #[tokio::test]
    async fn get_request_enforces_ownership() {
        let f = fixture();
        let key = f.service.create_key(sample_key("acc1", WALLET)).unwrap();
        let cancel = CancellationToken::new();
        let request = f
            .service
            .create_request(&cancel, "acc1", &key.id, "consumer", "seed", Default::default())
            .await
            .unwrap();

        let err = f.service.get_request("acc2", &request.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Ownership);
    }

    #[test]
    fn clamp_limit_bounds() {
        assert_eq!(clamp_limit(-5), DEFAULT_LIST_LIMIT as usize);
        assert_eq!(clamp_limit(0), DEFAULT_LIST_LIMIT as usize);
        assert_eq!(clamp_limit(7), 7);
        assert_eq!(clamp_limit(10_000), MAX_LIST_LIMIT as usize);
    }

    #[test]
    fn list_keys_requires_account() {
        let f = fixture();
        // `directory` kept alive through the fixture for wallet seeding.
        let _ = &f.directory;
        assert!(matches!(
            f.service.list_keys("ghost"),
            Err(ServiceError::UnknownAccount(_))
        ));
    }

    /// Store that records calls; used to prove validation happens before
    /// any write.
    struct CountingRequestStore {
        inner: InMemoryRequestStore,
        writes: AtomicU32,
    }

    impl crate::storage::RequestStore for CountingRequestStore {
        fn create_request(&self, request: Request) -> StoreResult<Request> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.create_request(request)
        }
        fn update_status(
            &self,
            request_id: &str,
            status: RequestStatus,
        ) -> StoreResult<Request> {
            self.inner.update_status(request_id, status)
        }
        fn get_request(&self, request_id: &str) -> StoreResult<Request> {
            self.inner.get_request(request_id)
        }
        fn list_requests(&self, account_id: &str, limit: usize) -> StoreResult<Vec<Request>> {
            self.inner.list_requests(account_id, limit)
        }
    }

    #[tokio::test]
    async fn rejected_input_never_reaches_the_store() {
        let directory = Arc::new(StaticDirectory::new());
        directory.add_wallet("acc1", WALLET);
        let store = Arc::new(CountingRequestStore {
            inner: InMemoryRequestStore::new(),
            writes: AtomicU32::new(0),
        });
        let service = RequestService::new(
            Arc::new(InMemoryKeyStore::new()),
            store.clone(),
            directory.clone(),
            directory,
        );
        let key = service.create_key(sample_key("acc1", WALLET)).unwrap();

        let cancel = CancellationToken::new();
        let _ = service
            .create_request(&cancel, "acc1", &key.id, " ", "seed", Default::default())
            .await;
        let _ = service
            .create_request(&cancel, "acc1", &key.id, "consumer", "", Default::default())
            .await;

        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }
}
