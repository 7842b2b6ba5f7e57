// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy for the request service.
//!
//! Callers need to distinguish three classes: fix-your-input (validation),
//! not-yours (ownership), and try-again-later (dispatch). [`ServiceError::kind`]
//! exposes the class so the HTTP layer can map status codes without string
//! matching.

use thiserror::Error;

use crate::models::Request;
use crate::service::dispatch::DispatchError;
use crate::storage::{DirectoryError, StoreError};

/// Classification of a service error, used for HTTP status mapping and
/// client retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input is malformed; retrying unchanged will fail again.
    Validation,
    /// The caller does not own the referenced resource.
    Ownership,
    /// The referenced resource does not exist.
    NotFound,
    /// The hand-off to the TEE channel failed; the request persisted.
    Dispatch,
    /// Store or collaborator backend failure.
    Internal,
}

/// Error type for all request-service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("account not found: {0}")]
    UnknownAccount(String),

    #[error("{resource} {id} does not belong to account {account_id}")]
    Ownership {
        resource: &'static str,
        id: String,
        account_id: String,
    },

    #[error("wallet {wallet} is not owned by account {account_id}")]
    WalletNotOwned { account_id: String, wallet: String },

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// Dispatch failed after retries. The request was already persisted and
    /// stays `pending`; it is carried here so callers still receive it.
    #[error("dispatch failed for request {}: {source}", request.id)]
    Dispatch {
        request: Box<Request>,
        #[source]
        source: DispatchError,
    },

    #[error("store error: {0}")]
    Store(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Required { .. } | Self::InvalidStatus(_) => ErrorKind::Validation,
            Self::UnknownAccount(_) => ErrorKind::NotFound,
            Self::Ownership { .. } | Self::WalletNotOwned { .. } => ErrorKind::Ownership,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Dispatch { .. } => ErrorKind::Dispatch,
            Self::Store(_) => ErrorKind::Internal,
        }
    }

    /// Enforce that `owner` matches the caller's account.
    pub fn ensure_ownership(
        resource: &'static str,
        id: &str,
        owner: &str,
        account_id: &str,
    ) -> Result<(), ServiceError> {
        if owner == account_id {
            Ok(())
        } else {
            Err(ServiceError::Ownership {
                resource,
                id: id.to_string(),
                account_id: account_id.to_string(),
            })
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { resource, id } => Self::NotFound { resource, id },
            other => Self::Store(other.to_string()),
        }
    }
}

impl From<DirectoryError> for ServiceError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::UnknownAccount(id) => Self::UnknownAccount(id),
            DirectoryError::SignerNotOwned { account_id, wallet } => {
                Self::WalletNotOwned { account_id, wallet }
            }
            DirectoryError::Backend(msg) => Self::Store(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_classify_correctly() {
        assert_eq!(
            ServiceError::Required { field: "seed" }.kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ServiceError::WalletNotOwned {
                account_id: "a".into(),
                wallet: "w".into()
            }
            .kind(),
            ErrorKind::Ownership
        );
        assert_eq!(
            ServiceError::UnknownAccount("a".into()).kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn ensure_ownership_rejects_mismatch() {
        assert!(ServiceError::ensure_ownership("key", "k1", "acc1", "acc1").is_ok());
        let err = ServiceError::ensure_ownership("key", "k1", "acc1", "acc2").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Ownership);
    }
}
