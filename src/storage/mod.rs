// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Leaf stores for key and request records, plus the external collaborator
//! contracts (account directory, signer ownership) the request service
//! consumes. All of these are traits: production deployments back them with
//! a real database and platform services, tests and the bundled binary use
//! the in-memory implementations.
//!
//! Stores provide their own internal synchronization; the service layer
//! never holds a lock across I/O.

pub mod directory;
pub mod keys;
pub mod requests;

pub use directory::{AccountDirectory, DirectoryError, SignerRegistry, StaticDirectory};
pub use keys::{InMemoryKeyStore, KeyStore};
pub use requests::{InMemoryRequestStore, RequestStore};

use thiserror::Error;

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Record not found
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// Record already exists under this id
    #[error("{resource} already exists: {id}")]
    AlreadyExists { resource: &'static str, id: String },

    /// Backend failure (connection loss, serialization, ...)
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
