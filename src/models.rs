// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Domain & API Data Models
//!
//! Core records managed by the off-chain request service, plus the request
//! and response structures used by the REST API. All types derive
//! `Serialize`, `Deserialize`, and `ToSchema` for automatic JSON handling
//! and OpenAPI documentation.
//!
//! ## Model Categories
//!
//! - **Keys**: TEE signing keys registered per account
//! - **Requests**: randomness / oracle request lifecycle records
//!
//! Keys are never physically deleted; revocation is a status transition.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Metadata attached to keys and requests (string key/value pairs).
pub type Metadata = BTreeMap<String, String>;

/// Trim keys and values, dropping entries whose key trims to empty.
pub fn normalize_metadata(metadata: Metadata) -> Metadata {
    metadata
        .into_iter()
        .filter_map(|(k, v)| {
            let k = k.trim().to_string();
            if k.is_empty() {
                None
            } else {
                Some((k, v.trim().to_string()))
            }
        })
        .collect()
}

// =============================================================================
// Key
// =============================================================================

/// Lifecycle status of a registered key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    /// Registered but not yet usable for requests
    Inactive,
    /// Awaiting operator approval
    PendingApproval,
    /// Usable for requests
    Active,
    /// Permanently retired (keys are never deleted)
    Revoked,
}

impl Default for KeyStatus {
    fn default() -> Self {
        Self::Inactive
    }
}

impl KeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::PendingApproval => "pending_approval",
            Self::Active => "active",
            Self::Revoked => "revoked",
        }
    }
}

impl FromStr for KeyStatus {
    type Err = String;

    /// Parse a status string case-insensitively; empty input means the
    /// default (`inactive`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "inactive" => Ok(Self::Inactive),
            "pending_approval" => Ok(Self::PendingApproval),
            "active" => Ok(Self::Active),
            "revoked" => Ok(Self::Revoked),
            other => Err(other.to_string()),
        }
    }
}

/// A TEE signing key registered for an account.
///
/// The `wallet_address` is the on-chain signer the account proved ownership
/// of; it is stored lowercased. The `attestation` field carries the opaque
/// enclave attestation blob provided at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Key {
    /// Unique identifier (UUID, assigned at creation)
    pub id: String,
    /// Owning account; immutable after creation
    pub account_id: String,
    /// Public key material (hex-encoded SEC1 point)
    pub public_key: String,
    /// On-chain signer address owned by the account (lowercased)
    pub wallet_address: String,
    /// Optional human-readable label
    #[serde(default)]
    pub label: String,
    /// Current lifecycle status
    pub status: KeyStatus,
    /// Opaque TEE attestation blob
    #[serde(default)]
    pub attestation: String,
    /// Free-form metadata
    #[serde(default)]
    pub metadata: Metadata,
}

// =============================================================================
// Request
// =============================================================================

/// Lifecycle status of an off-chain request record.
///
/// `pending` is the durable record of intent; it only advances to
/// `dispatched` once the dispatcher hand-off succeeds. Fulfillment happens
/// on-chain and is reflected back out-of-band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Dispatched,
    Fulfilled,
    Failed,
}

/// An off-chain request lifecycle record.
///
/// This row and the on-chain StoredRequest are two independent sources of
/// truth for the same logical request, correlated by id; they are
/// eventually consistent, never transactionally linked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Request {
    /// Unique identifier (UUID, assigned at creation)
    pub id: String,
    /// Owning account
    pub account_id: String,
    /// Key this request is bound to; must be owned by `account_id`
    pub key_id: String,
    /// Consumer contract address or service identifier
    pub consumer: String,
    /// Caller-supplied entropy
    pub seed: String,
    /// Current lifecycle status
    pub status: RequestStatus,
    /// Free-form metadata
    #[serde(default)]
    pub metadata: Metadata,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// API Request Models
// =============================================================================

/// Request body for registering a key.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateKeyBody {
    /// Public key material (hex-encoded)
    pub public_key: String,
    /// On-chain signer address owned by the caller's account
    pub wallet_address: String,
    /// Optional label
    #[serde(default)]
    pub label: String,
    /// Optional attestation blob
    #[serde(default)]
    pub attestation: String,
    /// Optional initial status (defaults to `inactive`)
    #[serde(default)]
    pub status: Option<String>,
    /// Optional metadata
    #[serde(default)]
    pub metadata: Metadata,
}

/// Request body for updating a key. Omitted fields keep their stored value.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateKeyBody {
    /// New label
    #[serde(default)]
    pub label: Option<String>,
    /// New status
    #[serde(default)]
    pub status: Option<String>,
    /// Replacement metadata
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// Request body for creating a request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateRequestBody {
    /// Key to bind the request to (must be owned by the caller's account)
    pub key_id: String,
    /// Consumer contract address or service identifier
    pub consumer: String,
    /// Caller-supplied entropy
    pub seed: String,
    /// Optional metadata
    #[serde(default)]
    pub metadata: Metadata,
}

/// Query parameters for listing requests.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct ListQuery {
    /// Maximum records to return; clamped to the service limits
    #[serde(default)]
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_status_parses_case_insensitively() {
        assert_eq!("ACTIVE".parse::<KeyStatus>().unwrap(), KeyStatus::Active);
        assert_eq!(
            " pending_approval ".parse::<KeyStatus>().unwrap(),
            KeyStatus::PendingApproval
        );
        assert_eq!("".parse::<KeyStatus>().unwrap(), KeyStatus::Inactive);
        assert!("bogus".parse::<KeyStatus>().is_err());
    }

    #[test]
    fn normalize_metadata_trims_and_drops_empty_keys() {
        let mut metadata = Metadata::new();
        metadata.insert(" env ".into(), " prod ".into());
        metadata.insert("   ".into(), "dropped".into());

        let normalized = normalize_metadata(metadata);
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized.get("env").map(String::as_str), Some("prod"));
    }

    #[test]
    fn status_round_trips_through_as_str() {
        for status in [
            KeyStatus::Inactive,
            KeyStatus::PendingApproval,
            KeyStatus::Active,
            KeyStatus::Revoked,
        ] {
            assert_eq!(status.as_str().parse::<KeyStatus>().unwrap(), status);
        }
    }
}
