// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! External collaborator contracts: account existence and signer ownership.
//!
//! Both authorities live outside this service (platform account service,
//! wallet registry). The request service only consumes these two questions,
//! so they are modeled as narrow traits with an in-memory implementation
//! for the bundled binary and tests.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use thiserror::Error;

/// Error type for directory lookups.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The account does not exist.
    #[error("account not found: {0}")]
    UnknownAccount(String),

    /// A signer is not owned by the account.
    #[error("wallet {wallet} is not owned by account {account_id}")]
    SignerNotOwned { account_id: String, wallet: String },

    /// Authority unreachable or failed internally.
    #[error("directory backend error: {0}")]
    Backend(String),
}

/// Answers "does this account exist?".
pub trait AccountDirectory: Send + Sync {
    fn ensure_account(&self, account_id: &str) -> Result<(), DirectoryError>;
}

/// Answers "does this account own these on-chain signers?".
pub trait SignerRegistry: Send + Sync {
    fn ensure_signers_owned(
        &self,
        account_id: &str,
        signers: &[String],
    ) -> Result<(), DirectoryError>;
}

/// In-memory directory seeded with known accounts and their wallets.
///
/// Wallet addresses are compared lowercased, matching the normalization the
/// service applies before the ownership check.
#[derive(Default)]
pub struct StaticDirectory {
    inner: RwLock<DirectoryInner>,
}

#[derive(Default)]
struct DirectoryInner {
    accounts: HashSet<String>,
    wallets: HashMap<String, HashSet<String>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account.
    pub fn add_account(&self, account_id: impl Into<String>) {
        if let Ok(mut inner) = self.inner.write() {
            inner.accounts.insert(account_id.into());
        }
    }

    /// Register a wallet as owned by an account (also registers the account).
    pub fn add_wallet(&self, account_id: impl Into<String>, wallet: impl Into<String>) {
        if let Ok(mut inner) = self.inner.write() {
            let account_id = account_id.into();
            let wallet: String = wallet.into();
            inner.accounts.insert(account_id.clone());
            inner
                .wallets
                .entry(account_id)
                .or_default()
                .insert(wallet.to_lowercase());
        }
    }
}

impl AccountDirectory for StaticDirectory {
    fn ensure_account(&self, account_id: &str) -> Result<(), DirectoryError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| DirectoryError::Backend("directory lock poisoned".to_string()))?;
        if inner.accounts.contains(account_id) {
            Ok(())
        } else {
            Err(DirectoryError::UnknownAccount(account_id.to_string()))
        }
    }
}

impl SignerRegistry for StaticDirectory {
    fn ensure_signers_owned(
        &self,
        account_id: &str,
        signers: &[String],
    ) -> Result<(), DirectoryError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| DirectoryError::Backend("directory lock poisoned".to_string()))?;
        let owned = inner.wallets.get(account_id);
        for signer in signers {
            let matches = owned
                .map(|set| set.contains(&signer.to_lowercase()))
                .unwrap_or(false);
            if !matches {
                return Err(DirectoryError::SignerNotOwned {
                    account_id: account_id.to_string(),
                    wallet: signer.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_account_distinguishes_known_and_unknown() {
        let dir = StaticDirectory::new();
        dir.add_account("acc1");

        assert!(dir.ensure_account("acc1").is_ok());
        assert!(matches!(
            dir.ensure_account("acc2"),
            Err(DirectoryError::UnknownAccount(_))
        ));
    }

    #[test]
    fn signer_ownership_is_case_insensitive() {
        let dir = StaticDirectory::new();
        dir.add_wallet("acc1", "0xABCDEF");

        assert!(dir
            .ensure_signers_owned("acc1", &["0xabcdef".to_string()])
            .is_ok());
        assert!(dir
            .ensure_signers_owned("acc1", &["0xother".to_string()])
            .is_err());
        assert!(dir
            .ensure_signers_owned("acc2", &["0xabcdef".to_string()])
            .is_err());
    }
}
