// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::service::RequestService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RequestService>,
    /// Parent token for per-request dispatch cancellation; children are
    /// derived per call so server shutdown aborts in-flight retries.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(service: Arc<RequestService>, shutdown: CancellationToken) -> Self {
        Self { service, shutdown }
    }
}
