// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use k256::ecdsa::SigningKey;
use k256::elliptic_curve::rand_core::OsRng;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use tee_bridge_server::api::router;
use tee_bridge_server::chain::Chain;
use tee_bridge_server::config::{
    HOST_ENV, LOG_FORMAT_ENV, PORT_ENV, SEED_ACCOUNT_ENV, SEED_WALLET_ENV,
};
use tee_bridge_server::executor::{HttpResolver, OnChainDispatcher, TeeExecutor};
use tee_bridge_server::service::RequestService;
use tee_bridge_server::state::AppState;
use tee_bridge_server::storage::{InMemoryKeyStore, InMemoryRequestStore, StaticDirectory};

#[tokio::main]
async fn main() {
    init_tracing();

    // The executor's signing key doubles as the VRF key the contract is
    // registered with. In a deployed enclave this is injected by the
    // attestation coordinator; here it is generated at boot.
    let signing_key = SigningKey::random(&mut OsRng);
    let gateway_hash = alloy::primitives::Address::repeat_byte(0x47);

    let public_key = signing_key
        .verifying_key()
        .to_encoded_point(true)
        .as_bytes()
        .to_vec();
    let chain = Arc::new(Chain::new(gateway_hash, public_key));

    // External collaborators, seeded from the environment for local use.
    let directory = Arc::new(StaticDirectory::new());
    if let Ok(account) = env::var(SEED_ACCOUNT_ENV) {
        match env::var(SEED_WALLET_ENV) {
            Ok(wallet) => directory.add_wallet(account, wallet),
            Err(_) => directory.add_account(account),
        }
    }

    let service = RequestService::new(
        Arc::new(InMemoryKeyStore::new()),
        Arc::new(InMemoryRequestStore::new()),
        directory.clone(),
        directory,
    )
    .with_dispatcher(Arc::new(OnChainDispatcher::new(chain.clone())));

    let shutdown = CancellationToken::new();

    // TEE-side watcher/fulfiller.
    let executor = TeeExecutor::new(chain.clone(), signing_key, Arc::new(HttpResolver::new()));
    let executor_handle = tokio::spawn(executor.run(shutdown.clone()));

    let state = AppState::new(Arc::new(service), shutdown.clone());
    let app = router(state);

    let host = env::var(HOST_ENV).unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var(PORT_ENV)
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .expect("Failed to parse bind address");

    tracing::info!(%addr, "tee-bridge server listening (docs at /docs)");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            server_shutdown.cancel();
        })
        .await
        .expect("HTTP server failed");

    // Server is down; stop the executor and wait for it to drain.
    shutdown.cancel();
    let _ = executor_handle.await;
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
