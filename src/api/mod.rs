// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::HeaderMap,
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::ApiError,
    models::{CreateKeyBody, CreateRequestBody, Key, Request, UpdateKeyBody},
    state::AppState,
};

pub mod health;
pub mod keys;
pub mod requests;

/// Header carrying the caller's account identity. Authentication itself is
/// handled upstream (platform gateway); this service only scopes data by
/// the asserted account.
pub const ACCOUNT_HEADER: &str = "x-account-id";

/// Extract the account id from request headers.
pub fn account_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(ACCOUNT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            ApiError::new(
                axum::http::StatusCode::UNAUTHORIZED,
                "missing X-Account-ID header",
            )
        })
}

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/keys", get(keys::list_keys).post(keys::create_key))
        .route(
            "/keys/{key_id}",
            get(keys::get_key).patch(keys::update_key),
        )
        .route(
            "/requests",
            get(requests::list_requests).post(requests::create_request),
        )
        .route("/requests/{request_id}", get(requests::get_request))
        .with_state(state);

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        keys::list_keys,
        keys::create_key,
        keys::get_key,
        keys::update_key,
        requests::list_requests,
        requests::create_request,
        requests::get_request
    ),
    components(
        schemas(
            Key,
            Request,
            CreateKeyBody,
            UpdateKeyBody,
            CreateRequestBody,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness probes"),
        (name = "Keys", description = "TEE key registration"),
        (name = "Requests", description = "Request creation and inspection")
    )
)]
struct ApiDoc;
