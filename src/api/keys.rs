// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::ApiError,
    models::{CreateKeyBody, Key, UpdateKeyBody},
    service::parse_status,
    state::AppState,
};

use super::account_id;

#[utoipa::path(
    get,
    path = "/v1/keys",
    tag = "Keys",
    responses((status = 200, body = [Key]))
)]
pub async fn list_keys(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Result<Json<Vec<Key>>, ApiError> {
    let account = account_id(&headers)?;
    Ok(Json(state.service.list_keys(&account)?))
}

#[utoipa::path(
    post,
    path = "/v1/keys",
    request_body = CreateKeyBody,
    tag = "Keys",
    responses((status = 201, body = Key))
)]
pub async fn create_key(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Json(body): Json<CreateKeyBody>,
) -> Result<(StatusCode, Json<Key>), ApiError> {
    let account = account_id(&headers)?;
    let status = parse_status(body.status.as_deref())?;

    let key = Key {
        id: String::new(),
        account_id: account,
        public_key: body.public_key,
        wallet_address: body.wallet_address,
        label: body.label,
        status,
        attestation: body.attestation,
        metadata: body.metadata,
    };
    let created = state.service.create_key(key)?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/v1/keys/{key_id}",
    params(("key_id" = String, Path, description = "Key identifier")),
    tag = "Keys",
    responses((status = 200, body = Key))
)]
pub async fn get_key(
    Path(key_id): Path<String>,
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Result<Json<Key>, ApiError> {
    let account = account_id(&headers)?;
    Ok(Json(state.service.get_key(&account, &key_id)?))
}

#[utoipa::path(
    patch,
    path = "/v1/keys/{key_id}",
    params(("key_id" = String, Path, description = "Key identifier")),
    request_body = UpdateKeyBody,
    tag = "Keys",
    responses((status = 200, body = Key))
)]
pub async fn update_key(
    Path(key_id): Path<String>,
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Json(body): Json<UpdateKeyBody>,
) -> Result<Json<Key>, ApiError> {
    let account = account_id(&headers)?;

    // Load the stored key first so omitted fields keep their values.
    let mut key = state.service.get_key(&account, &key_id)?;
    if let Some(label) = body.label {
        key.label = label;
    }
    if let Some(status) = body.status {
        key.status = parse_status(Some(&status))?;
    }
    if let Some(metadata) = body.metadata {
        key.metadata = metadata;
    }

    Ok(Json(state.service.update_key(&account, key)?))
}
