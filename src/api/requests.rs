// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::ApiError,
    models::{CreateRequestBody, ListQuery, Request},
    service::DEFAULT_LIST_LIMIT,
    state::AppState,
};

use super::account_id;

#[utoipa::path(
    post,
    path = "/v1/requests",
    request_body = CreateRequestBody,
    tag = "Requests",
    responses(
        (status = 201, body = Request),
        (status = 502, description = "Dispatch failed; the request persisted as pending")
    )
)]
pub async fn create_request(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Json(body): Json<CreateRequestBody>,
) -> Result<(StatusCode, Json<Request>), ApiError> {
    let account = account_id(&headers)?;
    let cancel = state.shutdown.child_token();

    let request = state
        .service
        .create_request(
            &cancel,
            &account,
            &body.key_id,
            &body.consumer,
            &body.seed,
            body.metadata,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

#[utoipa::path(
    get,
    path = "/v1/requests",
    params(ListQuery),
    tag = "Requests",
    responses((status = 200, body = [Request]))
)]
pub async fn list_requests(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Request>>, ApiError> {
    let account = account_id(&headers)?;
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    Ok(Json(state.service.list_requests(&account, limit)?))
}

#[utoipa::path(
    get,
    path = "/v1/requests/{request_id}",
    params(("request_id" = String, Path, description = "Request identifier")),
    tag = "Requests",
    responses((status = 200, body = Request))
)]
pub async fn get_request(
    Path(request_id): Path<String>,
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Result<Json<Request>, ApiError> {
    let account = account_id(&headers)?;
    Ok(Json(state.service.get_request(&account, &request_id)?))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{header_for, seeded_key, test_state};
    use super::*;
    use crate::models::RequestStatus;

    #[tokio::test]
    async fn create_and_fetch_request() {
        let state = test_state();
        let key = seeded_key(&state, "acc1");

        let body = CreateRequestBody {
            key_id: key.id.clone(),
            consumer: "consumer-svc".to_string(),
            seed: "seed123".to_string(),
            metadata: Default::default(),
        };
        let (status, Json(request)) =
            create_request(State(state.clone()), header_for("acc1"), Json(body))
                .await
                .expect("request creation succeeds");

        assert_eq!(status, StatusCode::CREATED);
        // Dispatch succeeded (no-op dispatcher); the row is still pending
        // until fulfillment is observed on-chain.
        assert_eq!(request.status, RequestStatus::Pending);

        let Json(fetched) = get_request(
            Path(request.id.clone()),
            State(state.clone()),
            header_for("acc1"),
        )
        .await
        .expect("owner can read the request");
        assert_eq!(fetched.id, request.id);

        // A different account must not see it.
        let err = get_request(Path(request.id), State(state), header_for("acc2"))
            .await
            .err()
            .expect("foreign read rejected");
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn listing_clamps_limits_instead_of_rejecting() {
        let state = test_state();
        let key = seeded_key(&state, "acc1");
        for _ in 0..3 {
            let body = CreateRequestBody {
                key_id: key.id.clone(),
                consumer: "consumer-svc".to_string(),
                seed: "seed123".to_string(),
                metadata: Default::default(),
            };
            create_request(State(state.clone()), header_for("acc1"), Json(body))
                .await
                .expect("request creation succeeds");
        }

        for limit in [Some(-1), Some(0), Some(2), Some(10_000), None] {
            let Json(listed) = list_requests(
                State(state.clone()),
                header_for("acc1"),
                Query(ListQuery { limit }),
            )
            .await
            .expect("listing succeeds");
            match limit {
                Some(2) => assert_eq!(listed.len(), 2),
                _ => assert_eq!(listed.len(), 3),
            }
        }
    }

    #[tokio::test]
    async fn empty_seed_is_a_bad_request() {
        let state = test_state();
        let key = seeded_key(&state, "acc1");

        let body = CreateRequestBody {
            key_id: key.id,
            consumer: "consumer-svc".to_string(),
            seed: "   ".to_string(),
            metadata: Default::default(),
        };
        let err = create_request(State(state), header_for("acc1"), Json(body))
            .await
            .err()
            .expect("empty seed rejected");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
