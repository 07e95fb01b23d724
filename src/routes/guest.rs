use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::matches::{
        CompleteMatchRequest, CreateGuestMatchRequest, MatchCreated, MatchDetail,
        MatchHistoryItem, PointRequest,
    },
    error::AppError,
    routes::body::JsonBody,
    services::guest_service,
    state::SharedState,
};

/// Unauthenticated quick match routes.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/guest-matches", post(create_guest_match))
        .route("/guest-matches/history", get(guest_history))
        .route("/guest-matches/{id}", get(get_guest_match))
        .route("/guest-matches/{id}/join", post(join_guest_match))
        .route("/guest-matches/{id}/points", post(record_guest_point))
        .route("/guest-matches/{id}/end", post(end_guest_match))
}

/// Create a quick match from two (singles) or four (doubles) guest names.
#[utoipa::path(
    post,
    path = "/guest-matches",
    tag = "guest",
    request_body = CreateGuestMatchRequest,
    responses(
        (status = 201, description = "Guest match created", body = MatchCreated),
        (status = 400, description = "Invalid roster or game type")
    )
)]
pub async fn create_guest_match(
    State(state): State<SharedState>,
    JsonBody(payload): JsonBody<CreateGuestMatchRequest>,
) -> Result<(StatusCode, Json<MatchCreated>), AppError> {
    payload.validate()?;
    let created = guest_service::create_guest_match(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/guest-matches/history",
    tag = "guest",
    responses((status = 200, description = "Recently completed guest matches", body = [MatchHistoryItem]))
)]
pub async fn guest_history(
    State(state): State<SharedState>,
) -> Result<Json<Vec<MatchHistoryItem>>, AppError> {
    Ok(Json(guest_service::guest_history(&state).await?))
}

#[utoipa::path(
    get,
    path = "/guest-matches/{id}",
    tag = "guest",
    params(("id" = String, Path, description = "Identifier of the guest match")),
    responses(
        (status = 200, description = "Match state", body = MatchDetail),
        (status = 404, description = "Unknown guest match")
    )
)]
pub async fn get_guest_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchDetail>, AppError> {
    Ok(Json(guest_service::get_guest_match(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/guest-matches/{id}/join",
    tag = "guest",
    params(("id" = String, Path, description = "Identifier of the guest match")),
    responses((status = 200, description = "Match state", body = MatchDetail))
)]
pub async fn join_guest_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchDetail>, AppError> {
    Ok(Json(guest_service::join_guest_match(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/guest-matches/{id}/points",
    tag = "guest",
    params(("id" = String, Path, description = "Identifier of the guest match")),
    request_body = PointRequest,
    responses(
        (status = 200, description = "Match state after the point", body = MatchDetail),
        (status = 400, description = "Unknown side")
    )
)]
pub async fn record_guest_point(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<PointRequest>,
) -> Result<Json<MatchDetail>, AppError> {
    Ok(Json(
        guest_service::record_guest_point(&state, id, payload).await?,
    ))
}

/// End the match early; sets are counted from the games recorded.
#[utoipa::path(
    post,
    path = "/guest-matches/{id}/end",
    tag = "guest",
    params(("id" = String, Path, description = "Identifier of the guest match")),
    request_body = CompleteMatchRequest,
    responses((status = 200, description = "Completed match", body = MatchDetail))
)]
pub async fn end_guest_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    payload: Option<JsonBody<CompleteMatchRequest>>,
) -> Result<Json<MatchDetail>, AppError> {
    let request = payload.map(|JsonBody(request)| request).unwrap_or_default();
    Ok(Json(
        guest_service::end_guest_match(&state, id, request).await?,
    ))
}
