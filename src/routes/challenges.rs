use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        caller::Caller,
        matches::{MatchDetail, PointRequest, StartChallengeMatchRequest},
    },
    error::AppError,
    routes::body::JsonBody,
    services::challenge_service,
    state::SharedState,
};

/// Routes scoring the match attached to an accepted challenge.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/challenges/{challenge_id}/match",
            post(start_challenge_match).get(get_challenge_match),
        )
        .route(
            "/challenges/{challenge_id}/match/points",
            post(record_challenge_point),
        )
}

/// Start the challenge match, or return it when it already exists.
#[utoipa::path(
    post,
    path = "/challenges/{challenge_id}/match",
    tag = "challenges",
    params(
        ("X-User-Id" = String, Header, description = "Authenticated user id"),
        ("challenge_id" = String, Path, description = "Identifier of the accepted challenge")
    ),
    request_body = StartChallengeMatchRequest,
    responses(
        (status = 201, description = "Match created and started", body = MatchDetail),
        (status = 200, description = "Match already existed", body = MatchDetail),
        (status = 403, description = "Caller does not play this match")
    )
)]
pub async fn start_challenge_match(
    State(state): State<SharedState>,
    caller: Caller,
    Path(challenge_id): Path<Uuid>,
    JsonBody(payload): JsonBody<StartChallengeMatchRequest>,
) -> Result<(StatusCode, Json<MatchDetail>), AppError> {
    payload.validate()?;
    let (detail, created) =
        challenge_service::start_challenge_match(&state, &caller, challenge_id, payload).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(detail)))
}

#[utoipa::path(
    get,
    path = "/challenges/{challenge_id}/match",
    tag = "challenges",
    params(
        ("X-User-Id" = String, Header, description = "Authenticated user id"),
        ("challenge_id" = String, Path, description = "Identifier of the accepted challenge")
    ),
    responses(
        (status = 200, description = "Match state", body = MatchDetail),
        (status = 404, description = "No match for this challenge")
    )
)]
pub async fn get_challenge_match(
    State(state): State<SharedState>,
    caller: Caller,
    Path(challenge_id): Path<Uuid>,
) -> Result<Json<MatchDetail>, AppError> {
    Ok(Json(
        challenge_service::get_challenge_match(&state, &caller, challenge_id).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/challenges/{challenge_id}/match/points",
    tag = "challenges",
    params(
        ("X-User-Id" = String, Header, description = "Authenticated user id"),
        ("challenge_id" = String, Path, description = "Identifier of the accepted challenge")
    ),
    request_body = PointRequest,
    responses((status = 200, description = "Match state after the point", body = MatchDetail))
)]
pub async fn record_challenge_point(
    State(state): State<SharedState>,
    caller: Caller,
    Path(challenge_id): Path<Uuid>,
    JsonBody(payload): JsonBody<PointRequest>,
) -> Result<Json<MatchDetail>, AppError> {
    Ok(Json(
        challenge_service::record_challenge_point(&state, &caller, challenge_id, payload).await?,
    ))
}
