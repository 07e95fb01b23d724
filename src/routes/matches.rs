use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        caller::Caller,
        matches::{
            CompleteMatchRequest, CreateMatchRequest, GameRequest, MatchCreated, MatchDetail,
            MatchHistoryItem, PointRequest,
        },
    },
    error::AppError,
    routes::body::JsonBody,
    services::match_service,
    state::SharedState,
};

/// Routes scoring matches between registered users.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/matches", get(active_matches).post(create_match))
        .route("/matches/history", get(match_history))
        .route("/matches/{id}", get(get_match))
        .route("/matches/{id}/join", post(join_match))
        .route("/matches/{id}/points", post(record_point))
        .route("/matches/{id}/games", post(record_game))
        .route("/matches/{id}/complete", post(complete_match))
}

/// Open a match against another registered user.
#[utoipa::path(
    post,
    path = "/matches",
    tag = "matches",
    params(("X-User-Id" = String, Header, description = "Authenticated user id")),
    request_body = CreateMatchRequest,
    responses(
        (status = 201, description = "Match created", body = MatchCreated),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Missing caller identity")
    )
)]
pub async fn create_match(
    State(state): State<SharedState>,
    caller: Caller,
    JsonBody(payload): JsonBody<CreateMatchRequest>,
) -> Result<(StatusCode, Json<MatchCreated>), AppError> {
    payload.validate()?;
    let created = match_service::create_match(&state, &caller, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Matches of the caller that are not completed yet, most recently created first.
#[utoipa::path(
    get,
    path = "/matches",
    tag = "matches",
    params(("X-User-Id" = String, Header, description = "Authenticated user id")),
    responses(
        (status = 200, description = "Unfinished matches", body = [MatchDetail]),
        (status = 401, description = "Missing caller identity")
    )
)]
pub async fn active_matches(
    State(state): State<SharedState>,
    caller: Caller,
) -> Result<Json<Vec<MatchDetail>>, AppError> {
    Ok(Json(match_service::active_matches(&state, &caller).await?))
}

/// Completed matches of the caller, most recent first.
#[utoipa::path(
    get,
    path = "/matches/history",
    tag = "matches",
    params(("X-User-Id" = String, Header, description = "Authenticated user id")),
    responses((status = 200, description = "Completed matches", body = [MatchHistoryItem]))
)]
pub async fn match_history(
    State(state): State<SharedState>,
    caller: Caller,
) -> Result<Json<Vec<MatchHistoryItem>>, AppError> {
    Ok(Json(match_service::match_history(&state, &caller).await?))
}

#[utoipa::path(
    get,
    path = "/matches/{id}",
    tag = "matches",
    params(
        ("X-User-Id" = String, Header, description = "Authenticated user id"),
        ("id" = String, Path, description = "Identifier of the match")
    ),
    responses(
        (status = 200, description = "Match state", body = MatchDetail),
        (status = 403, description = "Caller does not play this match"),
        (status = 404, description = "Unknown match")
    )
)]
pub async fn get_match(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchDetail>, AppError> {
    Ok(Json(match_service::get_match(&state, &caller, id).await?))
}

/// Move a match into play.
#[utoipa::path(
    post,
    path = "/matches/{id}/join",
    tag = "matches",
    params(
        ("X-User-Id" = String, Header, description = "Authenticated user id"),
        ("id" = String, Path, description = "Identifier of the match")
    ),
    responses((status = 200, description = "Match state", body = MatchDetail))
)]
pub async fn join_match(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchDetail>, AppError> {
    Ok(Json(match_service::join_match(&state, &caller, id).await?))
}

/// Record one point won by `player1` or `player2`.
#[utoipa::path(
    post,
    path = "/matches/{id}/points",
    tag = "matches",
    params(
        ("X-User-Id" = String, Header, description = "Authenticated user id"),
        ("id" = String, Path, description = "Identifier of the match")
    ),
    request_body = PointRequest,
    responses(
        (status = 200, description = "Match state after the point", body = MatchDetail),
        (status = 400, description = "Unknown side"),
        (status = 409, description = "Concurrent updates could not be reconciled")
    )
)]
pub async fn record_point(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<PointRequest>,
) -> Result<Json<MatchDetail>, AppError> {
    Ok(Json(
        match_service::record_point(&state, &caller, id, payload).await?,
    ))
}

/// Record a whole game won by `player1` or `player2`.
#[utoipa::path(
    post,
    path = "/matches/{id}/games",
    tag = "matches",
    params(
        ("X-User-Id" = String, Header, description = "Authenticated user id"),
        ("id" = String, Path, description = "Identifier of the match")
    ),
    request_body = GameRequest,
    responses((status = 200, description = "Match state after the game", body = MatchDetail))
)]
pub async fn record_game(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<GameRequest>,
) -> Result<Json<MatchDetail>, AppError> {
    Ok(Json(
        match_service::record_game(&state, &caller, id, payload).await?,
    ))
}

/// Close the match and pick the winner from the set scores recorded so far.
#[utoipa::path(
    post,
    path = "/matches/{id}/complete",
    tag = "matches",
    params(
        ("X-User-Id" = String, Header, description = "Authenticated user id"),
        ("id" = String, Path, description = "Identifier of the match")
    ),
    request_body = CompleteMatchRequest,
    responses((status = 200, description = "Completed match", body = MatchDetail))
)]
pub async fn complete_match(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    payload: Option<JsonBody<CompleteMatchRequest>>,
) -> Result<Json<MatchDetail>, AppError> {
    let request = payload.map(|JsonBody(request)| request).unwrap_or_default();
    Ok(Json(
        match_service::complete_match(&state, &caller, id, request).await?,
    ))
}
