use std::time::SystemTime;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::storage::StorageError,
    dto::{
        caller::{Caller, user_participant},
        matches::{MatchDetail, PointRequest, StartChallengeMatchRequest},
    },
    error::ServiceError,
    services::match_service::{self, ensure_distinct_opponent, ensure_participant},
    state::{
        SharedState,
        scoring,
        tennis::{MatchFormat, MatchOrigin, PerSide, TennisMatch},
    },
};

fn challenge_not_found(challenge_id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("no match exists for challenge `{challenge_id}`"))
}

async fn find_challenge_match(
    state: &SharedState,
    challenge_id: Uuid,
) -> Result<Option<TennisMatch>, ServiceError> {
    let store = state.require_match_store().await?;
    Ok(store
        .find_match_by_challenge(challenge_id)
        .await?
        .map(Into::into))
}

/// Return the match attached to the challenge, creating it in play when absent.
///
/// The boolean is `true` when the match was created by this call.
pub async fn start_challenge_match(
    state: &SharedState,
    caller: &Caller,
    challenge_id: Uuid,
    request: StartChallengeMatchRequest,
) -> Result<(MatchDetail, bool), ServiceError> {
    let _lock = state.lock(challenge_id).await;

    if let Some(existing) = find_challenge_match(state, challenge_id).await? {
        return joined_existing(&existing, caller);
    }

    ensure_distinct_opponent(caller, request.opponent_id)?;
    let mut record = TennisMatch::new(
        MatchOrigin::Challenge { challenge_id },
        MatchFormat::Singles,
        PerSide::new(
            caller.participant(),
            user_participant(request.opponent_id, request.opponent_name.as_deref()),
        ),
    );
    scoring::start_match(&mut record, SystemTime::now());

    let store = state.require_match_store().await?;
    match store.insert_match(record.clone().into()).await {
        Ok(()) => {}
        Err(StorageError::Conflict { .. }) => {
            // another instance created the challenge match first
            let existing = find_challenge_match(state, challenge_id)
                .await?
                .ok_or_else(|| challenge_not_found(challenge_id))?;
            debug!(%challenge_id, match_id = %existing.id, "challenge match created elsewhere");
            return joined_existing(&existing, caller);
        }
        Err(err) => return Err(err.into()),
    }

    info!(
        match_id = %record.id,
        %challenge_id,
        player1 = %caller.user_id,
        player2 = %request.opponent_id,
        "challenge match started"
    );
    Ok((MatchDetail::from(&record), true))
}

fn joined_existing(
    existing: &TennisMatch,
    caller: &Caller,
) -> Result<(MatchDetail, bool), ServiceError> {
    ensure_participant(existing, caller)?;
    Ok((MatchDetail::from(existing), false))
}

pub async fn get_challenge_match(
    state: &SharedState,
    caller: &Caller,
    challenge_id: Uuid,
) -> Result<MatchDetail, ServiceError> {
    let record = find_challenge_match(state, challenge_id)
        .await?
        .ok_or_else(|| challenge_not_found(challenge_id))?;
    ensure_participant(&record, caller)?;
    Ok(MatchDetail::from(&record))
}

/// Record a point on the match attached to the challenge.
pub async fn record_challenge_point(
    state: &SharedState,
    caller: &Caller,
    challenge_id: Uuid,
    request: PointRequest,
) -> Result<MatchDetail, ServiceError> {
    let record = find_challenge_match(state, challenge_id)
        .await?
        .ok_or_else(|| challenge_not_found(challenge_id))?;
    match_service::record_point(state, caller, record.id, request).await
}
