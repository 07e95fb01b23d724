use std::time::SystemTime;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::match_store::HistoryFilter,
    dto::{
        caller::{Caller, user_participant},
        matches::{
            CompleteMatchRequest, CreateMatchRequest, GameRequest, MatchCreated, MatchDetail,
            MatchHistoryItem, PointRequest,
        },
    },
    error::ServiceError,
    state::{
        SharedState,
        scoring::{self, FinalizeOutcome, PointOutcome, Ruleset},
        tennis::{MatchOrigin, PerSide, Side, TennisMatch},
    },
};

/// Side played by the caller, or [`ServiceError::Forbidden`] for outsiders.
pub(crate) fn ensure_participant(record: &TennisMatch, caller: &Caller) -> Result<Side, ServiceError> {
    record.side_of(caller.user_id).ok_or_else(|| {
        ServiceError::Forbidden(format!(
            "user `{}` does not play match `{}`",
            caller.user_id, record.id
        ))
    })
}

pub(crate) fn ensure_distinct_opponent(caller: &Caller, opponent_id: Uuid) -> Result<(), ServiceError> {
    if caller.user_id == opponent_id {
        return Err(ServiceError::InvalidInput(
            "a match needs two different players".into(),
        ));
    }
    Ok(())
}

/// Open a `not_started` match between the caller (`player1`) and the opponent (`player2`).
pub async fn create_match(
    state: &SharedState,
    caller: &Caller,
    request: CreateMatchRequest,
) -> Result<MatchCreated, ServiceError> {
    ensure_distinct_opponent(caller, request.opponent_id)?;

    let record = TennisMatch::new(
        MatchOrigin::Direct,
        request.match_type.into(),
        PerSide::new(
            caller.participant(),
            user_participant(request.opponent_id, request.opponent_name.as_deref()),
        ),
    );
    state.insert_match(&record).await?;

    info!(
        match_id = %record.id,
        player1 = %caller.user_id,
        player2 = %request.opponent_id,
        match_type = record.format.as_str(),
        "match created"
    );
    Ok(MatchCreated {
        match_id: record.id,
    })
}

pub async fn get_match(
    state: &SharedState,
    caller: &Caller,
    id: Uuid,
) -> Result<MatchDetail, ServiceError> {
    let record = state.load_match(id).await?;
    ensure_participant(&record, caller)?;
    Ok(MatchDetail::from(&record))
}

/// Completed matches the caller played, most recent first.
pub async fn match_history(
    state: &SharedState,
    caller: &Caller,
) -> Result<Vec<MatchHistoryItem>, ServiceError> {
    let store = state.require_match_store().await?;
    let entities = store
        .list_completed(
            HistoryFilter::User(caller.user_id),
            state.config().history_limit,
        )
        .await?;

    Ok(entities
        .into_iter()
        .map(|entity| MatchHistoryItem::from(&TennisMatch::from(entity)))
        .collect())
}

/// Matches the caller can still join or resume, newest first.
pub async fn active_matches(
    state: &SharedState,
    caller: &Caller,
) -> Result<Vec<MatchDetail>, ServiceError> {
    let store = state.require_match_store().await?;
    let entities = store.list_active(caller.user_id).await?;

    Ok(entities
        .into_iter()
        .map(|entity| MatchDetail::from(&TennisMatch::from(entity)))
        .collect())
}

/// Move the match into play; a no-op once it has started.
pub async fn join_match(
    state: &SharedState,
    caller: &Caller,
    id: Uuid,
) -> Result<MatchDetail, ServiceError> {
    let (record, started) = state
        .update_match(id, |record| {
            ensure_participant(record, caller)?;
            Ok(scoring::start_match(record, SystemTime::now()))
        })
        .await?;

    if started {
        info!(match_id = %id, user_id = %caller.user_id, "match started");
    }
    Ok(MatchDetail::from(&record))
}

/// Record a point for the given side and merge any submitted statistics.
pub async fn record_point(
    state: &SharedState,
    caller: &Caller,
    id: Uuid,
    request: PointRequest,
) -> Result<MatchDetail, ServiceError> {
    let side: Side = request.winner.parse()?;

    let (record, outcome) = state
        .update_match(id, |record| {
            ensure_participant(record, caller)?;
            let rules = Ruleset::for_origin(record.origin);
            Ok(scoring::record_point(
                record,
                side,
                request.extra_stats.as_ref(),
                &rules,
                SystemTime::now(),
            ))
        })
        .await?;

    log_outcome(id, side, outcome);
    Ok(MatchDetail::from(&record))
}

/// Record a whole game for the given side.
pub async fn record_game(
    state: &SharedState,
    caller: &Caller,
    id: Uuid,
    request: GameRequest,
) -> Result<MatchDetail, ServiceError> {
    let side: Side = request.winner.parse()?;

    let (record, outcome) = state
        .update_match(id, |record| {
            ensure_participant(record, caller)?;
            let rules = Ruleset::for_origin(record.origin);
            Ok(scoring::record_game(record, side, &rules, SystemTime::now()))
        })
        .await?;

    log_outcome(id, side, outcome);
    Ok(MatchDetail::from(&record))
}

/// Close the match, deciding the winner from the recorded set scores.
pub async fn complete_match(
    state: &SharedState,
    caller: &Caller,
    id: Uuid,
    request: CompleteMatchRequest,
) -> Result<MatchDetail, ServiceError> {
    let (record, outcome) = state
        .update_match(id, |record| {
            ensure_participant(record, caller)?;
            Ok(scoring::finalize_by_game_count(
                record,
                request.extra_stats.as_ref(),
                SystemTime::now(),
            ))
        })
        .await?;

    log_finalize(id, outcome);
    Ok(MatchDetail::from(&record))
}

pub(crate) fn log_outcome(id: Uuid, side: Side, outcome: PointOutcome) {
    match outcome {
        PointOutcome::MatchAlreadyCompleted => {
            debug!(match_id = %id, %side, "ignoring score update on a completed match")
        }
        PointOutcome::Point | PointOutcome::GameWon(_) => {
            debug!(match_id = %id, %side, ?outcome, "score updated")
        }
        PointOutcome::SetWon(winner) => info!(match_id = %id, %winner, "set won"),
        PointOutcome::MatchWon(winner) => info!(match_id = %id, %winner, "match won"),
    }
}

pub(crate) fn log_finalize(id: Uuid, outcome: FinalizeOutcome) {
    match outcome {
        FinalizeOutcome::AlreadyCompleted => {
            debug!(match_id = %id, "match already completed; nothing to finalize")
        }
        FinalizeOutcome::Completed(Some(winner)) => {
            info!(match_id = %id, %winner, "match completed from game count")
        }
        FinalizeOutcome::Completed(None) => {
            info!(match_id = %id, "match completed level; no winner")
        }
    }
}
