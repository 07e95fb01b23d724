use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::match_store::HistoryFilter,
    dto::matches::{
        CompleteMatchRequest, CreateGuestMatchRequest, MatchCreated, MatchDetail,
        MatchHistoryItem, PointRequest,
    },
    error::ServiceError,
    services::match_service::{log_finalize, log_outcome},
    state::{
        SharedState, match_not_found,
        scoring::{self, Ruleset},
        tennis::{MatchOrigin, Side, TennisMatch},
    },
};

/// Guest routes only ever see guest matches; anything else reads as missing.
fn ensure_guest(record: &TennisMatch) -> Result<(), ServiceError> {
    if record.origin == MatchOrigin::Guest {
        Ok(())
    } else {
        Err(match_not_found(record.id))
    }
}

/// Create a guest quick match from a validated roster.
pub async fn create_guest_match(
    state: &SharedState,
    request: CreateGuestMatchRequest,
) -> Result<MatchCreated, ServiceError> {
    let names = request
        .players
        .iter()
        .map(|name| name.trim().to_owned())
        .collect();
    let record = TennisMatch::guest(request.match_type.into(), names);
    state.insert_match(&record).await?;

    info!(
        match_id = %record.id,
        match_type = record.format.as_str(),
        player1 = record.sides.a.display_name(),
        player2 = record.sides.b.display_name(),
        "guest match created"
    );
    Ok(MatchCreated {
        match_id: record.id,
    })
}

pub async fn get_guest_match(state: &SharedState, id: Uuid) -> Result<MatchDetail, ServiceError> {
    let record = state.load_match(id).await?;
    ensure_guest(&record)?;
    Ok(MatchDetail::from(&record))
}

/// Most recently completed guest matches.
pub async fn guest_history(state: &SharedState) -> Result<Vec<MatchHistoryItem>, ServiceError> {
    let store = state.require_match_store().await?;
    let entities = store
        .list_completed(HistoryFilter::Guest, state.config().history_limit)
        .await?;

    Ok(entities
        .into_iter()
        .map(|entity| MatchHistoryItem::from(&TennisMatch::from(entity)))
        .collect())
}

pub async fn join_guest_match(state: &SharedState, id: Uuid) -> Result<MatchDetail, ServiceError> {
    let (record, started) = state
        .update_match(id, |record| {
            ensure_guest(record)?;
            Ok(scoring::start_match(record, SystemTime::now()))
        })
        .await?;

    if started {
        info!(match_id = %id, "guest match started");
    }
    Ok(MatchDetail::from(&record))
}

pub async fn record_guest_point(
    state: &SharedState,
    id: Uuid,
    request: PointRequest,
) -> Result<MatchDetail, ServiceError> {
    let side: Side = request.winner.parse()?;

    let (record, outcome) = state
        .update_match(id, |record| {
            ensure_guest(record)?;
            Ok(scoring::record_point(
                record,
                side,
                request.extra_stats.as_ref(),
                &Ruleset::QUICK_MATCH,
                SystemTime::now(),
            ))
        })
        .await?;

    log_outcome(id, side, outcome);
    Ok(MatchDetail::from(&record))
}

/// End a guest match early; the winner is the side with more sets by game count.
pub async fn end_guest_match(
    state: &SharedState,
    id: Uuid,
    request: CompleteMatchRequest,
) -> Result<MatchDetail, ServiceError> {
    let (record, outcome) = state
        .update_match(id, |record| {
            ensure_guest(record)?;
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
