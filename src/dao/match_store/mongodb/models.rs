use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::MongoDaoError;
use crate::dao::models::{
    ExtraStatsEntity, GuestPlayerEntity, MatchEntity, MatchFormatEntity, MatchOriginEntity,
    MatchStatusEntity, ParticipantEntity, SetEntity, SideEntity,
};

/// Match document stored in the `matches` collection.
///
/// Identifiers used in queries (`_id`, `challenge_id`, `user_ids`) are stored as strings and
/// timestamps as BSON dates so history listings can be sorted server side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMatchDocument {
    #[serde(rename = "_id")]
    id: String,
    version: i64,
    origin: MatchOriginEntity,
    challenge_id: Option<String>,
    user_ids: Vec<String>,
    format: MatchFormatEntity,
    player1: ParticipantEntity,
    player2: ParticipantEntity,
    #[serde(default)]
    guest_players: Vec<GuestPlayerEntity>,
    player1_points: u32,
    player2_points: u32,
    player1_sets: u32,
    player2_sets: u32,
    #[serde(default)]
    sets: Vec<SetEntity>,
    status: MatchStatusEntity,
    winner: Option<SideEntity>,
    #[serde(default)]
    extra_stats: ExtraStatsEntity,
    created_at: DateTime,
    updated_at: DateTime,
    started_at: Option<DateTime>,
    ended_at: Option<DateTime>,
}

fn stored_version(id: Uuid, version: u64) -> Result<i64, MongoDaoError> {
    i64::try_from(version).map_err(|_| MongoDaoError::VersionOverflow { id, version })
}

impl TryFrom<MatchEntity> for MongoMatchDocument {
    type Error = MongoDaoError;

    fn try_from(value: MatchEntity) -> Result<Self, Self::Error> {
        let version = stored_version(value.id, value.version)?;
        let challenge_id = value.challenge_id().map(|id| id.to_string());
        let user_ids = value.user_ids().map(|id| id.to_string()).collect();
        Ok(Self {
            id: value.id.to_string(),
            version,
            origin: value.origin,
            challenge_id,
            user_ids,
            format: value.format,
            player1: value.player1,
            player2: value.player2,
            guest_players: value.guest_players,
            player1_points: value.player1_points,
            player2_points: value.player2_points,
            player1_sets: value.player1_sets,
            player2_sets: value.player2_sets,
            sets: value.sets,
            status: value.status,
            winner: value.winner,
            extra_stats: value.extra_stats,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
            started_at: value.started_at.map(DateTime::from_system_time),
            ended_at: value.ended_at.map(DateTime::from_system_time),
        })
    }
}

impl TryFrom<MongoMatchDocument> for MatchEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoMatchDocument) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&value.id).map_err(|_| MongoDaoError::CorruptDocument {
            id: value.id.clone(),
            reason: "`_id` is not a UUID",
        })?;
        let version = u64::try_from(value.version).map_err(|_| MongoDaoError::CorruptDocument {
            id: value.id.clone(),
            reason: "negative version",
        })?;

        Ok(Self {
            id,
            version,
            origin: value.origin,
            format: value.format,
            player1: value.player1,
            player2: value.player2,
            guest_players: value.guest_players,
            player1_points: value.player1_points,
            player2_points: value.player2_points,
            player1_sets: value.player1_sets,
            player2_sets: value.player2_sets,
            sets: value.sets,
            status: value.status,
            winner: value.winner,
            extra_stats: value.extra_stats,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
            started_at: value.started_at.map(DateTime::to_system_time),
            ended_at: value.ended_at.map(DateTime::to_system_time),
        })
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

/// Filter selecting the stored document only while it still carries `version`.
pub fn versioned_doc_id(id: Uuid, version: u64) -> Result<Document, MongoDaoError> {
    Ok(doc! {"_id": id.to_string(), "version": stored_version(id, version)?})
}
