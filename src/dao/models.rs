use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Side identifier as persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SideEntity {
    Player1,
    Player2,
}

/// Lifecycle status as persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatusEntity {
    NotStarted,
    InProgress,
    Completed,
}

/// Origin of a match as persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchOriginEntity {
    Direct,
    Challenge { challenge_id: Uuid },
    Guest,
}

/// Singles or doubles as persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchFormatEntity {
    Singles,
    Doubles,
}

/// One side of a match: a registered user or a guest label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParticipantEntity {
    User { user_id: Uuid, name: String },
    Guest { label: String },
}

/// Guest player registered on a quick match roster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuestPlayerEntity {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
}

/// Games won by each side in one set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetEntity {
    pub player1_games: u32,
    pub player2_games: u32,
}

/// Free-form per-side statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExtraStatsEntity {
    #[serde(default)]
    pub player1: IndexMap<String, Value>,
    #[serde(default)]
    pub player2: IndexMap<String, Value>,
}

/// Aggregate match record persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchEntity {
    /// Primary key of the match.
    pub id: Uuid,
    /// Optimistic concurrency version, incremented on every update.
    pub version: u64,
    pub origin: MatchOriginEntity,
    pub format: MatchFormatEntity,
    pub player1: ParticipantEntity,
    pub player2: ParticipantEntity,
    #[serde(default)]
    pub guest_players: Vec<GuestPlayerEntity>,
    pub player1_points: u32,
    pub player2_points: u32,
    pub player1_sets: u32,
    pub player2_sets: u32,
    #[serde(default)]
    pub sets: Vec<SetEntity>,
    pub status: MatchStatusEntity,
    pub winner: Option<SideEntity>,
    #[serde(default)]
    pub extra_stats: ExtraStatsEntity,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    pub started_at: Option<SystemTime>,
    pub ended_at: Option<SystemTime>,
}

impl MatchEntity {
    /// Identifier of the originating challenge, if any.
    pub fn challenge_id(&self) -> Option<Uuid> {
        match self.origin {
            MatchOriginEntity::Challenge { challenge_id } => Some(challenge_id),
            _ => None,
        }
    }

    /// Registered user ids playing this match.
    pub fn user_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        [&self.player1, &self.player2]
            .into_iter()
            .filter_map(|participant| match participant {
                ParticipantEntity::User { user_id, .. } => Some(*user_id),
                ParticipantEntity::Guest { .. } => None,
            })
    }
}
