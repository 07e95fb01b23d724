use std::{fmt, str::FromStr, time::SystemTime};

use indexmap::IndexMap;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    dao::models::{
        ExtraStatsEntity, GuestPlayerEntity, MatchEntity, MatchFormatEntity, MatchOriginEntity,
        MatchStatusEntity, ParticipantEntity, SetEntity, SideEntity,
    },
    state::scoring::ScoringError,
};

/// Free-form auxiliary counters recorded for one side (aces, double faults, ...).
pub type StatLine = IndexMap<String, Value>;

/// One of the two competing parties of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// First side, `player1` on the wire.
    A,
    /// Second side, `player2` on the wire.
    B,
}

impl Side {
    /// The other side.
    pub fn opponent(self) -> Self {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    /// Wire token used by clients and persisted documents.
    pub fn as_token(self) -> &'static str {
        match self {
            Side::A => "player1",
            Side::B => "player2",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

impl FromStr for Side {
    type Err = ScoringError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token.trim().to_ascii_lowercase().as_str() {
            "player1" | "a" => Ok(Side::A),
            "player2" | "b" => Ok(Side::B),
            _ => Err(ScoringError::InvalidSide {
                token: token.to_owned(),
            }),
        }
    }
}

/// A value tracked once per side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerSide<T> {
    /// Value for side A.
    pub a: T,
    /// Value for side B.
    pub b: T,
}

impl<T> PerSide<T> {
    pub fn new(a: T, b: T) -> Self {
        Self { a, b }
    }

    pub fn get(&self, side: Side) -> &T {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }

    pub fn get_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::A => &mut self.a,
            Side::B => &mut self.b,
        }
    }
}

/// Games won by each side inside one set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetScore {
    pub games_a: u32,
    pub games_b: u32,
}

impl SetScore {
    pub fn games(&self, side: Side) -> u32 {
        match side {
            Side::A => self.games_a,
            Side::B => self.games_b,
        }
    }

    pub fn games_mut(&mut self, side: Side) -> &mut u32 {
        match side {
            Side::A => &mut self.games_a,
            Side::B => &mut self.games_b,
        }
    }

    /// Side with strictly more games, if any.
    pub fn leader(&self) -> Option<Side> {
        match self.games_a.cmp(&self.games_b) {
            std::cmp::Ordering::Greater => Some(Side::A),
            std::cmp::Ordering::Less => Some(Side::B),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// Lifecycle of a match record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::NotStarted => "not_started",
            MatchStatus::InProgress => "in_progress",
            MatchStatus::Completed => "completed",
        }
    }
}

/// How the match came into existence; selects the scoring ruleset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOrigin {
    /// Created directly between two registered users.
    Direct,
    /// Derived from an accepted challenge.
    Challenge {
        /// Identifier of the originating challenge.
        challenge_id: Uuid,
    },
    /// Unauthenticated quick match between guest labels.
    Guest,
}

/// Singles or doubles. Doubles only changes how side labels are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchFormat {
    Singles,
    Doubles,
}

impl MatchFormat {
    /// Number of named players expected for this format.
    pub fn roster_size(self) -> usize {
        match self {
            MatchFormat::Singles => 2,
            MatchFormat::Doubles => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MatchFormat::Singles => "singles",
            MatchFormat::Doubles => "doubles",
        }
    }
}

/// Who plays on a side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Participant {
    /// Registered user resolved by the identity provider.
    User { user_id: Uuid, name: String },
    /// Free-text guest label (two names joined with `&` in doubles).
    Guest { label: String },
}

impl Participant {
    pub fn display_name(&self) -> &str {
        match self {
            Participant::User { name, .. } => name,
            Participant::Guest { label } => label,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Participant::User { user_id, .. } => Some(*user_id),
            Participant::Guest { .. } => None,
        }
    }
}

/// Guest player registered on a quick match roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestPlayer {
    pub id: Uuid,
    /// Generated handle, `guest_` followed by six hex characters.
    pub username: String,
    pub full_name: String,
}

impl GuestPlayer {
    pub fn new(full_name: String) -> Self {
        let id = Uuid::new_v4();
        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(6).collect();
        Self {
            id,
            username: format!("guest_{suffix}"),
            full_name,
        }
    }
}

/// Runtime representation of one scoring session between two sides.
#[derive(Debug, Clone, PartialEq)]
pub struct TennisMatch {
    pub id: Uuid,
    pub origin: MatchOrigin,
    pub format: MatchFormat,
    pub sides: PerSide<Participant>,
    pub guest_players: Vec<GuestPlayer>,
    /// Points inside the current game.
    pub points: PerSide<u32>,
    pub sets_won: PerSide<u32>,
    /// Ordered set list, the last entry being the current set.
    pub sets: Vec<SetScore>,
    pub status: MatchStatus,
    pub winner: Option<Side>,
    pub extra_stats: PerSide<StatLine>,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    pub started_at: Option<SystemTime>,
    pub ended_at: Option<SystemTime>,
    /// Persistence version, bumped on every successful write.
    pub version: u64,
}

impl TennisMatch {
    /// Build a fresh `not_started` match with zeroed counters.
    pub fn new(origin: MatchOrigin, format: MatchFormat, sides: PerSide<Participant>) -> Self {
        let now = SystemTime::now();
        Self {
            id: Uuid::new_v4(),
            origin,
            format,
            sides,
            guest_players: Vec::new(),
            points: PerSide::default(),
            sets_won: PerSide::default(),
            sets: Vec::new(),
            status: MatchStatus::NotStarted,
            winner: None,
            extra_stats: PerSide::default(),
            created_at: now,
            updated_at: now,
            started_at: None,
            ended_at: None,
            version: 0,
        }
    }

    /// Build a guest quick match from the roster names.
    ///
    /// Singles uses one name per side, doubles joins two names per side with ` & `.
    /// The roster length is expected to match [`MatchFormat::roster_size`].
    pub fn guest(format: MatchFormat, names: Vec<String>) -> Self {
        let guest_players: Vec<GuestPlayer> = names.into_iter().map(GuestPlayer::new).collect();
        let half = guest_players.len() / 2;
        let label = |players: &[GuestPlayer]| {
            players
                .iter()
                .map(|player| player.full_name.as_str())
                .collect::<Vec<_>>()
                .join(" & ")
        };
        let sides = PerSide::new(
            Participant::Guest {
                label: label(&guest_players[..half]),
            },
            Participant::Guest {
                label: label(&guest_players[half..]),
            },
        );

        let mut record = Self::new(MatchOrigin::Guest, format, sides);
        record.guest_players = guest_players;
        record
    }

    /// Side played by `user_id`, if the user takes part in the match.
    pub fn side_of(&self, user_id: Uuid) -> Option<Side> {
        [Side::A, Side::B]
            .into_iter()
            .find(|side| self.sides.get(*side).user_id() == Some(user_id))
    }

    pub fn challenge_id(&self) -> Option<Uuid> {
        match self.origin {
            MatchOrigin::Challenge { challenge_id } => Some(challenge_id),
            _ => None,
        }
    }

    /// Display name of the winning side, derived from the match's own participants.
    pub fn winner_name(&self) -> Option<&str> {
        self.winner
            .map(|side| self.sides.get(side).display_name())
    }
}

impl From<SideEntity> for Side {
    fn from(value: SideEntity) -> Self {
        match value {
            SideEntity::Player1 => Side::A,
            SideEntity::Player2 => Side::B,
        }
    }
}

impl From<Side> for SideEntity {
    fn from(value: Side) -> Self {
        match value {
            Side::A => SideEntity::Player1,
            Side::B => SideEntity::Player2,
        }
    }
}

impl From<MatchStatusEntity> for MatchStatus {
    fn from(value: MatchStatusEntity) -> Self {
        match value {
            MatchStatusEntity::NotStarted => MatchStatus::NotStarted,
            MatchStatusEntity::InProgress => MatchStatus::InProgress,
            MatchStatusEntity::Completed => MatchStatus::Completed,
        }
    }
}

impl From<MatchStatus> for MatchStatusEntity {
    fn from(value: MatchStatus) -> Self {
        match value {
            MatchStatus::NotStarted => MatchStatusEntity::NotStarted,
            MatchStatus::InProgress => MatchStatusEntity::InProgress,
            MatchStatus::Completed => MatchStatusEntity::Completed,
        }
    }
}

impl From<MatchOriginEntity> for MatchOrigin {
    fn from(value: MatchOriginEntity) -> Self {
        match value {
            MatchOriginEntity::Direct => MatchOrigin::Direct,
            MatchOriginEntity::Challenge { challenge_id } => MatchOrigin::Challenge { challenge_id },
            MatchOriginEntity::Guest => MatchOrigin::Guest,
        }
    }
}

impl From<MatchOrigin> for MatchOriginEntity {
    fn from(value: MatchOrigin) -> Self {
        match value {
            MatchOrigin::Direct => MatchOriginEntity::Direct,
            MatchOrigin::Challenge { challenge_id } => MatchOriginEntity::Challenge { challenge_id },
            MatchOrigin::Guest => MatchOriginEntity::Guest,
        }
    }
}

impl From<MatchFormatEntity> for MatchFormat {
    fn from(value: MatchFormatEntity) -> Self {
        match value {
            MatchFormatEntity::Singles => MatchFormat::Singles,
            MatchFormatEntity::Doubles => MatchFormat::Doubles,
        }
    }
}

impl From<MatchFormat> for MatchFormatEntity {
    fn from(value: MatchFormat) -> Self {
        match value {
            MatchFormat::Singles => MatchFormatEntity::Singles,
            MatchFormat::Doubles => MatchFormatEntity::Doubles,
        }
    }
}

impl From<ParticipantEntity> for Participant {
    fn from(value: ParticipantEntity) -> Self {
        match value {
            ParticipantEntity::User { user_id, name } => Participant::User { user_id, name },
            ParticipantEntity::Guest { label } => Participant::Guest { label },
        }
    }
}

impl From<Participant> for ParticipantEntity {
    fn from(value: Participant) -> Self {
        match value {
            Participant::User { user_id, name } => ParticipantEntity::User { user_id, name },
            Participant::Guest { label } => ParticipantEntity::Guest { label },
        }
    }
}

impl From<GuestPlayerEntity> for GuestPlayer {
    fn from(value: GuestPlayerEntity) -> Self {
        Self {
            id: value.id,
            username: value.username,
            full_name: value.full_name,
        }
    }
}

impl From<GuestPlayer> for GuestPlayerEntity {
    fn from(value: GuestPlayer) -> Self {
        Self {
            id: value.id,
            username: value.username,
            full_name: value.full_name,
        }
    }
}

impl From<SetEntity> for SetScore {
    fn from(value: SetEntity) -> Self {
        Self {
            games_a: value.player1_games,
            games_b: value.player2_games,
        }
    }
}

impl From<SetScore> for SetEntity {
    fn from(value: SetScore) -> Self {
        Self {
            player1_games: value.games_a,
            player2_games: value.games_b,
        }
    }
}

impl From<MatchEntity> for TennisMatch {
    fn from(value: MatchEntity) -> Self {
        Self {
            id: value.id,
            origin: value.origin.into(),
            format: value.format.into(),
            sides: PerSide::new(value.player1.into(), value.player2.into()),
            guest_players: value.guest_players.into_iter().map(Into::into).collect(),
            points: PerSide::new(value.player1_points, value.player2_points),
            sets_won: PerSide::new(value.player1_sets, value.player2_sets),
            sets: value.sets.into_iter().map(Into::into).collect(),
            status: value.status.into(),
            winner: value.winner.map(Into::into),
            extra_stats: PerSide::new(value.extra_stats.player1, value.extra_stats.player2),
            created_at: value.created_at,
            updated_at: value.updated_at,
            started_at: value.started_at,
            ended_at: value.ended_at,
            version: value.version,
        }
    }
}

impl From<TennisMatch> for MatchEntity {
    fn from(value: TennisMatch) -> Self {
        Self {
            id: value.id,
            version: value.version,
            origin: value.origin.into(),
            format: value.format.into(),
            player1: value.sides.a.into(),
            player2: value.sides.b.into(),
            guest_players: value.guest_players.into_iter().map(Into::into).collect(),
            player1_points: value.points.a,
            player2_points: value.points.b,
            player1_sets: value.sets_won.a,
            player2_sets: value.sets_won.b,
            sets: value.sets.into_iter().map(Into::into).collect(),
            status: value.status.into(),
            winner: value.winner.map(Into::into),
            extra_stats: ExtraStatsEntity {
                player1: value.extra_stats.a,
                player2: value.extra_stats.b,
            },
            created_at: value.created_at,
            updated_at: value.updated_at,
            started_at: value.started_at,
            ended_at: value.ended_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_tokens_parse_case_insensitively() {
        assert_eq!("player1".parse::<Side>().unwrap(), Side::A);
        assert_eq!(" Player2 ".parse::<Side>().unwrap(), Side::B);
        assert_eq!("a".parse::<Side>().unwrap(), Side::A);
        assert!(matches!(
            "player3".parse::<Side>(),
            Err(ScoringError::InvalidSide { token }) if token == "player3"
        ));
    }

    #[test]
    fn doubles_guest_labels_join_names() {
        let record = TennisMatch::guest(
            MatchFormat::Doubles,
            vec!["Ana".into(), "Bea".into(), "Cid".into(), "Dan".into()],
        );

        assert_eq!(record.sides.a.display_name(), "Ana & Bea");
        assert_eq!(record.sides.b.display_name(), "Cid & Dan");
        assert_eq!(record.guest_players.len(), 4);
        assert!(
            record
                .guest_players
                .iter()
                .all(|player| player.username.len() == "guest_".len() + 6)
        );
    }

    #[test]
    fn entity_conversion_preserves_scores() {
        let mut record = TennisMatch::guest(MatchFormat::Singles, vec!["Ana".into(), "Bea".into()]);
        record.sets = vec![SetScore { games_a: 6, games_b: 4 }, SetScore::default()];
        record.sets_won = PerSide::new(1, 0);
        record.points = PerSide::new(2, 3);
        record
            .extra_stats
            .a
            .insert("aces".into(), Value::from(4));

        let entity: MatchEntity = record.clone().into();
        assert_eq!(entity.player1_sets, 1);
        assert_eq!(entity.sets[0].player1_games, 6);

        let restored: TennisMatch = entity.into();
        assert_eq!(restored, record);
    }

    #[test]
    fn side_of_only_matches_registered_users() {
        let ana = Uuid::new_v4();
        let record = TennisMatch::new(
            MatchOrigin::Direct,
            MatchFormat::Singles,
            PerSide::new(
                Participant::User {
                    user_id: ana,
                    name: "ana".into(),
                },
                Participant::Guest {
                    label: "walk-in".into(),
                },
            ),
        );

        assert_eq!(record.side_of(ana), Some(Side::A));
        assert_eq!(record.side_of(Uuid::new_v4()), None);
    }
}
