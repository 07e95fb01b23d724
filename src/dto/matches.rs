use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    dto::{
        format_system_time,
        validation::{validate_game_type, validate_player_name},
    },
    state::{
        scoring::ExtraStatsDelta,
        tennis::{
            GuestPlayer, MatchFormat, MatchOrigin, Participant, SetScore, Side, StatLine,
            TennisMatch,
        },
    },
};

fn default_game_type() -> String {
    "tennis".into()
}

/// Singles or doubles on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MatchTypeDto {
    #[default]
    Singles,
    Doubles,
}

impl From<MatchTypeDto> for MatchFormat {
    fn from(value: MatchTypeDto) -> Self {
        match value {
            MatchTypeDto::Singles => MatchFormat::Singles,
            MatchTypeDto::Doubles => MatchFormat::Doubles,
        }
    }
}

/// Payload used by a registered user to open a match against another user.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateMatchRequest {
    pub opponent_id: Uuid,
    /// Display name of the opponent; defaults to the opponent id.
    #[serde(default)]
    pub opponent_name: Option<String>,
    #[serde(default = "default_game_type")]
    pub game_type: String,
    #[serde(default)]
    pub match_type: MatchTypeDto,
}

impl Validate for CreateMatchRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_game_type(&self.game_type) {
            errors.add("game_type", e);
        }
        if let Some(ref name) = self.opponent_name {
            if let Err(e) = validate_player_name(name) {
                errors.add("opponent_name", e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Payload used to open (or fetch) the match attached to an accepted challenge.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StartChallengeMatchRequest {
    pub opponent_id: Uuid,
    #[serde(default)]
    pub opponent_name: Option<String>,
}

impl Validate for StartChallengeMatchRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(ref name) = self.opponent_name {
            if let Err(e) = validate_player_name(name) {
                errors.add("opponent_name", e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Payload used to open an unauthenticated quick match.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateGuestMatchRequest {
    #[serde(default = "default_game_type")]
    pub game_type: String,
    #[serde(default)]
    pub match_type: MatchTypeDto,
    /// Player names: two for singles, four for doubles (first half plays as `player1`).
    pub players: Vec<String>,
}

impl Validate for CreateGuestMatchRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_game_type(&self.game_type) {
            errors.add("game_type", e);
        }

        let expected = MatchFormat::from(self.match_type).roster_size();
        if self.players.len() != expected {
            let mut err = ValidationError::new("players_count");
            err.message = Some(
                format!(
                    "{} matches need exactly {expected} players (got {})",
                    MatchFormat::from(self.match_type).as_str(),
                    self.players.len()
                )
                .into(),
            );
            errors.add("players", err);
        }

        for name in &self.players {
            if let Err(e) = validate_player_name(name) {
                errors.add("players", e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// A point won by one side, optionally carrying statistics to merge.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PointRequest {
    /// `player1` or `player2`.
    pub winner: String,
    #[serde(default)]
    pub extra_stats: Option<ExtraStatsDelta>,
}

/// A whole game won by one side.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GameRequest {
    /// `player1` or `player2`.
    pub winner: String,
}

/// Forced completion of a match, decided from the games recorded so far.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CompleteMatchRequest {
    #[serde(default)]
    pub extra_stats: Option<ExtraStatsDelta>,
}

/// Identifier of a freshly created match.
#[derive(Debug, Serialize, ToSchema)]
pub struct MatchCreated {
    pub match_id: Uuid,
}

/// One side of a match as shown to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct ParticipantSummary {
    /// `user` or `guest`.
    pub kind: String,
    pub user_id: Option<Uuid>,
    pub name: String,
}

impl From<&Participant> for ParticipantSummary {
    fn from(value: &Participant) -> Self {
        match value {
            Participant::User { user_id, name } => Self {
                kind: "user".into(),
                user_id: Some(*user_id),
                name: name.clone(),
            },
            Participant::Guest { label } => Self {
                kind: "guest".into(),
                user_id: None,
                name: label.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GuestPlayerSummary {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
}

impl From<&GuestPlayer> for GuestPlayerSummary {
    fn from(value: &GuestPlayer) -> Self {
        Self {
            id: value.id,
            username: value.username.clone(),
            full_name: value.full_name.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SetSummary {
    pub player1_games: u32,
    pub player2_games: u32,
}

impl From<&SetScore> for SetSummary {
    fn from(value: &SetScore) -> Self {
        Self {
            player1_games: value.games_a,
            player2_games: value.games_b,
        }
    }
}

/// Auxiliary statistics recorded per side.
#[derive(Debug, Serialize, ToSchema)]
pub struct ExtraStatsSummary {
    #[schema(value_type = Object)]
    pub player1: StatLine,
    #[schema(value_type = Object)]
    pub player2: StatLine,
}

/// Full state of one match.
#[derive(Debug, Serialize, ToSchema)]
pub struct MatchDetail {
    pub id: Uuid,
    /// `direct`, `challenge` or `guest`.
    pub origin: String,
    pub challenge_id: Option<Uuid>,
    pub game_type: String,
    pub match_type: String,
    pub player1: ParticipantSummary,
    pub player2: ParticipantSummary,
    pub guest_players: Vec<GuestPlayerSummary>,
    pub status: String,
    pub player1_points: u32,
    pub player2_points: u32,
    pub player1_sets: u32,
    pub player2_sets: u32,
    pub sets: Vec<SetSummary>,
    /// Winning side token, set once completed.
    pub winner: Option<String>,
    pub winner_name: Option<String>,
    /// Sets won, `"<player1> - <player2>"`.
    pub score: String,
    pub extra_stats: ExtraStatsSummary,
    pub version: u64,
    pub created_at: String,
    pub updated_at: String,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
}

/// Compact entry of a history listing.
#[derive(Debug, Serialize, ToSchema)]
pub struct MatchHistoryItem {
    pub id: Uuid,
    pub match_type: String,
    pub player1: String,
    pub player2: String,
    pub winner: Option<String>,
    pub winner_name: Option<String>,
    pub score: String,
    pub sets: Vec<SetSummary>,
    pub ended_at: Option<String>,
}

fn origin_name(origin: MatchOrigin) -> &'static str {
    match origin {
        MatchOrigin::Direct => "direct",
        MatchOrigin::Challenge { .. } => "challenge",
        MatchOrigin::Guest => "guest",
    }
}

fn score_line(record: &TennisMatch) -> String {
    format!("{} - {}", record.sets_won.a, record.sets_won.b)
}

impl From<&TennisMatch> for MatchDetail {
    fn from(record: &TennisMatch) -> Self {
        Self {
            id: record.id,
            origin: origin_name(record.origin).into(),
            challenge_id: record.challenge_id(),
            game_type: default_game_type(),
            match_type: record.format.as_str().into(),
            player1: record.sides.get(Side::A).into(),
            player2: record.sides.get(Side::B).into(),
            guest_players: record.guest_players.iter().map(Into::into).collect(),
            status: record.status.as_str().into(),
            player1_points: record.points.a,
            player2_points: record.points.b,
            player1_sets: record.sets_won.a,
            player2_sets: record.sets_won.b,
            sets: record.sets.iter().map(Into::into).collect(),
            winner: record.winner.map(|side| side.as_token().to_owned()),
            winner_name: record.winner_name().map(str::to_owned),
            score: score_line(record),
            extra_stats: ExtraStatsSummary {
                player1: record.extra_stats.a.clone(),
                player2: record.extra_stats.b.clone(),
            },
            version: record.version,
            created_at: format_system_time(record.created_at),
            updated_at: format_system_time(record.updated_at),
            started_at: record.started_at.map(format_system_time),
            ended_at: record.ended_at.map(format_system_time),
        }
    }
}

impl From<&TennisMatch> for MatchHistoryItem {
    fn from(record: &TennisMatch) -> Self {
        Self {
            id: record.id,
            match_type: record.format.as_str().into(),
            player1: record.sides.a.display_name().to_owned(),
            player2: record.sides.b.display_name().to_owned(),
            winner: record.winner.map(|side| side.as_token().to_owned()),
            winner_name: record.winner_name().map(str::to_owned),
            score: score_line(record),
            sets: record.sets.iter().map(Into::into).collect(),
            ended_at: record.ended_at.map(format_system_time),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    use crate::state::scoring::{Ruleset, record_game};

    fn guest_request(match_type: MatchTypeDto, players: &[&str]) -> CreateGuestMatchRequest {
        CreateGuestMatchRequest {
            game_type: "tennis".into(),
            match_type,
            players: players.iter().map(|name| name.to_string()).collect(),
        }
    }

    #[test]
    fn guest_roster_must_match_the_format() {
        assert!(guest_request(MatchTypeDto::Singles, &["Ana", "Bo"]).validate().is_ok());
        assert!(
            guest_request(MatchTypeDto::Doubles, &["Ana", "Bo", "Cy", "Di"])
                .validate()
                .is_ok()
        );
        assert!(guest_request(MatchTypeDto::Singles, &["Ana"]).validate().is_err());
        assert!(guest_request(MatchTypeDto::Doubles, &["Ana", "Bo"]).validate().is_err());
    }

    #[test]
    fn guest_request_rejects_other_games() {
        let mut request = guest_request(MatchTypeDto::Singles, &["Ana", "Bo"]);
        request.game_type = "squash".into();
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("game_type"));
    }

    #[test]
    fn match_type_defaults_to_singles() {
        let request: CreateGuestMatchRequest =
            serde_json::from_str(r#"{"players":["Ana","Bo"]}"#).unwrap();
        assert_eq!(request.match_type, MatchTypeDto::Singles);
        assert_eq!(request.game_type, "tennis");
    }

    #[test]
    fn detail_reports_winner_from_own_sides() {
        let mut record =
            TennisMatch::guest(MatchFormat::Doubles, vec!["A".into(), "B".into(), "C".into(), "D".into()]);
        for _ in 0..12 {
            record_game(&mut record, Side::B, &Ruleset::QUICK_MATCH, SystemTime::now());
        }

        let detail = MatchDetail::from(&record);
        assert_eq!(detail.status, "completed");
        assert_eq!(detail.winner.as_deref(), Some("player2"));
        assert_eq!(detail.winner_name.as_deref(), Some("C & D"));
        assert_eq!(detail.score, "0 - 2");
        assert_eq!(detail.sets.len(), 2);
        assert!(detail.ended_at.is_some());
    }
}
