use std::time::SystemTime;

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::state::tennis::{MatchOrigin, MatchStatus, PerSide, SetScore, Side, StatLine, TennisMatch};

/// Errors raised by the scoring engine. All of them are local validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoringError {
    /// The submitted side token does not name one of the two sides.
    #[error("invalid side `{token}`, expected `player1` or `player2`")]
    InvalidSide {
        /// Token as received from the client.
        token: String,
    },
}

/// Scoring thresholds applied to a match.
///
/// See [`Ruleset::STANDARD`] and [`Ruleset::QUICK_MATCH`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ruleset {
    /// Human readable name, used in logs.
    pub name: &'static str,
    /// Minimum points needed to take a game.
    pub game_points: u32,
    /// Minimum point lead needed to take a game.
    pub game_margin: u32,
    /// Minimum games needed to take a set.
    pub set_games: u32,
    /// Minimum game lead needed to take a set.
    pub set_margin: u32,
    /// Game count that closes a set regardless of the opponent's games.
    pub set_cap: Option<u32>,
    /// Sets needed to take the match.
    pub sets_to_win: u32,
}

impl Ruleset {
    /// Authenticated and challenge matches: best of three, sets closed at 7 games.
    ///
    /// Reaching 7 games always takes the set, without looking at the opponent. Through
    /// point-by-point play this only happens from 6-6 or 6-5, but a 7-1 set is accepted as
    /// well.
    pub const STANDARD: Ruleset = Ruleset {
        name: "standard",
        game_points: 4,
        game_margin: 2,
        set_games: 6,
        set_margin: 2,
        set_cap: Some(7),
        sets_to_win: 2,
    };

    /// Guest quick matches: best of three, sets need a two game lead with no cap.
    pub const QUICK_MATCH: Ruleset = Ruleset {
        name: "quick_match",
        game_points: 4,
        game_margin: 2,
        set_games: 6,
        set_margin: 2,
        set_cap: None,
        sets_to_win: 2,
    };

    /// Ruleset used for matches of the given origin.
    pub fn for_origin(origin: MatchOrigin) -> Self {
        match origin {
            MatchOrigin::Direct | MatchOrigin::Challenge { .. } => Self::STANDARD,
            MatchOrigin::Guest => Self::QUICK_MATCH,
        }
    }

    fn wins_game(&self, own: u32, other: u32) -> bool {
        own >= self.game_points && own.saturating_sub(other) >= self.game_margin
    }

    fn wins_set(&self, own: u32, other: u32) -> bool {
        (own >= self.set_games && own.saturating_sub(other) >= self.set_margin)
            || self.set_cap == Some(own)
    }
}

/// Highest-level event produced by a scoring call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointOutcome {
    /// The match was already completed; nothing changed.
    MatchAlreadyCompleted,
    /// A point was added without deciding the game.
    Point,
    /// The side took the current game.
    GameWon(Side),
    /// The side took the current set and a new set was opened.
    SetWon(Side),
    /// The side took the match.
    MatchWon(Side),
}

/// Result of a forced completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// The match was already completed; nothing changed.
    AlreadyCompleted,
    /// The match was completed with the given winner (`None` when sets are level).
    Completed(Option<Side>),
}

/// Per-side extra statistics submitted alongside a point.
///
/// Sides are keyed with the same tokens [`Side`] parses; any other key is rejected.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ExtraStatsDelta {
    /// Keys to overwrite for side A.
    #[serde(default, alias = "a")]
    #[schema(value_type = Option<Object>)]
    pub player1: Option<StatLine>,
    /// Keys to overwrite for side B.
    #[serde(default, alias = "b")]
    #[schema(value_type = Option<Object>)]
    pub player2: Option<StatLine>,
}

impl ExtraStatsDelta {
    fn for_side(&self, side: Side) -> Option<&StatLine> {
        match side {
            Side::A => self.player1.as_ref(),
            Side::B => self.player2.as_ref(),
        }
    }
}

/// Shallow-merge a delta into the stored statistics: delta keys overwrite, others are kept.
pub fn merge_extra_stats(stats: &mut PerSide<StatLine>, delta: &ExtraStatsDelta) {
    for side in [Side::A, Side::B] {
        if let Some(incoming) = delta.for_side(side) {
            let current: &mut IndexMap<_, _> = stats.get_mut(side);
            for (key, value) in incoming {
                current.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Move a `not_started` match into play.
///
/// Returns `true` when the match changed.
pub fn start_match(record: &mut TennisMatch, now: SystemTime) -> bool {
    if record.status != MatchStatus::NotStarted {
        return false;
    }
    record.status = MatchStatus::InProgress;
    record.started_at.get_or_insert(now);
    ensure_current_set(record);
    true
}

/// Record a single point won by `side`.
///
/// Completed matches are left untouched and report [`PointOutcome::MatchAlreadyCompleted`].
pub fn record_point(
    record: &mut TennisMatch,
    side: Side,
    extra_stats: Option<&ExtraStatsDelta>,
    rules: &Ruleset,
    now: SystemTime,
) -> PointOutcome {
    if record.status == MatchStatus::Completed {
        return PointOutcome::MatchAlreadyCompleted;
    }
    start_match(record, now);
    ensure_current_set(record);

    if let Some(delta) = extra_stats {
        merge_extra_stats(&mut record.extra_stats, delta);
    }

    *record.points.get_mut(side) += 1;

    if rules.wins_game(*record.points.get(side), *record.points.get(side.opponent())) {
        award_game(record, side, rules, now)
    } else {
        PointOutcome::Point
    }
}

/// Record a whole game won by `side`, skipping point-level scoring.
pub fn record_game(
    record: &mut TennisMatch,
    side: Side,
    rules: &Ruleset,
    now: SystemTime,
) -> PointOutcome {
    if record.status == MatchStatus::Completed {
        return PointOutcome::MatchAlreadyCompleted;
    }
    start_match(record, now);
    ensure_current_set(record);
    award_game(record, side, rules, now)
}

/// Complete the match from the games recorded in each set.
///
/// Each set counts for the side with strictly more games; the winner is the side with
/// strictly more sets.
pub fn finalize_by_game_count(
    record: &mut TennisMatch,
    extra_stats: Option<&ExtraStatsDelta>,
    now: SystemTime,
) -> FinalizeOutcome {
    if record.status == MatchStatus::Completed {
        return FinalizeOutcome::AlreadyCompleted;
    }

    let mut sets_won = PerSide::new(0, 0);
    for leader in record.sets.iter().filter_map(SetScore::leader) {
        *sets_won.get_mut(leader) += 1;
    }

    let winner = match sets_won.a.cmp(&sets_won.b) {
        std::cmp::Ordering::Greater => Some(Side::A),
        std::cmp::Ordering::Less => Some(Side::B),
        std::cmp::Ordering::Equal => None,
    };

    if let Some(delta) = extra_stats {
        merge_extra_stats(&mut record.extra_stats, delta);
    }

    record.sets_won = sets_won;
    record.winner = winner;
    record.status = MatchStatus::Completed;
    record.ended_at.get_or_insert(now);
    FinalizeOutcome::Completed(winner)
}

fn ensure_current_set(record: &mut TennisMatch) {
    if record.sets.is_empty() {
        record.sets.push(SetScore::default());
    }
}

fn award_game(
    record: &mut TennisMatch,
    side: Side,
    rules: &Ruleset,
    now: SystemTime,
) -> PointOutcome {
    record.points = PerSide::new(0, 0);

    let Some(current) = record.sets.last_mut() else {
        return PointOutcome::GameWon(side);
    };
    *current.games_mut(side) += 1;

    if !rules.wins_set(current.games(side), current.games(side.opponent())) {
        return PointOutcome::GameWon(side);
    }

    *record.sets_won.get_mut(side) += 1;
    if *record.sets_won.get(side) >= rules.sets_to_win {
        record.status = MatchStatus::Completed;
        record.winner = Some(side);
        record.ended_at.get_or_insert(now);
        PointOutcome::MatchWon(side)
    } else {
        record.sets.push(SetScore::default());
        PointOutcome::SetWon(side)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::state::tennis::{MatchFormat, MatchOrigin, Participant, TennisMatch};

    fn direct_match() -> TennisMatch {
        TennisMatch::new(
            MatchOrigin::Direct,
            MatchFormat::Singles,
            PerSide::new(
                Participant::Guest { label: "A".into() },
                Participant::Guest { label: "B".into() },
            ),
        )
    }

    fn guest_match() -> TennisMatch {
        TennisMatch::guest(MatchFormat::Singles, vec!["Ana".into(), "Bea".into()])
    }

    fn play_points(record: &mut TennisMatch, side: Side, count: usize) -> PointOutcome {
        let rules = Ruleset::for_origin(record.origin);
        let mut outcome = PointOutcome::Point;
        for _ in 0..count {
            outcome = record_point(record, side, None, &rules, SystemTime::now());
        }
        outcome
    }

    fn play_game(record: &mut TennisMatch, side: Side) -> PointOutcome {
        play_points(record, side, 4)
    }

    fn stats(pairs: &[(&str, Value)]) -> StatLine {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn first_point_starts_match_and_opens_a_set() {
        let mut record = direct_match();
        assert!(record.sets.is_empty());

        let outcome = play_points(&mut record, Side::A, 1);

        assert_eq!(outcome, PointOutcome::Point);
        assert_eq!(record.status, MatchStatus::InProgress);
        assert!(record.started_at.is_some());
        assert_eq!(record.sets, vec![SetScore::default()]);
        assert_eq!(record.points, PerSide::new(1, 0));
    }

    #[test]
    fn started_at_is_never_overwritten() {
        let mut record = direct_match();
        let first = SystemTime::UNIX_EPOCH;
        start_match(&mut record, first);
        record_point(
            &mut record,
            Side::B,
            None,
            &Ruleset::STANDARD,
            SystemTime::now(),
        );
        assert_eq!(record.started_at, Some(first));
    }

    #[test]
    fn game_needs_four_points_and_two_point_lead() {
        let mut record = direct_match();
        play_points(&mut record, Side::A, 3);
        play_points(&mut record, Side::B, 3);
        // deuce: 4-3 is not enough
        assert_eq!(play_points(&mut record, Side::A, 1), PointOutcome::Point);
        // back to deuce, then advantage B
        play_points(&mut record, Side::B, 2);
        assert_eq!(record.points, PerSide::new(4, 5));
        assert_eq!(play_points(&mut record, Side::B, 1), PointOutcome::GameWon(Side::B));
        assert_eq!(record.points, PerSide::new(0, 0));
        assert_eq!(record.sets[0], SetScore { games_a: 0, games_b: 1 });
    }

    #[test]
    fn points_reset_together_after_every_game() {
        let mut record = direct_match();
        let rules = Ruleset::STANDARD;
        let sequence = [Side::A, Side::B, Side::A, Side::A, Side::B, Side::A, Side::A];
        for side in sequence.iter().cycle().take(200) {
            let outcome = record_point(&mut record, *side, None, &rules, SystemTime::now());
            if matches!(
                outcome,
                PointOutcome::GameWon(_) | PointOutcome::SetWon(_) | PointOutcome::MatchWon(_)
            ) {
                assert_eq!(record.points, PerSide::new(0, 0));
            }
            assert!(record.sets_won.a <= 2 && record.sets_won.b <= 2);
        }
    }

    #[test]
    fn straight_sets_win_completes_the_match() {
        let mut record = direct_match();
        let mut last = PointOutcome::Point;
        for _ in 0..12 {
            last = play_game(&mut record, Side::A);
        }

        assert_eq!(last, PointOutcome::MatchWon(Side::A));
        assert_eq!(record.sets_won, PerSide::new(2, 0));
        assert_eq!(record.status, MatchStatus::Completed);
        assert_eq!(record.winner, Some(Side::A));
        assert!(record.ended_at.is_some());
        assert_eq!(
            record.sets,
            vec![
                SetScore { games_a: 6, games_b: 0 },
                SetScore { games_a: 6, games_b: 0 },
            ]
        );
    }

    #[test]
    fn completed_match_ignores_further_points() {
        let mut record = direct_match();
        for _ in 0..12 {
            play_game(&mut record, Side::A);
        }
        let snapshot = record.clone();

        let delta = ExtraStatsDelta {
            player2: Some(stats(&[("aces", json!(1))])),
            ..Default::default()
        };
        let outcome = record_point(
            &mut record,
            Side::B,
            Some(&delta),
            &Ruleset::STANDARD,
            SystemTime::now(),
        );

        assert_eq!(outcome, PointOutcome::MatchAlreadyCompleted);
        assert_eq!(record, snapshot);
        assert_eq!(
            record_game(&mut record, Side::B, &Ruleset::STANDARD, SystemTime::now()),
            PointOutcome::MatchAlreadyCompleted
        );
        assert_eq!(record, snapshot);
    }

    #[test]
    fn seven_games_close_the_set_under_standard_rules() {
        let mut record = direct_match();
        for _ in 0..5 {
            play_game(&mut record, Side::A);
            play_game(&mut record, Side::B);
        }
        play_game(&mut record, Side::A);
        play_game(&mut record, Side::B);
        assert_eq!(record.sets[0], SetScore { games_a: 6, games_b: 6 });

        let outcome = play_game(&mut record, Side::A);

        assert_eq!(outcome, PointOutcome::SetWon(Side::A));
        assert_eq!(record.sets[0], SetScore { games_a: 7, games_b: 6 });
        assert_eq!(record.sets_won, PerSide::new(1, 0));
        assert_eq!(record.sets.len(), 2);
    }

    #[test]
    fn seven_five_closes_the_set_through_the_margin_rule() {
        let mut record = direct_match();
        for _ in 0..5 {
            play_game(&mut record, Side::A);
            play_game(&mut record, Side::B);
        }
        assert_eq!(play_game(&mut record, Side::A), PointOutcome::GameWon(Side::A));
        assert_eq!(play_game(&mut record, Side::A), PointOutcome::SetWon(Side::A));
        assert_eq!(record.sets[0], SetScore { games_a: 7, games_b: 5 });
    }

    #[test]
    fn seven_game_cap_ignores_the_opponent_count() {
        let mut record = direct_match();
        record.status = MatchStatus::InProgress;
        record.sets = vec![SetScore { games_a: 6, games_b: 1 }];
        // raise the margin threshold so only the cap can close the set
        let rules = Ruleset {
            set_games: 8,
            ..Ruleset::STANDARD
        };

        let outcome = record_game(&mut record, Side::A, &rules, SystemTime::now());

        assert_eq!(outcome, PointOutcome::SetWon(Side::A));
        assert_eq!(record.sets[0], SetScore { games_a: 7, games_b: 1 });
    }

    #[test]
    fn quick_match_sets_run_past_seven_games() {
        let mut record = guest_match();
        for _ in 0..6 {
            play_game(&mut record, Side::A);
            play_game(&mut record, Side::B);
        }
        assert_eq!(play_game(&mut record, Side::A), PointOutcome::GameWon(Side::A));
        assert_eq!(record.sets[0], SetScore { games_a: 7, games_b: 6 });
        assert_eq!(record.sets_won, PerSide::new(0, 0));

        assert_eq!(play_game(&mut record, Side::B), PointOutcome::GameWon(Side::B));
        play_game(&mut record, Side::A);
        assert_eq!(play_game(&mut record, Side::A), PointOutcome::SetWon(Side::A));
        assert_eq!(record.sets[0], SetScore { games_a: 9, games_b: 7 });
    }

    #[test]
    fn three_set_match_ends_on_second_set_won() {
        let mut record = direct_match();
        for _ in 0..6 {
            play_game(&mut record, Side::A);
        }
        for _ in 0..6 {
            play_game(&mut record, Side::B);
        }
        assert_eq!(record.sets_won, PerSide::new(1, 1));
        assert_eq!(record.sets.len(), 3);

        for _ in 0..5 {
            play_game(&mut record, Side::B);
        }
        assert_eq!(play_game(&mut record, Side::B), PointOutcome::MatchWon(Side::B));
        assert_eq!(record.winner, Some(Side::B));
        assert_eq!(record.sets.len(), 3);
    }

    #[test]
    fn record_game_resets_points_and_promotes_status() {
        let mut record = direct_match();
        play_points(&mut record, Side::B, 2);

        let outcome = record_game(&mut record, Side::A, &Ruleset::STANDARD, SystemTime::now());

        assert_eq!(outcome, PointOutcome::GameWon(Side::A));
        assert_eq!(record.points, PerSide::new(0, 0));
        assert_eq!(record.sets[0], SetScore { games_a: 1, games_b: 0 });
    }

    #[test]
    fn extra_stats_overwrite_and_keep_other_keys() {
        let mut record = direct_match();
        let first = ExtraStatsDelta {
            player1: Some(stats(&[("aces", json!(3)), ("double_faults", json!(1))])),
            player2: None,
        };
        let second = ExtraStatsDelta {
            player1: Some(stats(&[("aces", json!(5))])),
            player2: None,
        };

        record_point(&mut record, Side::A, Some(&first), &Ruleset::STANDARD, SystemTime::now());
        record_point(&mut record, Side::A, Some(&second), &Ruleset::STANDARD, SystemTime::now());

        assert_eq!(record.extra_stats.a.get("aces"), Some(&json!(5)));
        assert_eq!(record.extra_stats.a.get("double_faults"), Some(&json!(1)));
        assert!(record.extra_stats.b.is_empty());
    }

    #[test]
    fn extra_stats_keys_follow_side_tokens() {
        let delta: ExtraStatsDelta =
            serde_json::from_value(json!({"a": {"aces": 3}, "player2": {"aces": 1}})).unwrap();
        assert_eq!(delta.player1, Some(stats(&[("aces", json!(3))])));
        assert_eq!(delta.player2, Some(stats(&[("aces", json!(1))])));

        let unknown = serde_json::from_value::<ExtraStatsDelta>(json!({"player3": {"x": 1}}));
        assert!(unknown.is_err());
    }

    #[test]
    fn finalize_matches_point_by_point_winner() {
        for winner in [Side::A, Side::B] {
            let mut replayed = direct_match();
            // first set to the loser, then two sets to the winner with some games conceded
            for _ in 0..6 {
                play_game(&mut replayed, winner.opponent());
            }
            for _ in 0..2 {
                for _ in 0..3 {
                    play_game(&mut replayed, winner.opponent());
                }
                for _ in 0..6 {
                    play_game(&mut replayed, winner);
                }
            }
            assert_eq!(replayed.winner, Some(winner));

            let mut forced = direct_match();
            forced.status = MatchStatus::InProgress;
            forced.sets = replayed.sets.clone();
            let outcome = finalize_by_game_count(&mut forced, None, SystemTime::now());

            assert_eq!(outcome, FinalizeOutcome::Completed(Some(winner)));
            assert_eq!(forced.winner, replayed.winner);
            assert_eq!(forced.sets_won, replayed.sets_won);
            assert_eq!(forced.status, MatchStatus::Completed);
        }
    }

    #[test]
    fn finalize_with_level_sets_has_no_winner() {
        let mut record = direct_match();
        record.status = MatchStatus::InProgress;
        record.sets = vec![
            SetScore { games_a: 6, games_b: 2 },
            SetScore { games_a: 1, games_b: 6 },
            SetScore { games_a: 3, games_b: 3 },
        ];

        let outcome = finalize_by_game_count(&mut record, None, SystemTime::now());

        assert_eq!(outcome, FinalizeOutcome::Completed(None));
        assert_eq!(record.sets_won, PerSide::new(1, 1));
        assert_eq!(record.winner, None);
        assert_eq!(record.status, MatchStatus::Completed);
    }

    #[test]
    fn finalize_is_a_no_op_on_completed_matches() {
        let mut record = direct_match();
        for _ in 0..12 {
            play_game(&mut record, Side::B);
        }
        let snapshot = record.clone();

        let outcome = finalize_by_game_count(&mut record, None, SystemTime::now());

        assert_eq!(outcome, FinalizeOutcome::AlreadyCompleted);
        assert_eq!(record, snapshot);
    }
}
