//! Single-match processing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::registry::{Registry, RegistryEntry};
use super::validate::parse_match;
use super::{rating_change, round_rating, table_average, RatingEngine};
use crate::models::{MatchRecord, PlayerUpdate, RowHandle, SEATS};

/// Result of processing one match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    pub success: bool,

    /// One update per seat, keyed by the player's write-back handle
    pub updates: BTreeMap<RowHandle, PlayerUpdate>,

    pub errors: Vec<String>,

    /// End time of the match, when it was processed
    pub end_time: Option<DateTime<Utc>>,
}

impl MatchOutcome {
    fn failed(errors: Vec<String>) -> Self {
        Self {
            success: false,
            errors,
            ..Default::default()
        }
    }
}

impl RatingEngine {
    /// Compute the rating updates for one match.
    ///
    /// The registry is only read. Every seat is resolved before anything is
    /// computed, so a match with an unknown player yields no updates at all.
    pub fn process_match(&self, record: &MatchRecord, registry: &Registry) -> MatchOutcome {
        let validated = match parse_match(record, self.rules()) {
            Ok(m) => m,
            Err(errors) => return MatchOutcome::failed(errors),
        };

        let mut entries: Vec<&RegistryEntry> = Vec::with_capacity(SEATS);
        let mut errors = Vec::new();
        for seat in &validated.seats {
            match registry.get(&seat.player_id) {
                Some(entry) => entries.push(entry),
                None => errors.push(format!("player not found: {}", seat.player_id)),
            }
        }
        if !errors.is_empty() {
            return MatchOutcome::failed(errors);
        }

        let ratings: Vec<f64> = entries.iter().map(|e| e.player.rating).collect();
        let table_avg = table_average(&ratings);

        let mut updates = BTreeMap::new();
        for ((placement, seat), entry) in validated.placements().zip(entries) {
            let player = &entry.player;
            let delta = rating_change(
                player.rating,
                player.games,
                placement,
                table_avg,
                self.config(),
            );
            let rating = round_rating(player.rating + delta);

            updates.insert(
                entry.handle,
                PlayerUpdate {
                    id: player.id.clone(),
                    name: seat
                        .player_name
                        .clone()
                        .unwrap_or_else(|| player.name.clone()),
                    rating,
                    games: player.games.saturating_add(1),
                    last_played: validated.end_time,
                    delta: round_rating(rating - player.rating),
                },
            );
        }

        MatchOutcome {
            success: true,
            updates,
            errors: Vec::new(),
            end_time: Some(validated.end_time),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculate::build_registry;
    use crate::models::{Player, PlayerId, RawSeat, StoredPlayer, DEFAULT_RATING};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn record(seats: [(&str, &str); 4]) -> MatchRecord {
        MatchRecord::new(
            "2024-02-01 19:00:00",
            "2024-02-01 20:30:00",
            [
                RawSeat::new(seats[0].0, seats[0].1, "40000"),
                RawSeat::new(seats[1].0, seats[1].1, "10000"),
                RawSeat::new(seats[2].0, seats[2].1, "-15000"),
                RawSeat::new(seats[3].0, seats[3].1, "-35000"),
            ],
        )
    }

    fn stored(handle: usize, id: &str, name: &str, rating: f64, games: u32) -> StoredPlayer {
        let mut player = Player::new(PlayerId::from(id), name);
        player.rating = rating;
        player.games = games;
        StoredPlayer {
            handle: RowHandle::new(handle),
            player,
        }
    }

    fn update_for<'a>(outcome: &'a MatchOutcome, id: &str) -> &'a PlayerUpdate {
        outcome
            .updates
            .values()
            .find(|u| u.id.as_str() == id)
            .unwrap()
    }

    #[test]
    fn test_new_players_first_match() {
        let m = record([("p1", "Ann"), ("p2", "Ben"), ("p3", "Cid"), ("p4", "Dee")]);
        let (registry, _) = build_registry(Vec::new(), std::slice::from_ref(&m), DEFAULT_RATING);

        let outcome = RatingEngine::default().process_match(&m, &registry);
        assert!(outcome.success);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.updates.len(), 4);

        let first = update_for(&outcome, "p1");
        let last = update_for(&outcome, "p4");
        assert_eq!(first.rating, 1530.0);
        assert_eq!(update_for(&outcome, "p2").rating, 1510.0);
        assert_eq!(update_for(&outcome, "p3").rating, 1490.0);
        assert_eq!(last.rating, 1470.0);
        assert_eq!(first.delta, 30.0);

        for update in outcome.updates.values() {
            assert_eq!(update.games, 1);
        }
        assert_eq!(first.name, "Ann");
        assert_eq!(last.name, "Dee");

        let end = Utc.with_ymd_and_hms(2024, 2, 1, 20, 30, 0).unwrap();
        assert_eq!(first.last_played, end);
        assert_eq!(outcome.end_time, Some(end));
    }

    #[test]
    fn test_updates_keyed_by_handle() {
        let registry = Registry::from_stored(vec![
            stored(10, "p1", "Ann", 1500.0, 0),
            stored(11, "p2", "Ben", 1500.0, 0),
            stored(12, "p3", "Cid", 1500.0, 0),
            stored(13, "p4", "Dee", 1500.0, 0),
        ]);
        let m = record([("p3", ""), ("p1", ""), ("p4", ""), ("p2", "")]);

        let outcome = RatingEngine::default().process_match(&m, &registry);
        assert!(outcome.success);

        let handles: Vec<usize> = outcome.updates.keys().map(|h| h.index()).collect();
        assert_eq!(handles, vec![10, 11, 12, 13]);
        assert_eq!(outcome.updates[&RowHandle::new(12)].rating, 1530.0);
        assert_eq!(outcome.updates[&RowHandle::new(11)].rating, 1470.0);
    }

    #[test]
    fn test_stored_name_kept_when_match_has_none() {
        let registry = Registry::from_stored(vec![
            stored(0, "p1", "Ann", 1500.0, 0),
            stored(1, "p2", "Ben", 1500.0, 0),
            stored(2, "p3", "Cid", 1500.0, 0),
            stored(3, "p4", "Dee", 1500.0, 0),
        ]);
        let m = record([("p1", ""), ("p2", "Benjamin"), ("p3", " "), ("p4", "")]);

        let outcome = RatingEngine::default().process_match(&m, &registry);
        assert_eq!(update_for(&outcome, "p1").name, "Ann");
        assert_eq!(update_for(&outcome, "p2").name, "Benjamin");
        assert_eq!(update_for(&outcome, "p3").name, "Cid");
    }

    #[test]
    fn test_table_average_from_current_ratings() {
        // Average is 1550: p1 is 150 under, p4 is 150 over
        let registry = Registry::from_stored(vec![
            stored(0, "p1", "Ann", 1400.0, 0),
            stored(1, "p2", "Ben", 1500.0, 0),
            stored(2, "p3", "Cid", 1600.0, 0),
            stored(3, "p4", "Dee", 1700.0, 0),
        ]);
        let m = record([("p1", ""), ("p2", ""), ("p3", ""), ("p4", "")]);

        let outcome = RatingEngine::default().process_match(&m, &registry);
        // 30 + 150/40
        assert_eq!(update_for(&outcome, "p1").rating, 1433.75);
        // 10 + 50/40
        assert_eq!(update_for(&outcome, "p2").rating, 1511.25);
        // -10 - 50/40
        assert_eq!(update_for(&outcome, "p3").rating, 1588.75);
        // -30 - 150/40
        assert_eq!(update_for(&outcome, "p4").rating, 1666.25);
    }

    #[test]
    fn test_experience_scales_delta() {
        let registry = Registry::from_stored(vec![
            stored(0, "p1", "Ann", 1500.0, 100),
            stored(1, "p2", "Ben", 1500.0, 0),
            stored(2, "p3", "Cid", 1500.0, 0),
            stored(3, "p4", "Dee", 1500.0, 350),
        ]);
        let m = record([("p1", ""), ("p2", ""), ("p3", ""), ("p4", "")]);

        let outcome = RatingEngine::default().process_match(&m, &registry);
        assert_eq!(update_for(&outcome, "p1").rating, 1524.0);
        assert_eq!(update_for(&outcome, "p1").games, 101);
        assert_eq!(update_for(&outcome, "p4").rating, 1494.0);
    }

    #[test]
    fn test_games_count_saturates() {
        let registry = Registry::from_stored(vec![
            stored(0, "p1", "Ann", 1500.0, u32::MAX),
            stored(1, "p2", "Ben", 1500.0, 0),
            stored(2, "p3", "Cid", 1500.0, 0),
            stored(3, "p4", "Dee", 1500.0, 0),
        ]);
        let m = record([("p1", ""), ("p2", ""), ("p3", ""), ("p4", "")]);

        let outcome = RatingEngine::default().process_match(&m, &registry);
        assert!(outcome.success);
        assert_eq!(update_for(&outcome, "p1").games, u32::MAX);
        assert_eq!(update_for(&outcome, "p1").rating, 1506.0);
    }

    #[test]
    fn test_unknown_player_fails_whole_match() {
        let registry = Registry::from_stored(vec![
            stored(0, "p1", "Ann", 1500.0, 0),
            stored(1, "p2", "Ben", 1500.0, 0),
            stored(2, "p3", "Cid", 1500.0, 0),
        ]);
        let m = record([("p1", ""), ("p2", ""), ("p3", ""), ("ghost", "")]);

        let outcome = RatingEngine::default().process_match(&m, &registry);
        assert!(!outcome.success);
        assert!(outcome.updates.is_empty());
        assert_eq!(outcome.errors, vec!["player not found: ghost".to_string()]);
        assert_eq!(outcome.end_time, None);
    }

    #[test]
    fn test_invalid_match_returns_validation_errors() {
        let registry = Registry::new();
        let m = record([("p1", ""), ("p1", ""), ("p3", ""), ("p4", "")]);

        let outcome = RatingEngine::default().process_match(&m, &registry);
        assert!(!outcome.success);
        assert!(outcome.updates.is_empty());
        assert_eq!(outcome.errors, vec!["duplicate player id: p1".to_string()]);
    }
}
