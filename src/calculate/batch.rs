//! Batch processing.
//!
//! Replays an ordered sequence of matches, folding each match's updates back
//! into the registry before the next one is processed.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::registry::Registry;
use super::RatingEngine;
use crate::models::{MatchRecord, PlayerUpdate, RowHandle};

/// Result of a batch run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    /// True only if no match failed
    pub success: bool,

    /// Matches that produced updates
    pub processed_count: usize,

    /// Latest update per handle across all successful matches
    pub player_updates: BTreeMap<RowHandle, PlayerUpdate>,

    /// One entry per failed match, labelled with its position
    pub errors: Vec<String>,

    /// Latest end time among successful matches
    pub latest_end_time: Option<DateTime<Utc>>,
}

impl BatchOutcome {
    pub fn failed_count(&self) -> usize {
        self.errors.len()
    }
}

impl RatingEngine {
    /// Process matches in the order given.
    ///
    /// A failed match is recorded and skipped. Successful updates are
    /// written into `registry` immediately so that later matches see them.
    pub fn process_batch(&self, matches: &[MatchRecord], registry: &mut Registry) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for (index, record) in matches.iter().enumerate() {
            let result = self.process_match(record, registry);

            if !result.success {
                let err = format!("match {}: {}", index + 1, result.errors.join("; "));
                warn!("{}", err);
                outcome.errors.push(err);
                continue;
            }

            for (handle, update) in result.updates {
                registry.apply(&update);
                debug!(
                    "{} ({}) {:+.2} -> {:.2}",
                    update.id, handle, update.delta, update.rating
                );
                outcome.player_updates.insert(handle, update);
            }

            outcome.processed_count += 1;
            outcome.latest_end_time = outcome.latest_end_time.max(result.end_time);
        }

        outcome.success = outcome.errors.is_empty();

        info!(
            "Batch complete: {} of {} matches processed, {} players updated, {} errors",
            outcome.processed_count,
            matches.len(),
            outcome.player_updates.len(),
            outcome.errors.len()
        );

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculate::build_registry;
    use crate::models::{PlayerId, RawSeat, DEFAULT_RATING};
    use chrono::TimeZone;

    fn record(end: &str, ids: [&str; 4]) -> MatchRecord {
        MatchRecord::new(
            "2024-03-01 18:00:00",
            end,
            ids.map(|id| RawSeat::new(id, id.to_uppercase(), "0")),
        )
    }

    fn rating_of(registry: &Registry, id: &str) -> f64 {
        registry.get(&PlayerId::from(id)).unwrap().player.rating
    }

    #[test]
    fn test_empty_batch() {
        let mut registry = Registry::new();
        let outcome = RatingEngine::default().process_batch(&[], &mut registry);

        assert!(outcome.success);
        assert_eq!(outcome.processed_count, 0);
        assert!(outcome.player_updates.is_empty());
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.latest_end_time, None);
    }

    #[test]
    fn test_registry_folded_between_matches() {
        let matches = vec![
            record("2024-03-01 19:00:00", ["a", "b", "c", "d"]),
            record("2024-03-01 20:00:00", ["e", "f", "g", "a"]),
        ];
        let (mut registry, _) = build_registry(Vec::new(), &matches, DEFAULT_RATING);

        let outcome = RatingEngine::default().process_batch(&matches, &mut registry);
        assert!(outcome.success);
        assert_eq!(outcome.processed_count, 2);

        // a wins the first match (1530), then plays at a table averaging
        // (1500 * 3 + 1530) / 4 = 1507.5 and finishes last with one game played:
        // 0.998 * (-30 + (1507.5 - 1530) / 40) = -30.501375 -> 1499.50
        assert_eq!(rating_of(&registry, "a"), 1499.5);

        // e wins the second match against the same table average
        // 30 + (1507.5 - 1500) / 40 = 30.1875 -> 1530.19
        assert_eq!(rating_of(&registry, "e"), 1530.19);

        let a = registry.get(&PlayerId::from("a")).unwrap();
        assert_eq!(a.player.games, 2);
        assert_eq!(outcome.player_updates[&a.handle].rating, 1499.5);
        assert_eq!(outcome.player_updates[&a.handle].games, 2);
        assert_eq!(outcome.player_updates.len(), 7);
    }

    #[test]
    fn test_failed_match_does_not_abort_batch() {
        let matches = vec![
            record("2024-03-01 19:00:00", ["a", "b", "c", "d"]),
            record("2024-03-01 20:00:00", ["a", "a", "c", "d"]),
            record("2024-03-01 21:00:00", ["d", "c", "b", "a"]),
        ];
        let (mut registry, _) = build_registry(Vec::new(), &matches, DEFAULT_RATING);

        let outcome = RatingEngine::default().process_batch(&matches, &mut registry);
        assert!(!outcome.success);
        assert_eq!(outcome.processed_count, 2);
        assert_eq!(outcome.failed_count(), 1);
        assert_eq!(outcome.errors[0], "match 2: duplicate player id: a");

        assert_eq!(registry.get(&PlayerId::from("a")).unwrap().player.games, 2);
        assert_eq!(
            outcome.latest_end_time,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 21, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_unresolved_player_labelled() {
        let matches = vec![record("2024-03-01 19:00:00", ["a", "b", "c", "x"])];
        let (mut registry, _) = build_registry(Vec::new(), &matches[..0], DEFAULT_RATING);

        let outcome = RatingEngine::default().process_batch(&matches, &mut registry);
        assert!(!outcome.success);
        assert_eq!(outcome.processed_count, 0);
        assert!(outcome.player_updates.is_empty());
        assert!(outcome.errors[0].starts_with("match 1: player not found: a"));
        assert_eq!(outcome.latest_end_time, None);
    }

    #[test]
    fn test_later_match_overwrites_update() {
        let matches = vec![
            record("2024-03-01 19:00:00", ["a", "b", "c", "d"]),
            record("2024-03-01 20:00:00", ["a", "b", "c", "d"]),
        ];
        let (mut registry, _) = build_registry(Vec::new(), &matches, DEFAULT_RATING);

        let outcome = RatingEngine::default().process_batch(&matches, &mut registry);
        assert_eq!(outcome.player_updates.len(), 4);
        for update in outcome.player_updates.values() {
            assert_eq!(update.games, 2);
        }
    }
}
