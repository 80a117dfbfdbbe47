//! Rating sync orchestrator.
//!
//! Runs one complete pass over the match log:
//! 1. Select matches that ended after the stored watermark
//! 2. Register players seen for the first time
//! 3. Replay the new matches through the rating engine
//! 4. Write player updates and advance the watermark

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::calculate::{build_registry, RatingEngine};
use crate::config::{AppConfig, PartialFailurePolicy};
use crate::models::Player;
use crate::storage::{
    select_new_matches, MatchRepository, PlayerRepository, StorageError, WatermarkStore,
};

/// Errors that abort a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result of a sync run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Matches newer than the watermark
    pub new_matches: usize,

    /// Players registered during this run
    pub new_players: usize,

    /// Matches that produced updates
    pub processed: usize,

    /// Distinct players with updated ratings
    pub updated_players: usize,

    /// Per-match errors
    pub errors: Vec<String>,

    /// Watermark after the run
    pub watermark: Option<DateTime<Utc>>,

    /// Whether updates were written
    pub persisted: bool,

    pub duration: Duration,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A problem found while checking the match log.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchIssue {
    /// One-based row in the match log
    pub row: usize,
    pub errors: Vec<String>,
}

/// Sync orchestrator.
pub struct RatingSync<'a> {
    players: &'a dyn PlayerRepository,
    matches: &'a dyn MatchRepository,
    watermark: &'a dyn WatermarkStore,
    engine: RatingEngine,
    policy: PartialFailurePolicy,
}

impl<'a> RatingSync<'a> {
    /// Create a new orchestrator over explicit collaborators.
    pub fn new(
        players: &'a dyn PlayerRepository,
        matches: &'a dyn MatchRepository,
        watermark: &'a dyn WatermarkStore,
        engine: RatingEngine,
        policy: PartialFailurePolicy,
    ) -> Self {
        Self {
            players,
            matches,
            watermark,
            engine,
            policy,
        }
    }

    /// Create an orchestrator over one store that provides all three collaborators.
    pub fn from_store<S>(store: &'a S, config: &AppConfig) -> Self
    where
        S: PlayerRepository + MatchRepository + WatermarkStore,
    {
        let engine = RatingEngine::new(config.rating.clone(), config.batch.validation_rules());
        Self::new(store, store, store, engine, config.batch.partial_failure)
    }

    pub fn engine(&self) -> &RatingEngine {
        &self.engine
    }

    /// Run a single sync pass.
    ///
    /// Storage failures abort the run. Bad matches do not: they are reported
    /// in the returned [`RunReport`], and the partial-failure policy decides
    /// whether the successful part is written.
    pub fn run(&self, dry_run: bool) -> Result<RunReport, SyncError> {
        let start = Instant::now();
        info!("Starting rating sync{}", if dry_run { " (dry run)" } else { "" });

        let watermark = self.watermark.get_watermark()?;
        let all_matches = self.matches.load_matches()?;
        let total = all_matches.len();
        let new_matches = select_new_matches(all_matches, watermark);

        match watermark {
            Some(mark) => info!(
                "{} of {} matches ended after {}",
                new_matches.len(),
                total,
                mark
            ),
            None => info!("No watermark stored; treating all {} matches as new", total),
        }

        let existing = self.players.load_players()?;
        let (mut registry, added) = build_registry(
            existing,
            &new_matches,
            self.engine.config().initial_rating,
        );

        if !added.is_empty() {
            info!("Discovered {} new players", added.len());
            if !dry_run {
                let players: Vec<Player> = added.iter().map(|s| s.player.clone()).collect();
                let handles = self.players.add_players(&players)?;
                for (handle, player) in handles.into_iter().zip(players) {
                    registry.insert(handle, player);
                }
            }
        }

        let batch = self.engine.process_batch(&new_matches, &mut registry);

        let persist = batch.success || self.policy == PartialFailurePolicy::PersistSuccessful;
        let mut next_watermark = watermark;
        let mut persisted = false;

        if dry_run {
            info!("Dry run: no updates written");
        } else if persist {
            self.players.update_players(&batch.player_updates)?;

            let candidate = match batch.latest_end_time {
                Some(end) => Some(end),
                None if batch.success => Some(Utc::now()),
                None => None,
            };
            if let Some(candidate) = candidate {
                if watermark.map_or(true, |mark| candidate > mark) {
                    self.watermark.set_watermark(candidate)?;
                    next_watermark = Some(candidate);
                }
            }
            persisted = true;
        } else {
            warn!(
                "{} of {} matches failed; nothing written and watermark unchanged",
                batch.failed_count(),
                new_matches.len()
            );
        }

        let report = RunReport {
            new_matches: new_matches.len(),
            new_players: added.len(),
            processed: batch.processed_count,
            updated_players: batch.player_updates.len(),
            errors: batch.errors,
            watermark: next_watermark,
            persisted,
            duration: start.elapsed(),
        };

        info!(
            "Sync completed: {} matches, {} new players, {} ratings updated in {:?}",
            report.processed, report.new_players, report.updated_players, report.duration
        );

        Ok(report)
    }

    /// Validate every row of the match log without changing anything.
    pub fn check_matches(&self) -> Result<Vec<MatchIssue>, SyncError> {
        let matches = self.matches.load_matches()?;

        Ok(matches
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                let validation = self.engine.validate(record);
                (!validation.valid).then(|| MatchIssue {
                    row: index + 1,
                    errors: validation.errors,
                })
            })
            .collect())
    }
}
