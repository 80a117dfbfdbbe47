//! Rating calculation engine.
//!
//! Turns validated match results into rating updates:
//! - Per-seat rating deltas from placement, table strength and experience
//! - Match validation
//! - Single-match and batch processing against a player registry
//! - Registry construction and new player discovery

pub mod batch;
pub mod process;
pub mod registry;
pub mod validate;

pub use batch::BatchOutcome;
pub use process::MatchOutcome;
pub use registry::{build_registry, discover_new_players, Registry};
pub use validate::{validate, Validation, ValidationRules};

use crate::config::RatingConfig;
use crate::models::{MatchRecord, Placement};

/// Experience multiplier for a player with `games` rated matches.
///
/// Decays linearly from 1.0 and drops to `min_correction` once
/// `max_correction_games` is reached.
pub fn games_correction(games: u32, config: &RatingConfig) -> f64 {
    if games < config.max_correction_games {
        1.0 - games as f64 * config.games_factor
    } else {
        config.min_correction
    }
}

/// Rating change for one seat of a match.
///
/// `table_avg` is the mean rating of all four seated players, taken before
/// any of them is updated.
pub fn rating_change(
    rating: f64,
    games: u32,
    placement: Placement,
    table_avg: f64,
    config: &RatingConfig,
) -> f64 {
    let placement_point = config.placement_points[placement.index()];
    let avg_correction = (table_avg - rating) / config.correction_factor;

    games_correction(games, config) * (placement_point + avg_correction)
}

/// Round a rating to two decimals, halves away from zero.
pub fn round_rating(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Mean of a set of ratings. Zero for an empty set.
pub fn table_average(ratings: &[f64]) -> f64 {
    if ratings.is_empty() {
        0.0
    } else {
        ratings.iter().sum::<f64>() / ratings.len() as f64
    }
}

/// Rating engine: formula parameters plus validation rules.
#[derive(Debug, Clone, Default)]
pub struct RatingEngine {
    config: RatingConfig,
    rules: ValidationRules,
}

impl RatingEngine {
    pub fn new(config: RatingConfig, rules: ValidationRules) -> Self {
        Self { config, rules }
    }

    pub fn config(&self) -> &RatingConfig {
        &self.config
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    /// Validate a raw match row under this engine's rules.
    pub fn validate(&self, record: &MatchRecord) -> Validation {
        validate::validate_with(record, &self.rules)
    }
}
