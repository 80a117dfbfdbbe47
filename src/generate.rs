//! Sample match generation.
//!
//! Produces plausible match rows from an existing player pool: four
//! distinct players per match, scores in multiples of 100 that sum to zero,
//! seats ordered by score so that seat order is finishing order.

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use crate::models::{MatchRecord, Player, RawSeat, SEATS};

/// Bonus added to the adjusted score per placement, first place first.
const UMA: [f64; SEATS] = [20.0, 10.0, -10.0, -20.0];

/// Errors that can occur during generation.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Need at least {needed} players to generate matches, found {found}")]
    NotEnoughPlayers { needed: usize, found: usize },
}

/// Timing of generated matches.
#[derive(Debug, Clone)]
pub struct Schedule {
    /// Start time of the first match
    pub start: DateTime<Utc>,

    /// Time between consecutive match starts
    pub spacing: Duration,

    /// Match length
    pub length: Duration,
}

impl Schedule {
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            start,
            spacing: Duration::minutes(120),
            length: Duration::minutes(90),
        }
    }
}

/// Generate `count` matches between players drawn from `players`.
pub fn generate_matches<R: Rng + ?Sized>(
    players: &[Player],
    count: usize,
    schedule: &Schedule,
    rng: &mut R,
) -> Result<Vec<MatchRecord>, GenerateError> {
    if players.len() < SEATS {
        return Err(GenerateError::NotEnoughPlayers {
            needed: SEATS,
            found: players.len(),
        });
    }

    let mut pool: Vec<&Player> = players.iter().collect();
    let mut matches = Vec::with_capacity(count);

    for i in 0..count {
        pool.shuffle(rng);
        let scores = zero_sum_scores(rng);

        let start = schedule.start + schedule.spacing * i as i32;
        let end = start + schedule.length;

        let seats = std::array::from_fn(|seat| {
            let player = pool[seat];
            RawSeat {
                player_id: player.id.to_string(),
                player_name: player.name.clone(),
                score: format!("{}", scores[seat]),
                adjusted_score: format!("{:.1}", scores[seat] as f64 / 1000.0 + UMA[seat]),
            }
        });

        matches.push(MatchRecord::new(
            start.format("%Y-%m-%d %H:%M:%S").to_string(),
            end.format("%Y-%m-%d %H:%M:%S").to_string(),
            seats,
        ));
    }

    Ok(matches)
}

/// Four scores in multiples of 100 summing to zero, highest first.
fn zero_sum_scores<R: Rng + ?Sized>(rng: &mut R) -> [i64; SEATS] {
    let mut scores = [0i64; SEATS];
    for score in scores.iter_mut().take(SEATS - 1) {
        *score = rng.random_range(-300..=500) * 100;
    }
    scores[SEATS - 1] = -scores[..SEATS - 1].iter().sum::<i64>();
    scores.sort_unstable_by(|a, b| b.cmp(a));
    scores
}
