//! Standings table and reporting-period rollover.

use std::cmp::Ordering;

use serde::Serialize;

use crate::models::{Player, PlayerId};

/// One line of the standings table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Standing {
    /// One-based position; tied ratings share a position
    pub position: usize,
    pub id: PlayerId,
    pub name: String,
    pub rating: f64,
    pub games: u32,

    /// Rating change since the start of the reporting period
    pub period_change: f64,

    /// Games played since the start of the reporting period
    pub period_games: u32,
}

/// Rank players by rating, highest first. Ties are ordered by id.
pub fn standings(players: &[Player]) -> Vec<Standing> {
    let mut sorted: Vec<&Player> = players.iter().collect();
    sorted.sort_by(|a, b| {
        b.rating
            .partial_cmp(&a.rating)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut table: Vec<Standing> = Vec::with_capacity(sorted.len());
    for (index, player) in sorted.into_iter().enumerate() {
        let position = match table.last() {
            Some(prev) if prev.rating == player.rating => prev.position,
            _ => index + 1,
        };

        table.push(Standing {
            position,
            id: player.id.clone(),
            name: player.name.clone(),
            rating: player.rating,
            games: player.games,
            period_change: crate::calculate::round_rating(player.rating - player.prior_rating),
            period_games: player.games.saturating_sub(player.prior_games),
        });
    }

    table
}

/// Start a new reporting period: current rating and games become the prior pair.
///
/// Returns the number of players whose snapshot changed.
pub fn rollover(players: &mut [Player]) -> usize {
    let mut changed = 0;
    for player in players.iter_mut() {
        if player.prior_rating != player.rating || player.prior_games != player.games {
            changed += 1;
        }
        player.prior_rating = player.rating;
        player.prior_games = player.games;
    }
    changed
}
