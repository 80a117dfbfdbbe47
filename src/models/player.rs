//! Player model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PlayerId, RowHandle};

/// Rating assigned to a player that has never been rated.
pub const DEFAULT_RATING: f64 = 1500.0;

/// A rated player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,

    /// Display name
    pub name: String,

    /// Current rating
    pub rating: f64,

    /// Number of rated matches played
    pub games: u32,

    /// End time of the last rated match
    pub last_played: Option<DateTime<Utc>>,

    /// Rating at the start of the current reporting period
    pub prior_rating: f64,

    /// Games at the start of the current reporting period
    pub prior_games: u32,
}

impl Player {
    /// Create a never-rated player with the default rating.
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self::with_rating(id, name, DEFAULT_RATING)
    }

    /// Create a never-rated player starting from `rating`.
    pub fn with_rating(id: PlayerId, name: impl Into<String>, rating: f64) -> Self {
        Self {
            id,
            name: name.into(),
            rating,
            games: 0,
            last_played: None,
            prior_rating: rating,
            prior_games: 0,
        }
    }

    /// Fold a computed update into this player.
    ///
    /// The prior-period pair is left alone.
    pub fn apply(&mut self, update: &PlayerUpdate) {
        self.name = update.name.clone();
        self.rating = update.rating;
        self.games = update.games;
        self.last_played = Some(update.last_played);
    }
}

/// A player as loaded from a repository, tagged with its write-back handle.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPlayer {
    pub handle: RowHandle,
    pub player: Player,
}

/// A player seen in the match log but not yet known to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlayer {
    pub id: PlayerId,
    pub name: String,
}

impl NewPlayer {
    /// Materialize as an unrated player.
    pub fn into_player(self, initial_rating: f64) -> Player {
        Player::with_rating(self.id, self.name, initial_rating)
    }
}

/// A player's state after one rated match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerUpdate {
    pub id: PlayerId,
    pub name: String,
    pub rating: f64,
    pub games: u32,
    pub last_played: DateTime<Utc>,

    /// Rating change that produced `rating`
    pub delta: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_player_defaults() {
        let p = Player::new(PlayerId::from("p1"), "Alice");
        assert_eq!(p.rating, DEFAULT_RATING);
        assert_eq!(p.games, 0);
        assert!(p.last_played.is_none());
        assert_eq!(p.prior_rating, DEFAULT_RATING);
        assert_eq!(p.prior_games, 0);
    }

    #[test]
    fn test_apply_keeps_prior_period() {
        let mut p = Player::new(PlayerId::from("p1"), "Alice");
        p.prior_rating = 1480.0;
        p.prior_games = 7;

        let end = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        p.apply(&PlayerUpdate {
            id: PlayerId::from("p1"),
            name: "Alice B.".to_string(),
            rating: 1530.25,
            games: 1,
            last_played: end,
            delta: 30.25,
        });

        assert_eq!(p.name, "Alice B.");
        assert_eq!(p.rating, 1530.25);
        assert_eq!(p.games, 1);
        assert_eq!(p.last_played, Some(end));
        assert_eq!(p.prior_rating, 1480.0);
        assert_eq!(p.prior_games, 7);
    }

    #[test]
    fn test_new_player_into_player() {
        let p = NewPlayer {
            id: PlayerId::from("p9"),
            name: "Nine".to_string(),
        }
        .into_player(1400.0);

        assert_eq!(p.rating, 1400.0);
        assert_eq!(p.prior_rating, 1400.0);
        assert_eq!(p.name, "Nine");
    }
}
