//! Match log models.
//!
//! A match is recorded as one row: start and end time followed by four seats.
//! Seat order is finishing order, so seat 0 is always first place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PlayerId;

/// Players per match.
pub const SEATS: usize = 4;

/// Finishing position within a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Placement {
    First,
    Second,
    Third,
    Fourth,
}

impl Placement {
    pub const ALL: [Placement; SEATS] = [
        Placement::First,
        Placement::Second,
        Placement::Third,
        Placement::Fourth,
    ];

    /// Placement for a zero-based seat index.
    pub fn from_seat(seat: usize) -> Option<Self> {
        Self::ALL.get(seat).copied()
    }

    /// Zero-based index (First = 0).
    pub fn index(&self) -> usize {
        match self {
            Placement::First => 0,
            Placement::Second => 1,
            Placement::Third => 2,
            Placement::Fourth => 3,
        }
    }

    /// One-based rank (First = 1).
    pub fn rank(&self) -> u8 {
        self.index() as u8 + 1
    }
}

impl std::fmt::Display for Placement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Placement::First => write!(f, "1st"),
            Placement::Second => write!(f, "2nd"),
            Placement::Third => write!(f, "3rd"),
            Placement::Fourth => write!(f, "4th"),
        }
    }
}

/// One seat of a match row, exactly as read from the log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSeat {
    pub player_id: String,
    pub player_name: String,
    pub score: String,
    pub adjusted_score: String,
}

impl RawSeat {
    pub fn new(
        player_id: impl Into<String>,
        player_name: impl Into<String>,
        score: impl Into<String>,
    ) -> Self {
        Self {
            player_id: player_id.into(),
            player_name: player_name.into(),
            score: score.into(),
            adjusted_score: String::new(),
        }
    }
}

/// A match row as read from the log.
///
/// Nothing here is trusted until it has been through the validator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub start_time: String,
    pub end_time: String,
    pub seats: [RawSeat; SEATS],
}

impl MatchRecord {
    /// Number of cells in a stored match row.
    pub const COLUMNS: usize = 2 + SEATS * 4;

    pub fn new(
        start_time: impl Into<String>,
        end_time: impl Into<String>,
        seats: [RawSeat; SEATS],
    ) -> Self {
        Self {
            start_time: start_time.into(),
            end_time: end_time.into(),
            seats,
        }
    }

    /// Build a record from row cells. Missing trailing cells read as empty.
    pub fn from_cells<S: AsRef<str>>(cells: &[S]) -> Self {
        let cell = |i: usize| {
            cells
                .get(i)
                .map(|c| c.as_ref().trim().to_string())
                .unwrap_or_default()
        };
        let seat = |n: usize| {
            let base = 2 + n * 4;
            RawSeat {
                player_id: cell(base),
                player_name: cell(base + 1),
                score: cell(base + 2),
                adjusted_score: cell(base + 3),
            }
        };

        Self {
            start_time: cell(0),
            end_time: cell(1),
            seats: [seat(0), seat(1), seat(2), seat(3)],
        }
    }

    /// Flatten into row cells in storage order.
    pub fn to_cells(&self) -> Vec<String> {
        let mut cells = Vec::with_capacity(Self::COLUMNS);
        cells.push(self.start_time.clone());
        cells.push(self.end_time.clone());
        for seat in &self.seats {
            cells.push(seat.player_id.clone());
            cells.push(seat.player_name.clone());
            cells.push(seat.score.clone());
            cells.push(seat.adjusted_score.clone());
        }
        cells
    }

    /// End time, if it parses.
    pub fn end_instant(&self) -> Option<DateTime<Utc>> {
        crate::parse_timestamp(&self.end_time)
    }

    /// Seat identifiers, trimmed.
    pub fn player_ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.seats.iter().map(|s| PlayerId::new(&s.player_id))
    }
}

/// A validated seat.
#[derive(Debug, Clone, PartialEq)]
pub struct Seat {
    pub player_id: PlayerId,

    /// Name recorded on the match row, if any
    pub player_name: Option<String>,

    pub score: f64,

    /// Adjusted score column; carried through but not used for rating
    pub adjusted_score: Option<f64>,
}

/// A match that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedMatch {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub seats: [Seat; SEATS],
}

impl ValidatedMatch {
    /// Seats paired with their placement, first place first.
    pub fn placements(&self) -> impl Iterator<Item = (Placement, &Seat)> {
        Placement::ALL.into_iter().zip(self.seats.iter())
    }

    pub fn score_sum(&self) -> f64 {
        self.seats.iter().map(|s| s.score).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_from_seat() {
        assert_eq!(Placement::from_seat(0), Some(Placement::First));
        assert_eq!(Placement::from_seat(3), Some(Placement::Fourth));
        assert_eq!(Placement::from_seat(4), None);
        assert_eq!(Placement::Third.rank(), 3);
        assert_eq!(Placement::Second.to_string(), "2nd");
    }

    #[test]
    fn test_from_cells_pads_short_rows() {
        let record = MatchRecord::from_cells(&[
            "2024-01-01 10:00:00",
            "2024-01-01 11:00:00",
            " p1 ",
            "Alice",
            "35000",
        ]);

        assert_eq!(record.start_time, "2024-01-01 10:00:00");
        assert_eq!(record.seats[0].player_id, "p1");
        assert_eq!(record.seats[0].score, "35000");
        assert_eq!(record.seats[0].adjusted_score, "");
        assert_eq!(record.seats[3], RawSeat::default());
    }

    #[test]
    fn test_cells_layout() {
        let record = MatchRecord::new(
            "s",
            "e",
            [
                RawSeat::new("a", "A", "1"),
                RawSeat::new("b", "B", "2"),
                RawSeat::new("c", "C", "3"),
                RawSeat::new("d", "D", "4"),
            ],
        );
        let cells = record.to_cells();

        assert_eq!(cells.len(), MatchRecord::COLUMNS);
        assert_eq!(cells.len(), 18);
        assert_eq!(cells[2], "a");
        assert_eq!(cells[14], "d");
        assert_eq!(cells[16], "4");
        assert_eq!(MatchRecord::from_cells(&cells), record);
    }
}
