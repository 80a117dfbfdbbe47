//! Player, match and watermark storage.
//!
//! The rating engine talks to storage through three narrow traits:
//! - [`PlayerRepository`]: bulk load, append and write back players
//! - [`MatchRepository`]: bulk load the match log
//! - [`WatermarkStore`]: the end time of the last processed match
//!
//! [`sheet::SheetStore`] keeps everything in CSV sheets under the data
//! directory; [`memory::MemoryStore`] keeps it in process.

pub mod memory;
pub mod sheet;
pub mod state;

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{MatchRecord, Player, PlayerUpdate, RowHandle, StoredPlayer};

pub use memory::MemoryStore;
pub use sheet::SheetStore;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Configuration for storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn players_path(&self) -> PathBuf {
        self.data_dir.join("players.csv")
    }

    pub fn matches_path(&self) -> PathBuf {
        self.data_dir.join("matches.csv")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join("state")
    }

    pub fn watermark_path(&self) -> PathBuf {
        self.state_dir().join("watermark.json")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("./data"))
    }
}

/// Source and sink for player records.
pub trait PlayerRepository {
    /// Load every stored player with its write-back handle.
    fn load_players(&self) -> Result<Vec<StoredPlayer>, StorageError>;

    /// Append new players, returning the handle each one was stored under.
    fn add_players(&self, players: &[Player]) -> Result<Vec<RowHandle>, StorageError>;

    /// Write computed updates back to the rows named by their handles.
    fn update_players(
        &self,
        updates: &BTreeMap<RowHandle, PlayerUpdate>,
    ) -> Result<usize, StorageError>;

    /// Replace every stored player, in order.
    fn replace_players(&self, players: &[Player]) -> Result<usize, StorageError>;
}

/// Source of match records.
pub trait MatchRepository {
    /// Load every match row in log order.
    fn load_matches(&self) -> Result<Vec<MatchRecord>, StorageError>;

    /// Append match rows to the log.
    fn append_matches(&self, matches: &[MatchRecord]) -> Result<usize, StorageError>;
}

/// Persistent marker of the last processed match end time.
pub trait WatermarkStore {
    fn get_watermark(&self) -> Result<Option<DateTime<Utc>>, StorageError>;

    fn set_watermark(&self, watermark: DateTime<Utc>) -> Result<(), StorageError>;
}

/// Keep only matches that end strictly after `watermark`, sorted by end time.
///
/// Without a watermark every row is new, including rows whose end time does
/// not parse; those sort first and are left for the validator to reject.
pub fn select_new_matches(
    matches: Vec<MatchRecord>,
    watermark: Option<DateTime<Utc>>,
) -> Vec<MatchRecord> {
    let mut selected: Vec<MatchRecord> = match watermark {
        None => matches,
        Some(mark) => matches
            .into_iter()
            .filter(|m| m.end_instant().is_some_and(|end| end > mark))
            .collect(),
    };
    selected.sort_by_key(|m| m.end_instant());
    selected
}
