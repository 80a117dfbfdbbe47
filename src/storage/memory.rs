//! In-process storage.
//!
//! Same semantics as the CSV sheets without touching the filesystem. Writes
//! can be made to fail on demand to exercise repository error paths.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::{MatchRepository, PlayerRepository, StorageError, WatermarkStore};
use crate::models::{MatchRecord, Player, PlayerUpdate, RowHandle, StoredPlayer};

/// In-memory player, match and watermark store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    players: RefCell<Vec<Player>>,
    matches: RefCell<Vec<MatchRecord>>,
    watermark: Cell<Option<DateTime<Utc>>>,
    fail_writes: Cell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_players(players: Vec<Player>) -> Self {
        let store = Self::new();
        *store.players.borrow_mut() = players;
        store
    }

    pub fn with_matches(self, matches: Vec<MatchRecord>) -> Self {
        *self.matches.borrow_mut() = matches;
        self
    }

    /// Make every subsequent write fail with [`StorageError::Unavailable`].
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// Snapshot of the stored players.
    pub fn players(&self) -> Vec<Player> {
        self.players.borrow().clone()
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.get() {
            Err(StorageError::Unavailable("writes disabled".to_string()))
        } else {
            Ok(())
        }
    }
}

impl PlayerRepository for MemoryStore {
    fn load_players(&self) -> Result<Vec<StoredPlayer>, StorageError> {
        Ok(self
            .players
            .borrow()
            .iter()
            .enumerate()
            .map(|(i, player)| StoredPlayer {
                handle: RowHandle::new(i),
                player: player.clone(),
            })
            .collect())
    }

    fn add_players(&self, players: &[Player]) -> Result<Vec<RowHandle>, StorageError> {
        self.check_writable()?;

        let mut stored = self.players.borrow_mut();
        let start = stored.len();
        stored.extend_from_slice(players);

        Ok((start..stored.len()).map(RowHandle::new).collect())
    }

    fn update_players(
        &self,
        updates: &BTreeMap<RowHandle, PlayerUpdate>,
    ) -> Result<usize, StorageError> {
        self.check_writable()?;

        let mut stored = self.players.borrow_mut();
        for (handle, update) in updates {
            let row = handle.index();
            match stored.get_mut(row) {
                Some(player) if player.id == update.id => player.apply(update),
                _ => {
                    return Err(StorageError::MalformedRow {
                        row,
                        reason: format!("no player row for {}", update.id),
                    })
                }
            }
        }

        Ok(updates.len())
    }

    fn replace_players(&self, players: &[Player]) -> Result<usize, StorageError> {
        self.check_writable()?;

        *self.players.borrow_mut() = players.to_vec();
        Ok(players.len())
    }
}

impl MatchRepository for MemoryStore {
    fn load_matches(&self) -> Result<Vec<MatchRecord>, StorageError> {
        Ok(self.matches.borrow().clone())
    }

    fn append_matches(&self, matches: &[MatchRecord]) -> Result<usize, StorageError> {
        self.check_writable()?;

        self.matches.borrow_mut().extend_from_slice(matches);
        Ok(matches.len())
    }
}

impl WatermarkStore for MemoryStore {
    fn get_watermark(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        Ok(self.watermark.get())
    }

    fn set_watermark(&self, watermark: DateTime<Utc>) -> Result<(), StorageError> {
        self.check_writable()?;

        self.watermark.set(Some(watermark));
        Ok(())
    }
}
