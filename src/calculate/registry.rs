//! In-memory player registry.
//!
//! The registry maps player identifiers to their current state and the
//! handle used to write them back. It is owned by a single batch run.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::models::{
    MatchRecord, NewPlayer, Player, PlayerId, PlayerUpdate, RowHandle, StoredPlayer,
};

/// A registry entry.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub handle: RowHandle,
    pub player: Player,
}

/// Player registry for one batch run.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: HashMap<PlayerId, RegistryEntry>,
    next_handle: RowHandle,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from repository rows.
    ///
    /// A later row with the same id replaces an earlier one.
    pub fn from_stored(players: impl IntoIterator<Item = StoredPlayer>) -> Self {
        let mut registry = Self::new();
        for stored in players {
            if let Some(earlier) = registry.get(&stored.player.id) {
                warn!(
                    "Duplicate player {} at {}; ignoring the row at {}",
                    stored.player.id, stored.handle, earlier.handle
                );
            }
            registry.insert(stored.handle, stored.player);
        }
        registry
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &PlayerId) -> Option<&RegistryEntry> {
        self.entries.get(id)
    }

    /// First handle not yet used by any entry.
    pub fn next_handle(&self) -> RowHandle {
        self.next_handle
    }

    /// Insert a player under a known handle.
    pub fn insert(&mut self, handle: RowHandle, player: Player) {
        if handle >= self.next_handle {
            self.next_handle = handle.next();
        }
        self.entries
            .insert(player.id.clone(), RegistryEntry { handle, player });
    }

    /// Insert a player under a fresh handle and return it.
    pub fn insert_new(&mut self, player: Player) -> RowHandle {
        let handle = self.next_handle;
        self.insert(handle, player);
        handle
    }

    /// Fold an update into the live registry.
    ///
    /// Returns false if the player is unknown.
    pub fn apply(&mut self, update: &PlayerUpdate) -> bool {
        match self.entries.get_mut(&update.id) {
            Some(entry) => {
                entry.player.apply(update);
                true
            }
            None => false,
        }
    }

    /// Players in handle order.
    pub fn into_players(self) -> Vec<Player> {
        let mut entries: Vec<RegistryEntry> = self.entries.into_values().collect();
        entries.sort_by_key(|e| e.handle);
        entries.into_iter().map(|e| e.player).collect()
    }
}

/// Find seat identifiers that the registry does not know yet.
///
/// Players are returned in order of first appearance. The name comes from
/// the first row that records a non-empty name for the id, falling back to
/// the id itself.
pub fn discover_new_players(matches: &[MatchRecord], registry: &Registry) -> Vec<NewPlayer> {
    let mut order: Vec<PlayerId> = Vec::new();
    let mut names: HashMap<PlayerId, String> = HashMap::new();
    let mut seen: HashSet<PlayerId> = HashSet::new();

    for record in matches {
        for seat in &record.seats {
            let id = PlayerId::new(&seat.player_id);
            if id.is_empty() || registry.contains(&id) {
                continue;
            }

            if seen.insert(id.clone()) {
                order.push(id.clone());
            }

            let name = seat.player_name.trim();
            if !name.is_empty() {
                names.entry(id).or_insert_with(|| name.to_string());
            }
        }
    }

    order
        .into_iter()
        .map(|id| {
            let name = names
                .remove(&id)
                .unwrap_or_else(|| id.as_str().to_string());
            NewPlayer { id, name }
        })
        .collect()
}

/// Build a registry from existing players plus every player discovered in `matches`.
///
/// Discovered players get fresh handles after the existing ones and are
/// returned alongside the registry so the caller can persist them.
pub fn build_registry(
    existing: impl IntoIterator<Item = StoredPlayer>,
    matches: &[MatchRecord],
    initial_rating: f64,
) -> (Registry, Vec<StoredPlayer>) {
    let mut registry = Registry::from_stored(existing);
    let discovered = discover_new_players(matches, &registry);

    let mut added = Vec::with_capacity(discovered.len());
    for new_player in discovered {
        let player = new_player.into_player(initial_rating);
        let handle = registry.insert_new(player.clone());
        debug!("Registered new player {} at {}", player.id, handle);
        added.push(StoredPlayer { handle, player });
    }

    (registry, added)
}
