//! CSV sheet storage.
//!
//! Players and matches each live in one CSV sheet with a header row.
//! A player's write-back handle is its zero-based data row index, so rows
//! must not be reordered while a run is in progress.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tracing::{debug, info, warn};

use super::state::WatermarkFile;
use super::{
    MatchRepository, PlayerRepository, StorageConfig, StorageError, WatermarkStore,
};
use crate::models::{
    MatchRecord, Player, PlayerId, PlayerUpdate, RowHandle, StoredPlayer, DEFAULT_RATING, SEATS,
};
use crate::{format_timestamp, parse_timestamp};

/// Header of the player sheet.
pub const PLAYER_HEADERS: [&str; 7] = [
    "id",
    "name",
    "rating",
    "games",
    "last_played",
    "prior_rating",
    "prior_games",
];

/// Header of the match sheet: start, end, then id/name/score/adjusted per seat.
pub fn match_headers() -> Vec<String> {
    let mut headers = vec!["start_time".to_string(), "end_time".to_string()];
    for seat in 1..=SEATS {
        headers.push(format!("seat{}_id", seat));
        headers.push(format!("seat{}_name", seat));
        headers.push(format!("seat{}_score", seat));
        headers.push(format!("seat{}_adjusted", seat));
    }
    headers
}

/// CSV-backed player, match and watermark store.
#[derive(Debug, Clone)]
pub struct SheetStore {
    config: StorageConfig,
    watermark: WatermarkFile,
}

impl SheetStore {
    pub fn new(config: StorageConfig) -> Self {
        let watermark = WatermarkFile::new(config.watermark_path());
        Self { config, watermark }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn read_rows(path: &Path) -> Result<Vec<StringRecord>, StorageError> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?);
        }

        debug!("Read {} rows from {:?}", rows.len(), path);
        Ok(rows)
    }

    fn write_player_rows(&self, rows: &[StringRecord]) -> Result<(), StorageError> {
        let path = self.config.players_path();
        ensure_parent(&path)?;

        let mut writer = WriterBuilder::new().flexible(true).from_path(&path)?;
        writer.write_record(PLAYER_HEADERS)?;
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;

        info!("Wrote {} players to {:?}", rows.len(), path);
        Ok(())
    }

    /// Append rows to a sheet, writing `headers` first if the sheet is new.
    fn append_rows<H, I>(path: &Path, headers: H, rows: I) -> Result<usize, StorageError>
    where
        H: IntoIterator,
        H::Item: AsRef<[u8]>,
        I: IntoIterator<Item = Vec<String>>,
    {
        ensure_parent(path)?;
        let is_new = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
        let needs_terminator = !is_new && !ends_with_newline(path)?;

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        if needs_terminator {
            debug!("Terminating unterminated last row of {:?}", path);
            file.write_all(b"\n")?;
        }
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

        if is_new {
            writer.write_record(headers)?;
        }

        let mut count = 0;
        for row in rows {
            writer.write_record(&row)?;
            count += 1;
        }
        writer.flush()?;

        info!("Appended {} rows to {:?}", count, path);
        Ok(count)
    }
}

fn ensure_parent(path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Whether a non-empty file ends with a line terminator.
fn ends_with_newline(path: &Path) -> Result<bool, StorageError> {
    let mut file = File::open(path)?;
    if file.seek(SeekFrom::End(0))? == 0 {
        return Ok(true);
    }

    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn cell(record: &StringRecord, index: usize) -> &str {
    record.get(index).map(str::trim).unwrap_or("")
}

fn parse_cell<T: std::str::FromStr>(
    record: &StringRecord,
    index: usize,
    row: usize,
    default: T,
) -> Result<T, StorageError> {
    let value = cell(record, index);
    if value.is_empty() {
        return Ok(default);
    }
    value.parse().map_err(|_| StorageError::MalformedRow {
        row,
        reason: format!("invalid {} '{}'", PLAYER_HEADERS[index], value),
    })
}

fn finite(value: f64, index: usize, row: usize) -> Result<f64, StorageError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(StorageError::MalformedRow {
            row,
            reason: format!(
                "{} must be a finite number, found {}",
                PLAYER_HEADERS[index], value
            ),
        })
    }
}

fn parse_player(record: &StringRecord, row: usize) -> Result<Option<Player>, StorageError> {
    let id = PlayerId::new(cell(record, 0));
    if id.is_empty() {
        return Ok(None);
    }

    let rating = finite(parse_cell(record, 2, row, DEFAULT_RATING)?, 2, row)?;
    let games: u32 = parse_cell(record, 3, row, 0)?;
    let prior_rating = finite(parse_cell(record, 5, row, rating)?, 5, row)?;
    let prior_games: u32 = parse_cell(record, 6, row, 0)?;

    let last_played_cell = cell(record, 4);
    let last_played = parse_timestamp(last_played_cell);
    if last_played.is_none() && !last_played_cell.is_empty() {
        warn!(
            "Row {}: ignoring unparsable last_played '{}'",
            row, last_played_cell
        );
    }

    let name = match cell(record, 1) {
        "" => id.as_str().to_string(),
        name => name.to_string(),
    };

    Ok(Some(Player {
        id,
        name,
        rating,
        games,
        last_played,
        prior_rating,
        prior_games,
    }))
}

fn player_cells(player: &Player) -> Vec<String> {
    vec![
        player.id.to_string(),
        player.name.clone(),
        player.rating.to_string(),
        player.games.to_string(),
        player
            .last_played
            .as_ref()
            .map(format_timestamp)
            .unwrap_or_default(),
        player.prior_rating.to_string(),
        player.prior_games.to_string(),
    ]
}

impl PlayerRepository for SheetStore {
    fn load_players(&self) -> Result<Vec<StoredPlayer>, StorageError> {
        let rows = Self::read_rows(&self.config.players_path())?;

        let mut players = Vec::with_capacity(rows.len());
        for (index, record) in rows.iter().enumerate() {
            match parse_player(record, index)? {
                Some(player) => players.push(StoredPlayer {
                    handle: RowHandle::new(index),
                    player,
                }),
                None => warn!("Skipping player row {} with empty id", index),
            }
        }

        Ok(players)
    }

    fn add_players(&self, players: &[Player]) -> Result<Vec<RowHandle>, StorageError> {
        if players.is_empty() {
            return Ok(Vec::new());
        }

        let path = self.config.players_path();
        let existing = Self::read_rows(&path)?.len();

        Self::append_rows(&path, PLAYER_HEADERS, players.iter().map(player_cells))?;

        Ok((existing..existing + players.len())
            .map(RowHandle::new)
            .collect())
    }

    fn update_players(
        &self,
        updates: &BTreeMap<RowHandle, PlayerUpdate>,
    ) -> Result<usize, StorageError> {
        if updates.is_empty() {
            return Ok(0);
        }

        let mut rows = Self::read_rows(&self.config.players_path())?;

        for (handle, update) in updates {
            let row = handle.index();
            let Some(record) = rows.get(row) else {
                return Err(StorageError::MalformedRow {
                    row,
                    reason: format!("no player row for {}", update.id),
                });
            };

            if PlayerId::new(cell(record, 0)) != update.id {
                return Err(StorageError::MalformedRow {
                    row,
                    reason: format!(
                        "expected player {}, found '{}'",
                        update.id,
                        cell(record, 0)
                    ),
                });
            }

            let rating = update.rating.to_string();
            let games = update.games.to_string();
            let last_played = format_timestamp(&update.last_played);
            let replacement = StringRecord::from(vec![
                update.id.as_str(),
                update.name.as_str(),
                rating.as_str(),
                games.as_str(),
                last_played.as_str(),
                cell(record, 5),
                cell(record, 6),
            ]);
            rows[row] = replacement;
        }

        self.write_player_rows(&rows)?;
        Ok(updates.len())
    }

    fn replace_players(&self, players: &[Player]) -> Result<usize, StorageError> {
        let rows: Vec<StringRecord> = players
            .iter()
            .map(|p| StringRecord::from(player_cells(p)))
            .collect();

        self.write_player_rows(&rows)?;
        Ok(rows.len())
    }
}

impl MatchRepository for SheetStore {
    fn load_matches(&self) -> Result<Vec<MatchRecord>, StorageError> {
        let rows = Self::read_rows(&self.config.matches_path())?;

        Ok(rows
            .iter()
            .map(|record| MatchRecord::from_cells(&record.iter().collect::<Vec<_>>()))
            .collect())
    }

    fn append_matches(&self, matches: &[MatchRecord]) -> Result<usize, StorageError> {
        if matches.is_empty() {
            return Ok(0);
        }

        Self::append_rows(
            &self.config.matches_path(),
            match_headers(),
            matches.iter().map(MatchRecord::to_cells),
        )
    }
}

impl WatermarkStore for SheetStore {
    fn get_watermark(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        Ok(self.watermark.read()?.watermark)
    }

    fn set_watermark(&self, watermark: DateTime<Utc>) -> Result<(), StorageError> {
        self.watermark.write(watermark)
    }
}
