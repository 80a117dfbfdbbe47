//! # Table Rating
//!
//! Incremental rating engine for four-player score-based games whose match
//! log and player list live in spreadsheet-style tables.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (players, match rows, placements)
//! - **calculate**: Rating formula, validation, match and batch processing
//! - **storage**: Player/match/watermark repositories (CSV sheets, in-memory)
//! - **sync**: One complete rating run over the new part of the match log
//! - **standings**: Ranking tables and reporting-period rollover
//! - **generate**: Sample match generation
//! - **config**: Configuration loading and validation

pub mod calculate;
pub mod config;
pub mod generate;
pub mod models;
pub mod standings;
pub mod storage;
pub mod sync;

pub use models::*;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Naive formats accepted in timestamp cells, interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
];

/// Parse a timestamp cell (e.g., "2024-03-01T18:30:00Z", "2024-03-01 18:30:00", "2024-03-01").
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Format a timestamp the way it is written back to storage.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)
}
