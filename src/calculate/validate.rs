//! Structural validation of raw match rows.
//!
//! Every check runs independently and all failures are reported together.
//! Validation never fails hard: malformed input yields a failed [`Validation`].

use std::collections::BTreeSet;

use crate::models::{MatchRecord, PlayerId, Seat, ValidatedMatch, SEATS};
use crate::parse_timestamp;

/// Optional validation rules on top of the structural checks.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationRules {
    /// Reject matches whose scores do not sum to zero
    pub require_zero_sum: bool,

    /// Allowed distance from zero for the score sum
    pub zero_sum_tolerance: f64,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            require_zero_sum: false,
            zero_sum_tolerance: 0.01,
        }
    }
}

/// Result of validating one match row.
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl Validation {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Validate a match row with the structural checks only.
pub fn validate(record: &MatchRecord) -> Validation {
    validate_with(record, &ValidationRules::default())
}

/// Validate a match row.
pub fn validate_with(record: &MatchRecord, rules: &ValidationRules) -> Validation {
    match parse_match(record, rules) {
        Ok(_) => Validation::from_errors(Vec::new()),
        Err(errors) => Validation::from_errors(errors),
    }
}

/// Validate a match row and convert it into typed form.
pub fn parse_match(
    record: &MatchRecord,
    rules: &ValidationRules,
) -> Result<ValidatedMatch, Vec<String>> {
    let mut errors = Vec::new();

    let start_time = parse_timestamp(&record.start_time);
    if start_time.is_none() {
        errors.push(format!("invalid start time: '{}'", record.start_time));
    }

    let end_time = parse_timestamp(&record.end_time);
    if end_time.is_none() {
        errors.push(format!("invalid end time: '{}'", record.end_time));
    }

    let ids: Vec<PlayerId> = record.player_ids().collect();
    let present = ids.iter().filter(|id| !id.is_empty()).count();
    if present != SEATS {
        errors.push(format!("expected {} player ids, found {}", SEATS, present));
    }

    let mut seen = BTreeSet::new();
    let mut duplicates = BTreeSet::new();
    for id in ids.iter().filter(|id| !id.is_empty()) {
        if !seen.insert(id) {
            duplicates.insert(id);
        }
    }
    for id in duplicates {
        errors.push(format!("duplicate player id: {}", id));
    }

    let scores: Vec<Option<f64>> = record.seats.iter().map(|s| parse_score(&s.score)).collect();
    let numeric = scores.iter().filter(|s| s.is_some()).count();
    if numeric != SEATS {
        errors.push(format!("expected {} numeric scores, found {}", SEATS, numeric));
    } else if rules.require_zero_sum {
        let sum: f64 = scores.iter().flatten().sum();
        if sum.abs() > rules.zero_sum_tolerance {
            errors.push(format!("scores sum to {}, expected 0", sum));
        }
    }

    let (Some(start_time), Some(end_time)) = (start_time, end_time) else {
        return Err(errors);
    };
    if !errors.is_empty() {
        return Err(errors);
    }

    let seats = std::array::from_fn(|i| {
        let raw = &record.seats[i];
        let name = raw.player_name.trim();
        Seat {
            player_id: ids[i].clone(),
            player_name: (!name.is_empty()).then(|| name.to_string()),
            score: scores[i].unwrap_or_default(),
            adjusted_score: parse_score(&raw.adjusted_score),
        }
    });

    Ok(ValidatedMatch {
        start_time,
        end_time,
        seats,
    })
}

/// Parse a score cell. Non-finite values are not scores.
pub fn parse_score(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
