//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::calculate::validate::ValidationRules;
use crate::models::{DEFAULT_RATING, SEATS};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Rating formula parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingConfig {
    /// Rating given to newly discovered players
    #[serde(default = "default_initial_rating")]
    pub initial_rating: f64,

    /// Base points per placement, first place first
    #[serde(default = "default_placement_points")]
    pub placement_points: [f64; SEATS],

    /// Divisor applied to (table average - own rating)
    #[serde(default = "default_correction_factor")]
    pub correction_factor: f64,

    /// Game count from which the experience multiplier is pinned to `min_correction`
    #[serde(default = "default_max_correction_games")]
    pub max_correction_games: u32,

    /// Experience multiplier decay per game played
    #[serde(default = "default_games_factor")]
    pub games_factor: f64,

    /// Experience multiplier for veterans
    #[serde(default = "default_min_correction")]
    pub min_correction: f64,
}

fn default_initial_rating() -> f64 {
    DEFAULT_RATING
}

fn default_placement_points() -> [f64; SEATS] {
    [30.0, 10.0, -10.0, -30.0]
}

fn default_correction_factor() -> f64 {
    40.0
}

fn default_max_correction_games() -> u32 {
    300
}

fn default_games_factor() -> f64 {
    0.002
}

fn default_min_correction() -> f64 {
    0.2
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            initial_rating: default_initial_rating(),
            placement_points: default_placement_points(),
            correction_factor: default_correction_factor(),
            max_correction_games: default_max_correction_games(),
            games_factor: default_games_factor(),
            min_correction: default_min_correction(),
        }
    }
}

/// What a run persists when some matches in the batch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialFailurePolicy {
    /// Write nothing and leave the watermark where it was
    #[default]
    PersistNothing,

    /// Write the successful updates and advance the watermark past them
    PersistSuccessful,
}

/// Batch processing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Reject matches whose four scores do not sum to zero
    #[serde(default)]
    pub require_zero_sum: bool,

    /// Allowed distance from zero when `require_zero_sum` is set
    #[serde(default = "default_zero_sum_tolerance")]
    pub zero_sum_tolerance: f64,

    #[serde(default)]
    pub partial_failure: PartialFailurePolicy,
}

fn default_zero_sum_tolerance() -> f64 {
    0.01
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            require_zero_sum: false,
            zero_sum_tolerance: default_zero_sum_tolerance(),
            partial_failure: PartialFailurePolicy::default(),
        }
    }
}

impl BatchConfig {
    /// Validator rules implied by this configuration.
    pub fn validation_rules(&self) -> ValidationRules {
        ValidationRules {
            require_zero_sum: self.require_zero_sum,
            zero_sum_tolerance: self.zero_sum_tolerance,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub rating: RatingConfig,

    #[serde(default)]
    pub batch: BatchConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            rating: RatingConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rating = &self.rating;

        if rating.correction_factor <= 0.0 {
            return Err(ConfigError::ValidationError(
                "Correction factor must be greater than 0".to_string(),
            ));
        }

        if rating
            .placement_points
            .windows(2)
            .any(|pair| pair[0] <= pair[1])
        {
            return Err(ConfigError::ValidationError(
                "Placement points must be strictly decreasing".to_string(),
            ));
        }

        if !(rating.min_correction > 0.0 && rating.min_correction <= 1.0) {
            return Err(ConfigError::ValidationError(
                "Minimum correction must be in (0, 1]".to_string(),
            ));
        }

        if rating.games_factor < 0.0 {
            return Err(ConfigError::ValidationError(
                "Games factor must not be negative".to_string(),
            ));
        }

        let last_decayed = rating.max_correction_games.saturating_sub(1) as f64;
        if rating.games_factor * last_decayed >= 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "Games factor {} drives the experience multiplier to zero before {} games",
                rating.games_factor, rating.max_correction_games
            )));
        }

        if self.batch.zero_sum_tolerance < 0.0 {
            return Err(ConfigError::ValidationError(
                "Zero-sum tolerance must not be negative".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.rating.initial_rating, 1500.0);
        assert_eq!(
            config.batch.partial_failure,
            PartialFailurePolicy::PersistNothing
        );
    }

    #[test]
    fn test_rating_config_default() {
        let rating = RatingConfig::default();

        assert_eq!(rating.placement_points, [30.0, 10.0, -10.0, -30.0]);
        assert_eq!(rating.correction_factor, 40.0);
        assert_eq!(rating.max_correction_games, 300);
        assert_eq!(rating.games_factor, 0.002);
        assert_eq!(rating.min_correction, 0.2);
    }

    #[test]
    fn test_config_validation_ok() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_bad_correction_factor() {
        let mut config = AppConfig::default();
        config.rating.correction_factor = 0.0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_points_not_decreasing() {
        let mut config = AppConfig::default();
        config.rating.placement_points = [30.0, 10.0, 10.0, -30.0];

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_min_correction() {
        let mut config = AppConfig::default();
        config.rating.min_correction = 0.0;
        assert!(config.validate().is_err());

        config.rating.min_correction = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_multiplier_must_stay_positive() {
        let mut config = AppConfig::default();
        config.rating.games_factor = 0.01;
        config.rating.max_correction_games = 300;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        // Exactly reaching zero is rejected too
        config.rating.games_factor = 0.5;
        config.rating.max_correction_games = 3;
        assert!(config.validate().is_err());

        config.rating.max_correction_games = 2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            data_dir = "/srv/league"

            [rating]
            correction_factor = 50.0

            [batch]
            partial_failure = "persist_successful"
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/srv/league"));
        assert_eq!(config.rating.correction_factor, 50.0);
        assert_eq!(config.rating.placement_points, [30.0, 10.0, -10.0, -30.0]);
        assert_eq!(
            config.batch.partial_failure,
            PartialFailurePolicy::PersistSuccessful
        );
        assert!(!config.batch.require_zero_sum);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig::load_or_default(&temp_dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_from_file_rejects_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[rating]\ncorrection_factor = -1.0\n").unwrap();

        assert!(matches!(
            AppConfig::from_file(&path),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();

        // Should be parseable
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.data_dir, parsed.data_dir);
        assert_eq!(config.rating, parsed.rating);
    }
}
