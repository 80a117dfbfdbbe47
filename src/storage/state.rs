//! Watermark state file.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::StorageError;

/// Contents of the watermark state file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatermarkState {
    /// End time of the latest match already folded into ratings
    pub watermark: Option<DateTime<Utc>>,

    /// When the watermark was last written
    pub updated_at: Option<DateTime<Utc>>,
}

/// JSON-backed watermark file.
#[derive(Debug, Clone)]
pub struct WatermarkFile {
    path: PathBuf,
}

impl WatermarkFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the state. A missing file is an empty state.
    pub fn read(&self) -> Result<WatermarkState, StorageError> {
        if !self.path.exists() {
            debug!("No watermark file at {:?}", self.path);
            return Ok(WatermarkState::default());
        }

        let contents = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write a new watermark.
    pub fn write(&self, watermark: DateTime<Utc>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let state = WatermarkState {
            watermark: Some(watermark),
            updated_at: Some(Utc::now()),
        };
        fs::write(&self.path, serde_json::to_string_pretty(&state)?)?;

        info!("Watermark advanced to {}", watermark);
        Ok(())
    }
}
