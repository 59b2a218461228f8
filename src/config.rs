// SPDX-License-Identifier: GPL-3.0-only

use crate::constants::{ColorMode, FilterMode, recording};
use crate::pipelines::photo::EncodingQuality;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Config file name inside the application config directory
const CONFIG_FILE: &str = "config.json";

/// Recording pacing settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Nominal recording rate when every frame is kept
    pub base_fps: u32,
    /// Lowest rate used when a filter halves the stream
    pub min_filtered_fps: u32,
    /// Maximum duplicates written to fill a single gap
    pub max_gap_fill: u32,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            base_fps: recording::DEFAULT_BASE_FPS,
            min_filtered_fps: recording::DEFAULT_MIN_FILTERED_FPS,
            max_gap_fill: recording::DEFAULT_MAX_GAP_FILL,
        }
    }
}

impl RecordingConfig {
    /// Recording rate for the given filter
    ///
    /// Filtering keeps every other frame of an alternating stream, so the
    /// nominal rate is halved (never below `min_filtered_fps`).
    pub fn fps_for(&self, filter: FilterMode) -> u32 {
        let base = self.base_fps.max(1);
        match filter {
            FilterMode::Off => base,
            FilterMode::Raw | FilterMode::Illum => (base / 2).max(self.min_filtered_fps).max(1),
        }
    }
}

/// Illumination classifier tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Smallest luma difference (8-bit scale) that counts as a brightness step
    pub min_threshold: f32,
    /// Step threshold as a fraction of the smoothed step magnitude
    pub relative_threshold: f32,
    /// Weight of the newest step in the smoothed magnitude (0..=1)
    pub smoothing: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_threshold: 4.0,
            relative_threshold: 0.25,
            smoothing: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Photo directory override (defaults to Pictures/IR Camera)
    pub photo_dir: Option<PathBuf>,
    /// Video directory override (defaults to Videos/IR Camera)
    pub video_dir: Option<PathBuf>,
    /// Filter mode at startup
    pub filter_mode: FilterMode,
    /// Color mode at startup
    pub color_mode: ColorMode,
    /// Last used device id
    pub last_device_id: Option<String>,
    /// JPEG quality for snapshots
    pub photo_quality: EncodingQuality,
    pub recording: RecordingConfig,
    pub classifier: ClassifierConfig,
    /// Frames buffered between the source and the pipeline; new frames
    /// are dropped at the source when full
    pub frame_queue_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            photo_dir: None,
            video_dir: None,
            filter_mode: FilterMode::default(),
            color_mode: ColorMode::default(),
            last_device_id: None,
            photo_quality: EncodingQuality::default(),
            recording: RecordingConfig::default(),
            classifier: ClassifierConfig::default(),
            frame_queue_depth: 2,
        }
    }
}

impl Config {
    /// Default config file location (`<config_dir>/ircam/config.json`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(env!("CARGO_PKG_NAME")).join(CONFIG_FILE))
    }

    /// Load the config from its default location
    ///
    /// Missing or unreadable files yield the defaults.
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                warn!("No config directory available, using defaults");
                Self::default()
            }
        }
    }

    /// Load the config from `path`, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Self::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read config, using defaults");
                return Self::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Invalid config, using defaults");
                Self::default()
            }
        }
    }

    /// Save the config to its default location
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::default_path().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no config directory")
        })?;
        self.save_to(&path)
    }

    /// Save the config as pretty JSON, creating parent directories
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "Config saved");
        Ok(())
    }
}
