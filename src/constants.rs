// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants and mode enums

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which illumination class of frames reaches preview and recording
///
/// IR cameras alternate between frames captured with the emitter LED off
/// (raw ambient IR) and on (illuminated).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterMode {
    /// Pass every frame
    #[default]
    Off,
    /// Pass only LED-off frames
    Raw,
    /// Pass only LED-on frames
    Illum,
}

impl FilterMode {
    pub const ALL: [FilterMode; 3] = [FilterMode::Off, FilterMode::Raw, FilterMode::Illum];

    /// Next mode in button order, wrapping around
    pub fn next(self) -> Self {
        match self {
            FilterMode::Off => FilterMode::Raw,
            FilterMode::Raw => FilterMode::Illum,
            FilterMode::Illum => FilterMode::Off,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            FilterMode::Off => "OFF",
            FilterMode::Raw => "RAW",
            FilterMode::Illum => "ILLUM",
        }
    }
}

impl std::fmt::Display for FilterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl std::str::FromStr for FilterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OFF" | "NONE" => Ok(FilterMode::Off),
            "RAW" => Ok(FilterMode::Raw),
            "ILLUM" | "ILLUMINATED" => Ok(FilterMode::Illum),
            other => Err(format!("unknown filter mode '{}'", other)),
        }
    }
}

/// Color transform applied to frames before display and recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColorMode {
    /// Grayscale
    #[default]
    Off,
    /// Night-vision green
    Green,
    /// Black → red → yellow → white
    Heat,
    /// Blue → cyan → green → yellow → red
    Jet,
}

impl ColorMode {
    pub const ALL: [ColorMode; 4] = [
        ColorMode::Off,
        ColorMode::Green,
        ColorMode::Heat,
        ColorMode::Jet,
    ];

    /// Next mode in button order, wrapping around
    pub fn next(self) -> Self {
        match self {
            ColorMode::Off => ColorMode::Green,
            ColorMode::Green => ColorMode::Heat,
            ColorMode::Heat => ColorMode::Jet,
            ColorMode::Jet => ColorMode::Off,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ColorMode::Off => "OFF",
            ColorMode::Green => "GREEN",
            ColorMode::Heat => "HEAT",
            ColorMode::Jet => "JET",
        }
    }
}

impl std::fmt::Display for ColorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl std::str::FromStr for ColorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OFF" | "NONE" | "GRAY" => Ok(ColorMode::Off),
            "GREEN" => Ok(ColorMode::Green),
            "HEAT" | "HOT" => Ok(ColorMode::Heat),
            "JET" => Ok(ColorMode::Jet),
            other => Err(format!("unknown color mode '{}'", other)),
        }
    }
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Log per-frame statistics every N frames
    pub const FRAME_LOG_INTERVAL: u64 = 60;

    /// How long a status message stays on screen
    pub const STATUS_DISPLAY_TIME: Duration = Duration::from_secs(3);

    /// Terminal UI input poll timeout (one redraw per tick)
    pub const UI_TICK: Duration = Duration::from_millis(16);

    /// How long CLI commands wait for a first frame before giving up
    pub const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

    /// Warm-up before CLI photo capture, so auto exposure settles
    pub const PHOTO_WARMUP: Duration = Duration::from_millis(500);
}

/// Recording defaults
pub mod recording {
    /// Nominal recording rate of an unfiltered IR stream
    pub const DEFAULT_BASE_FPS: u32 = 15;

    /// Floor for the halved rate used when a filter drops every other frame
    pub const DEFAULT_MIN_FILTERED_FPS: u32 = 7;

    /// Upper bound on pacing duplicates written for a single gap
    pub const DEFAULT_MAX_GAP_FILL: u32 = 30;
}

/// Default folder name for saving photos and videos
pub const DEFAULT_SAVE_FOLDER: &str = "IR Camera";

/// Application version string (from git at build time)
pub fn app_version() -> &'static str {
    env!("GIT_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_mode_cycle_visits_all() {
        let mut mode = FilterMode::Off;
        for expected in FilterMode::ALL.iter().cycle().skip(1).take(3) {
            mode = mode.next();
            assert_eq!(mode, *expected);
        }
        assert_eq!(mode, FilterMode::Off);
    }

    #[test]
    fn test_color_mode_cycle_visits_all() {
        let mut seen = vec![ColorMode::Off];
        let mut mode = ColorMode::Off;
        for _ in 0..3 {
            mode = mode.next();
            seen.push(mode);
        }
        assert_eq!(seen, ColorMode::ALL.to_vec());
        assert_eq!(mode.next(), ColorMode::Off);
    }

    #[test]
    fn test_mode_serde_uses_display_names() {
        assert_eq!(
            serde_json::to_string(&FilterMode::Illum).unwrap(),
            "\"ILLUM\""
        );
        assert_eq!(serde_json::to_string(&ColorMode::Jet).unwrap(), "\"JET\"");
        let parsed: FilterMode = serde_json::from_str("\"RAW\"").unwrap();
        assert_eq!(parsed, FilterMode::Raw);
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("illum".parse::<FilterMode>(), Ok(FilterMode::Illum));
        assert_eq!("Heat".parse::<ColorMode>(), Ok(ColorMode::Heat));
        assert!("sepia".parse::<ColorMode>().is_err());
    }
}
