// SPDX-License-Identifier: GPL-3.0-only

//! Output locations and file naming for photos and videos

use crate::constants::{DEFAULT_SAVE_FOLDER, FilterMode};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Timestamp format used in generated file names
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

fn fallback_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Default photo directory (`~/Pictures/IR Camera`)
pub fn default_photo_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(fallback_dir)
        .join(DEFAULT_SAVE_FOLDER)
}

/// Default video directory (`~/Videos/IR Camera`)
pub fn default_video_dir() -> PathBuf {
    dirs::video_dir()
        .unwrap_or_else(fallback_dir)
        .join(DEFAULT_SAVE_FOLDER)
}

fn timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// File name for a new photo, e.g. `IR_Photo_20250101_120000.jpg`
pub fn photo_file_name() -> String {
    format!("IR_Photo_{}.jpg", timestamp())
}

/// File name for a new recording, tagged with the active filter,
/// e.g. `IR_Video_20250101_120000_ILLUM.y4m`
pub fn video_file_name(filter: FilterMode, extension: &str) -> String {
    format!(
        "IR_Video_{}_{}.{}",
        timestamp(),
        filter.display_name(),
        extension
    )
}

/// Create `dir` if needed and return the full path for `file_name`
pub fn prepare_output(dir: &Path, file_name: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    debug!(path = %path.display(), "Prepared output path");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photo_file_name_shape() {
        let name = photo_file_name();
        assert!(name.starts_with("IR_Photo_"));
        assert!(name.ends_with(".jpg"));
        // IR_Photo_ + YYYYmmdd_HHMMSS + .jpg
        assert_eq!(name.len(), "IR_Photo_".len() + 15 + ".jpg".len());
    }

    #[test]
    fn test_video_file_name_carries_filter() {
        let name = video_file_name(FilterMode::Raw, "y4m");
        assert!(name.starts_with("IR_Video_"));
        assert!(name.ends_with("_RAW.y4m"));
    }

    #[test]
    fn test_default_dirs_use_save_folder() {
        assert!(default_photo_dir().ends_with(DEFAULT_SAVE_FOLDER));
        assert!(default_video_dir().ends_with(DEFAULT_SAVE_FOLDER));
    }

    #[test]
    fn test_prepare_output_creates_dir() {
        let dir = std::env::temp_dir().join(format!("ircam-storage-{}", uuid::Uuid::new_v4()));
        let path = prepare_output(&dir, "a.jpg").unwrap();
        assert!(dir.is_dir());
        assert_eq!(path, dir.join("a.jpg"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
