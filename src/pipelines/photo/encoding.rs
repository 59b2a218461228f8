// SPDX-License-Identifier: GPL-3.0-only

//! Snapshot encoding
//!
//! Writes a color-mapped frame to disk as JPEG (with quality control) or
//! PNG (lossless), chosen by the destination's file extension.

use crate::errors::{CaptureError, CaptureResult};
use crate::media::ColorFrame;
use crate::pipelines::router::SnapshotWriter;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Supported encoding formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingFormat {
    /// JPEG format (lossy compression)
    Jpeg,
    /// PNG format (lossless compression)
    Png,
}

impl EncodingFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            EncodingFormat::Jpeg => "jpg",
            EncodingFormat::Png => "png",
        }
    }

    /// Pick the format from a path's extension, defaulting to JPEG
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("png") => EncodingFormat::Png,
            _ => EncodingFormat::Jpeg,
        }
    }
}

/// Encoding quality settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EncodingQuality {
    /// Low quality (high compression)
    Low,
    /// Medium quality (balanced)
    Medium,
    /// High quality (low compression)
    #[default]
    High,
    /// Maximum quality (minimal compression)
    Maximum,
}

impl EncodingQuality {
    /// Get JPEG quality value (0-100)
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            EncodingQuality::Low => 60,
            EncodingQuality::Medium => 80,
            EncodingQuality::High => 92,
            EncodingQuality::Maximum => 98,
        }
    }
}

/// Encode an image in memory
pub fn encode(
    image: &RgbImage,
    format: EncodingFormat,
    quality: EncodingQuality,
) -> CaptureResult<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);

    match format {
        EncodingFormat::Jpeg => {
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
                &mut cursor,
                quality.jpeg_quality(),
            );
            encoder.encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ExtendedColorType::Rgb8,
            )?;
        }
        EncodingFormat::Png => {
            image.write_to(&mut cursor, image::ImageFormat::Png)?;
        }
    }

    debug!(size = buffer.len(), format = ?format, "Encoding complete");
    Ok(buffer)
}

/// Snapshot writer backed by the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageSnapshotWriter {
    quality: EncodingQuality,
}

impl ImageSnapshotWriter {
    pub fn new(quality: EncodingQuality) -> Self {
        Self { quality }
    }
}

impl SnapshotWriter for ImageSnapshotWriter {
    fn write(&mut self, frame: &ColorFrame, path: &Path) -> CaptureResult<PathBuf> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(CaptureError::Snapshot("empty frame".to_string()));
        }

        let format = EncodingFormat::from_path(path);
        let path = match path.extension() {
            Some(_) => path.to_path_buf(),
            None => path.with_extension(format.extension()),
        };
        let data = encode(&frame.image, format, self.quality)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &data)?;

        info!(path = %path.display(), bytes = data.len(), "Photo saved");
        Ok(path)
    }
}
