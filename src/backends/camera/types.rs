// SPDX-License-Identifier: GPL-3.0-only
// Shared types for frame source abstraction

//! Shared types for frame sources

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Frame data storage - either pre-copied bytes or a zero-copy GStreamer buffer
///
/// Frames are never mutated in place once produced, so cloning a frame only
/// bumps a reference count.
#[derive(Clone)]
pub enum FrameData {
    /// Pre-copied bytes (synthetic source, tests, copied platform buffers)
    Copied(Arc<[u8]>),
    /// Zero-copy mapped GStreamer buffer
    #[cfg(feature = "gstreamer")]
    Mapped(Arc<gstreamer::buffer::MappedBuffer<gstreamer::buffer::Readable>>),
}

impl FrameData {
    /// Create FrameData from a mapped GStreamer buffer (zero-copy)
    #[cfg(feature = "gstreamer")]
    pub fn from_mapped_buffer(
        buffer: gstreamer::buffer::MappedBuffer<gstreamer::buffer::Readable>,
    ) -> Self {
        FrameData::Mapped(Arc::new(buffer))
    }

    /// Get the length of the frame data in bytes
    pub fn len(&self) -> usize {
        self.as_ref().len()
    }

    /// Check if the frame data is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<u8>> for FrameData {
    fn from(data: Vec<u8>) -> Self {
        FrameData::Copied(Arc::from(data))
    }
}

impl std::fmt::Debug for FrameData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameData::Copied(data) => write!(f, "FrameData::Copied({} bytes)", data.len()),
            #[cfg(feature = "gstreamer")]
            FrameData::Mapped(buf) => write!(f, "FrameData::Mapped({} bytes)", buf.len()),
        }
    }
}

impl AsRef<[u8]> for FrameData {
    fn as_ref(&self) -> &[u8] {
        match self {
            FrameData::Copied(data) => data.as_ref(),
            #[cfg(feature = "gstreamer")]
            FrameData::Mapped(buf) => buf.as_slice(),
        }
    }
}

impl std::ops::Deref for FrameData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_ref()
    }
}

/// Frame source backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SourceBackendType {
    /// Built-in virtual IR camera (no hardware needed)
    #[default]
    Synthetic,
    /// GStreamer v4l2src capture (requires the `gstreamer` feature)
    GStreamer,
}

impl std::fmt::Display for SourceBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceBackendType::Synthetic => write!(f, "synthetic"),
            SourceBackendType::GStreamer => write!(f, "gstreamer"),
        }
    }
}

impl std::str::FromStr for SourceBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "synthetic" | "virtual" => Ok(SourceBackendType::Synthetic),
            "gstreamer" | "gst" | "v4l2" => Ok(SourceBackendType::GStreamer),
            other => Err(format!("unknown frame source '{}'", other)),
        }
    }
}

/// Kind of sensor behind a device, as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SourceKind {
    /// Infrared sensor (usually paired with an IR LED emitter)
    #[default]
    Infrared,
    /// Regular color sensor
    Color,
    /// Depth sensor
    Depth,
}

/// Framerate as a fraction (numerator/denominator)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Framerate {
    pub num: u32,
    pub denom: u32,
}

impl Framerate {
    /// Create a new framerate from numerator and denominator
    pub fn new(num: u32, denom: u32) -> Self {
        Self {
            num: num.max(1),
            denom: if denom == 0 { 1 } else { denom },
        }
    }

    /// Create a framerate from an integer (e.g., 15 becomes 15/1)
    pub fn from_int(fps: u32) -> Self {
        Self::new(fps, 1)
    }

    /// Get the framerate as a floating point value
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }

    /// Get the rounded-down integer framerate
    pub fn as_int(&self) -> u32 {
        self.num / self.denom
    }

    /// Duration of one frame at this rate
    pub fn frame_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000u64 * self.denom as u64 / self.num as u64)
    }
}

impl std::fmt::Display for Framerate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.denom != 1 {
            write!(f, "{:.2}", self.as_f64())
        } else {
            write!(f, "{}", self.num)
        }
    }
}

impl Default for Framerate {
    fn default() -> Self {
        Self { num: 30, denom: 1 }
    }
}

/// Pixel format of a capture frame
///
/// Only single-plane luma formats are produced by IR sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit grayscale
    Gray8,
    /// 16-bit little-endian grayscale
    Gray16,
}

impl PixelFormat {
    /// Bytes per pixel
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Gray8 => 1,
            Self::Gray16 => 2,
        }
    }

    /// GStreamer video/x-raw format string
    pub fn to_gst_format_string(&self) -> &'static str {
        match self {
            Self::Gray8 => "GRAY8",
            Self::Gray16 => "GRAY16_LE",
        }
    }

    /// Parse format from a GStreamer or V4L2 format string
    pub fn from_gst_format(format: &str) -> Option<Self> {
        match format {
            "GRAY8" | "GREY" | "Y8" | "Y800" => Some(Self::Gray8),
            "GRAY16_LE" | "Y16" => Some(Self::Gray16),
            _ => None,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_gst_format_string())
    }
}

/// Capture format specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraFormat {
    pub width: u32,
    pub height: u32,
    pub framerate: Option<Framerate>,
    pub pixel_format: PixelFormat,
}

impl std::fmt::Display for CameraFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(fps) = &self.framerate {
            write!(
                f,
                "{}x{} @ {}fps {}",
                self.width, self.height, fps, self.pixel_format
            )
        } else {
            write!(f, "{}x{} {}", self.width, self.height, self.pixel_format)
        }
    }
}

/// Opaque handle to a capture device plus its display name
///
/// The `id` is whatever the frame source needs to reopen the device
/// (a node path, a synthetic pattern key); callers never look inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub id: String,
    pub name: String,
    pub kind: SourceKind,
    pub formats: Vec<CameraFormat>,
}

impl DeviceDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            formats: Vec::new(),
        }
    }

    pub fn with_formats(mut self, formats: Vec<CameraFormat>) -> Self {
        self.formats = formats;
        self
    }

    pub fn is_infrared(&self) -> bool {
        self.kind == SourceKind::Infrared
    }

    /// Highest-resolution format, preferring the higher framerate on ties
    pub fn best_format(&self) -> Option<&CameraFormat> {
        self.formats.iter().max_by_key(|f| {
            (
                f.width as u64 * f.height as u64,
                f.framerate.map(|r| r.as_int()).unwrap_or(0),
            )
        })
    }
}

impl std::fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// A single frame from the capture source
///
/// Immutable once produced; pipeline stages derive new frames instead of
/// editing this one.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Luma samples, row-major
    pub data: FrameData,
    pub format: PixelFormat,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    /// When the frame was captured
    pub captured_at: Instant,
    /// Monotonic sequence number assigned by the source
    pub sequence: u64,
    /// LED state reported by the platform, when it reports one
    pub illuminated: Option<bool>,
}

impl Frame {
    /// Build a tightly packed 8-bit frame
    pub fn gray8(
        width: u32,
        height: u32,
        data: Vec<u8>,
        captured_at: Instant,
        sequence: u64,
    ) -> Self {
        Self {
            width,
            height,
            data: FrameData::from(data),
            format: PixelFormat::Gray8,
            stride: width,
            captured_at,
            sequence,
            illuminated: None,
        }
    }

    /// Build a tightly packed 16-bit frame from native samples
    pub fn gray16(
        width: u32,
        height: u32,
        samples: &[u16],
        captured_at: Instant,
        sequence: u64,
    ) -> Self {
        let data: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self {
            width,
            height,
            data: FrameData::from(data),
            format: PixelFormat::Gray16,
            stride: width * 2,
            captured_at,
            sequence,
            illuminated: None,
        }
    }

    /// Attach the platform's LED state
    pub fn with_illumination(mut self, illuminated: bool) -> Self {
        self.illuminated = Some(illuminated);
        self
    }

    /// Sample at (x, y) scaled to 8 bits; out-of-range reads give 0
    pub fn luma8(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        let data = self.data.as_ref();
        let row = y as usize * self.stride as usize;
        match self.format {
            PixelFormat::Gray8 => data.get(row + x as usize).copied().unwrap_or(0),
            PixelFormat::Gray16 => {
                let idx = row + x as usize * 2;
                match (data.get(idx), data.get(idx + 1)) {
                    (Some(&lo), Some(&hi)) => (u16::from_le_bytes([lo, hi]) >> 8) as u8,
                    _ => 0,
                }
            }
        }
    }

    /// Mean luma on the 8-bit scale (0.0..=255.0)
    ///
    /// Rows missing from a short buffer are skipped rather than counted as black.
    pub fn mean_luma(&self) -> f32 {
        let data = self.data.as_ref();
        let stride = self.stride as usize;
        let bpp = self.format.bytes_per_pixel();
        let row_bytes = self.width as usize * bpp;

        let mut sum: u64 = 0;
        let mut count: u64 = 0;
        for y in 0..self.height as usize {
            let start = y * stride;
            let Some(row) = data.get(start..start + row_bytes) else {
                break;
            };
            match self.format {
                PixelFormat::Gray8 => {
                    sum += row.iter().map(|&v| v as u64).sum::<u64>();
                }
                PixelFormat::Gray16 => {
                    sum += row
                        .chunks_exact(2)
                        .map(|c| u16::from_le_bytes([c[0], c[1]]) as u64)
                        .sum::<u64>();
                }
            }
            count += self.width as u64;
        }

        if count == 0 {
            return 0.0;
        }
        let mean = sum as f64 / count as f64;
        match self.format {
            PixelFormat::Gray8 => mean as f32,
            PixelFormat::Gray16 => (mean / 257.0) as f32,
        }
    }
}

/// Frame sender handed to a frame source on subscribe
pub type FrameSender = tokio::sync::mpsc::Sender<Frame>;

/// Frame receiver owned by the session manager
pub type FrameReceiver = tokio::sync::mpsc::Receiver<Frame>;

/// Result type for frame source operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for frame source operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Device descriptor no longer matches a connected device
    DeviceNotFound(String),
    /// Device exists but could not be opened (busy, permissions)
    AccessDenied(String),
    /// Failed to initialize the capture pipeline
    InitializationFailed(String),
    /// Format not supported
    FormatNotSupported(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::AccessDenied(msg) => write!(f, "Access denied: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_luma_gray8() {
        let frame = Frame::gray8(2, 2, vec![0, 100, 200, 100], Instant::now(), 0);
        assert!((frame.mean_luma() - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_mean_luma_gray16_is_8bit_scaled() {
        let frame = Frame::gray16(2, 1, &[u16::MAX, u16::MAX], Instant::now(), 0);
        assert!((frame.mean_luma() - 255.0).abs() < 0.01);
        assert_eq!(frame.luma8(1, 0), 255);
    }

    #[test]
    fn test_mean_luma_skips_truncated_rows() {
        // Second row missing entirely
        let frame = Frame::gray8(2, 2, vec![50, 50], Instant::now(), 0);
        assert!((frame.mean_luma() - 50.0).abs() < f32::EPSILON);
        assert_eq!(frame.luma8(0, 1), 0);
    }

    #[test]
    fn test_luma8_honours_stride() {
        let mut frame = Frame::gray8(2, 2, vec![1, 2, 9, 3, 4, 9], Instant::now(), 0);
        frame.stride = 3;
        assert_eq!(frame.luma8(0, 1), 3);
        assert_eq!(frame.luma8(1, 1), 4);
    }

    #[test]
    fn test_frame_interval() {
        assert_eq!(
            Framerate::from_int(15).frame_interval(),
            Duration::from_nanos(66_666_666)
        );
        assert_eq!(
            Framerate::new(0, 0).as_int(),
            1,
            "degenerate rates clamp to 1fps"
        );
    }

    #[test]
    fn test_best_format_prefers_resolution() {
        let device = DeviceDescriptor::new("a", "A", SourceKind::Infrared).with_formats(vec![
            CameraFormat {
                width: 340,
                height: 340,
                framerate: Some(Framerate::from_int(30)),
                pixel_format: PixelFormat::Gray8,
            },
            CameraFormat {
                width: 640,
                height: 480,
                framerate: Some(Framerate::from_int(15)),
                pixel_format: PixelFormat::Gray8,
            },
        ]);
        assert_eq!(device.best_format().map(|f| f.width), Some(640));
    }

    #[test]
    fn test_source_backend_from_str() {
        assert_eq!(
            "GStreamer".parse::<SourceBackendType>(),
            Ok(SourceBackendType::GStreamer)
        );
        assert!("webcam".parse::<SourceBackendType>().is_err());
    }
}
