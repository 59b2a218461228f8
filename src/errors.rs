// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture session

use crate::backends::camera::BackendError;
use std::fmt;

/// Result type alias using CaptureError
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Errors surfaced by the capture session
///
/// Every variant is recoverable: the session manager stays in its last
/// well-defined state after returning one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Device descriptor is stale or access was denied
    DeviceUnavailable(String),
    /// Streaming stopped before a frame could satisfy a snapshot
    NoFrameAvailable,
    /// A recording is already active
    AlreadyRecording,
    /// No recording is active
    NotRecording,
    /// Operation requires an active stream
    NotStreaming,
    /// Operation requires a selected device
    NoDeviceSelected,
    /// Encoder could not be opened (bad path, unsupported codec)
    RecordingInit(String),
    /// Encoder write failed mid-session; the recording was aborted
    RecordingWrite(String),
    /// Snapshot could not be encoded or saved
    Snapshot(String),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::DeviceUnavailable(msg) => write!(f, "Device unavailable: {}", msg),
            CaptureError::NoFrameAvailable => write!(f, "No frame available for capture"),
            CaptureError::AlreadyRecording => write!(f, "Recording already in progress"),
            CaptureError::NotRecording => write!(f, "No recording in progress"),
            CaptureError::NotStreaming => write!(f, "Camera is not streaming"),
            CaptureError::NoDeviceSelected => write!(f, "No camera selected"),
            CaptureError::RecordingInit(msg) => write!(f, "Failed to start recording: {}", msg),
            CaptureError::RecordingWrite(msg) => write!(f, "Recording aborted: {}", msg),
            CaptureError::Snapshot(msg) => write!(f, "Failed to save photo: {}", msg),
        }
    }
}

impl std::error::Error for CaptureError {}

impl From<BackendError> for CaptureError {
    fn from(err: BackendError) -> Self {
        CaptureError::DeviceUnavailable(err.to_string())
    }
}

impl From<image::ImageError> for CaptureError {
    fn from(err: image::ImageError) -> Self {
        CaptureError::Snapshot(err.to_string())
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Snapshot(err.to_string())
    }
}
