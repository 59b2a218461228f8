// SPDX-License-Identifier: GPL-3.0-only

//! Session state, per-frame outcomes and status events

use crate::constants::{ColorMode, FilterMode};
use crate::errors::CaptureError;
use crate::pipelines::Illumination;
use crate::pipelines::video::RecordingSummary;
use std::path::PathBuf;

/// Capture session lifecycle
///
/// Recording is an orthogonal flag that can only be set while `Streaming`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    DeviceSelected,
    Streaming,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::DeviceSelected => write!(f, "device selected"),
            SessionState::Streaming => write!(f, "streaming"),
        }
    }
}

/// What the pipeline did with one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Arrived while not streaming
    Ignored,
    /// Rejected by the active filter
    Dropped { illumination: Illumination },
    /// Passed the filter
    Delivered {
        illumination: Illumination,
        /// Written to the active recording
        recorded: bool,
    },
}

/// Status notifications for the control surface
#[derive(Debug, Clone)]
pub enum SessionEvent {
    DeviceSelected { name: String },
    DeviceSwitched { name: String },
    StreamingStarted,
    StreamingStopped,
    /// The frame source closed its channel while streaming
    SourceLost,
    FilterChanged(FilterMode),
    ColorChanged(ColorMode),
    RecordingStarted { path: PathBuf },
    RecordingSaved(RecordingSummary),
    /// A write failed; what was written so far was finalized
    RecordingAborted {
        error: CaptureError,
        summary: RecordingSummary,
    },
    SnapshotSaved(PathBuf),
    SnapshotFailed(CaptureError),
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl SessionEvent {
    /// One-line, user-facing status text
    pub fn status_message(&self) -> String {
        match self {
            SessionEvent::DeviceSelected { name } => format!("Camera: {}", name),
            SessionEvent::DeviceSwitched { name } => format!("Switched to {}", name),
            SessionEvent::StreamingStarted => "Streaming".to_string(),
            SessionEvent::StreamingStopped => "Stopped".to_string(),
            SessionEvent::SourceLost => "Camera disconnected".to_string(),
            SessionEvent::FilterChanged(mode) => format!("Filter: {}", mode),
            SessionEvent::ColorChanged(mode) => format!("Color: {}", mode),
            SessionEvent::RecordingStarted { .. } => "Recording...".to_string(),
            SessionEvent::RecordingSaved(summary) => format!("Saved: {}", file_name(&summary.path)),
            SessionEvent::RecordingAborted { error, .. } => error.to_string(),
            SessionEvent::SnapshotSaved(path) => format!("Saved: {}", file_name(path)),
            SessionEvent::SnapshotFailed(error) => error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saved_messages_use_file_name() {
        let event = SessionEvent::SnapshotSaved(PathBuf::from("/tmp/IR Camera/IR_Photo_1.jpg"));
        assert_eq!(event.status_message(), "Saved: IR_Photo_1.jpg");
        assert_eq!(
            SessionEvent::RecordingStarted {
                path: PathBuf::from("x.y4m")
            }
            .status_message(),
            "Recording..."
        );
    }
}
