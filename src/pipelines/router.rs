// SPDX-License-Identifier: GPL-3.0-only

//! Frame routing
//!
//! Applies the filter gate and the color transform to each classified
//! frame, then fans the color frame out:
//!
//! ```text
//! classified ─▶ gate ─▶ color ─┬─▶ preview sink (always)
//!                              ├─▶ snapshot writer (pending requests only)
//!                              └─▶ recording session (while recording)
//! ```
//!
//! Frames that fail the gate reach no consumer.

use super::illumination::{ClassifiedFrame, Illumination};
use super::video::RecordingSession;
use crate::constants::{ColorMode, FilterMode};
use crate::errors::{CaptureError, CaptureResult};
use crate::media::{ColorFrame, colormap};
use std::path::{Path, PathBuf};
use tokio::sync::{oneshot, watch};
use tracing::{debug, warn};

/// Display surface for color frames
///
/// Fire-and-forget: implementations may drop frames when they fall behind.
pub trait PreviewSink: Send {
    fn present(&mut self, frame: &ColorFrame);
}

/// Latest-frame preview: receivers only ever see the newest frame
impl PreviewSink for watch::Sender<Option<ColorFrame>> {
    fn present(&mut self, frame: &ColorFrame) {
        self.send_replace(Some(frame.clone()));
    }
}

/// Receiving end of a [`preview_channel`]
pub type PreviewReceiver = watch::Receiver<Option<ColorFrame>>;

/// Create a latest-frame preview channel
pub fn preview_channel() -> (watch::Sender<Option<ColorFrame>>, PreviewReceiver) {
    watch::channel(None)
}

/// Preview sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPreview;

impl PreviewSink for NullPreview {
    fn present(&mut self, _frame: &ColorFrame) {}
}

/// Persists a single color frame
pub trait SnapshotWriter: Send {
    /// Write `frame` to `path`, returning the saved location
    fn write(&mut self, frame: &ColorFrame, path: &Path) -> CaptureResult<PathBuf>;
}

/// Reply channel for an armed snapshot
pub type SnapshotReply = oneshot::Receiver<CaptureResult<PathBuf>>;

struct SnapshotRequest {
    path: PathBuf,
    reply: oneshot::Sender<CaptureResult<PathBuf>>,
}

/// Result of routing one frame
#[derive(Debug)]
pub enum RouteOutcome {
    /// Rejected by the filter; no consumer saw it
    Dropped,
    /// Passed the filter and reached the consumers
    Delivered(Delivery),
}

/// What happened to a delivered frame
#[derive(Debug)]
pub struct Delivery {
    pub frame: ColorFrame,
    /// Results of snapshot requests served by this frame
    pub snapshots: Vec<CaptureResult<PathBuf>>,
    /// Set when the recording rejected the frame and was aborted
    pub recording_error: Option<CaptureError>,
}

/// Whether a frame tagged `illumination` passes `filter`
pub fn passes(filter: FilterMode, illumination: Illumination) -> bool {
    match filter {
        FilterMode::Off => true,
        FilterMode::Raw => illumination == Illumination::Raw,
        FilterMode::Illum => illumination == Illumination::Illum,
    }
}

/// Gates, colors and distributes frames
pub struct FrameRouter {
    preview: Box<dyn PreviewSink>,
    snapshot_writer: Box<dyn SnapshotWriter>,
    pending_snapshots: Vec<SnapshotRequest>,
}

impl FrameRouter {
    pub fn new(preview: Box<dyn PreviewSink>, snapshot_writer: Box<dyn SnapshotWriter>) -> Self {
        Self {
            preview,
            snapshot_writer,
            pending_snapshots: Vec::new(),
        }
    }

    pub fn set_preview(&mut self, preview: Box<dyn PreviewSink>) {
        self.preview = preview;
    }

    pub fn set_snapshot_writer(&mut self, writer: Box<dyn SnapshotWriter>) {
        self.snapshot_writer = writer;
    }

    /// Arm a one-shot snapshot served by the next frame that passes the filter
    pub fn request_snapshot(&mut self, path: PathBuf) -> SnapshotReply {
        let (reply, receiver) = oneshot::channel();
        debug!(path = %path.display(), "Snapshot armed");
        self.pending_snapshots.push(SnapshotRequest { path, reply });
        receiver
    }

    pub fn has_pending_snapshot(&self) -> bool {
        !self.pending_snapshots.is_empty()
    }

    /// Fail every pending snapshot with `error`
    pub fn cancel_snapshots(&mut self, error: CaptureError) {
        for request in self.pending_snapshots.drain(..) {
            debug!(path = %request.path.display(), %error, "Snapshot cancelled");
            let _ = request.reply.send(Err(error.clone()));
        }
    }

    /// Route one classified frame under the given modes
    pub fn route(
        &mut self,
        classified: &ClassifiedFrame,
        filter: FilterMode,
        color: ColorMode,
        recording: Option<&mut RecordingSession>,
    ) -> RouteOutcome {
        if !passes(filter, classified.illumination) {
            return RouteOutcome::Dropped;
        }

        let frame = colormap::apply(&classified.frame, color);
        self.preview.present(&frame);

        let mut snapshots = Vec::new();
        for request in std::mem::take(&mut self.pending_snapshots) {
            let result = self.snapshot_writer.write(&frame, &request.path);
            if let Err(e) = &result {
                warn!(path = %request.path.display(), error = %e, "Snapshot failed");
            }
            let _ = request.reply.send(result.clone());
            snapshots.push(result);
        }

        let recording_error = match recording {
            Some(session) if session.is_active() => session.accept(&frame).err(),
            _ => None,
        };

        RouteOutcome::Delivered(Delivery {
            frame,
            snapshots,
            recording_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::Frame;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<u64>>>);

    impl PreviewSink for Recorder {
        fn present(&mut self, frame: &ColorFrame) {
            self.0.lock().unwrap().push(frame.sequence);
        }
    }

    impl SnapshotWriter for Recorder {
        fn write(&mut self, frame: &ColorFrame, path: &Path) -> CaptureResult<PathBuf> {
            self.0.lock().unwrap().push(frame.sequence);
            Ok(path.to_path_buf())
        }
    }

    fn classified(sequence: u64, illumination: Illumination) -> ClassifiedFrame {
        ClassifiedFrame {
            frame: Frame::gray8(2, 2, vec![10; 4], Instant::now(), sequence),
            illumination,
            mean_luma: 10.0,
        }
    }

    #[test]
    fn test_gate_table() {
        use Illumination::*;
        for tag in [Raw, Illum, Unknown] {
            assert!(passes(FilterMode::Off, tag));
        }
        assert!(passes(FilterMode::Raw, Raw));
        assert!(!passes(FilterMode::Raw, Illum));
        assert!(!passes(FilterMode::Raw, Unknown));
        assert!(passes(FilterMode::Illum, Illum));
        assert!(!passes(FilterMode::Illum, Raw));
        assert!(!passes(FilterMode::Illum, Unknown));
    }

    #[test]
    fn test_dropped_frames_reach_no_sink() {
        let preview = Recorder::default();
        let writer = Recorder::default();
        let mut router = FrameRouter::new(Box::new(preview.clone()), Box::new(writer.clone()));
        let _reply = router.request_snapshot(PathBuf::from("snap.jpg"));

        let outcome = router.route(
            &classified(1, Illumination::Illum),
            FilterMode::Raw,
            ColorMode::Off,
            None,
        );
        assert!(matches!(outcome, RouteOutcome::Dropped));
        assert!(preview.0.lock().unwrap().is_empty());
        assert!(writer.0.lock().unwrap().is_empty());
        assert!(router.has_pending_snapshot());
    }

    #[test]
    fn test_snapshot_is_one_shot() {
        let preview = Recorder::default();
        let writer = Recorder::default();
        let mut router = FrameRouter::new(Box::new(preview.clone()), Box::new(writer.clone()));
        let mut reply = router.request_snapshot(PathBuf::from("snap.jpg"));

        for seq in 0..3 {
            router.route(
                &classified(seq, Illumination::Raw),
                FilterMode::Off,
                ColorMode::Green,
                None,
            );
        }

        assert_eq!(*preview.0.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(*writer.0.lock().unwrap(), vec![0]);
        assert_eq!(reply.try_recv().unwrap(), Ok(PathBuf::from("snap.jpg")));
    }

    #[test]
    fn test_cancel_replies_no_frame() {
        let mut router = FrameRouter::new(Box::new(NullPreview), Box::new(Recorder::default()));
        let mut reply = router.request_snapshot(PathBuf::from("snap.jpg"));
        router.cancel_snapshots(CaptureError::NoFrameAvailable);
        assert_eq!(reply.try_recv().unwrap(), Err(CaptureError::NoFrameAvailable));
        assert!(!router.has_pending_snapshot());
    }

    #[test]
    fn test_watch_preview_keeps_latest() {
        let (sender, receiver) = preview_channel();
        let mut router = FrameRouter::new(Box::new(sender), Box::new(Recorder::default()));
        for seq in 0..5 {
            router.route(
                &classified(seq, Illumination::Unknown),
                FilterMode::Off,
                ColorMode::Off,
                None,
            );
        }
        let latest = receiver.borrow().as_ref().map(|f| f.sequence);
        assert_eq!(latest, Some(4));
    }
}
