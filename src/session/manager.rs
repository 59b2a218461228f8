// SPDX-License-Identifier: GPL-3.0-only

//! Capture session manager
//!
//! Owns the frame-source subscription and the whole per-frame chain
//! (classify → route → record). All operations take `&mut self`, so a mode
//! change or teardown can never interleave with a frame in flight: the
//! frame being processed finishes under the old state before the next
//! operation runs.

use super::state::{FrameOutcome, SessionEvent, SessionState};
use crate::backends::camera::{
    CameraFormat, DeviceDescriptor, Frame, FrameReceiver, FrameSource, Framerate,
    SourceBackendType,
};
use crate::config::Config;
use crate::constants::{ColorMode, FilterMode, timing};
use crate::errors::{CaptureError, CaptureResult};
use crate::media::ColorFrame;
use crate::pipelines::illumination::IlluminationClassifier;
use crate::pipelines::photo::ImageSnapshotWriter;
use crate::pipelines::router::{
    FrameRouter, NullPreview, PreviewSink, RouteOutcome, SnapshotReply, SnapshotWriter,
};
use crate::pipelines::video::{
    EncoderFactory, RecordingSession, RecordingSummary, default_encoder_factory,
};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, error, info, warn};

/// Buffered status events per subscriber
const EVENT_CAPACITY: usize = 64;

/// Top-level control surface and frame pump
pub struct CaptureSessionManager {
    source: Box<dyn FrameSource>,
    config: Config,
    state: SessionState,
    device: Option<DeviceDescriptor>,
    format: Option<CameraFormat>,
    receiver: Option<FrameReceiver>,
    classifier: IlluminationClassifier,
    router: FrameRouter,
    encoder_factory: Box<dyn EncoderFactory>,
    recording: Option<RecordingSession>,
    filter_mode: FilterMode,
    color_mode: ColorMode,
    last_frame: Option<ColorFrame>,
    events: broadcast::Sender<SessionEvent>,
    frames_processed: u64,
}

impl CaptureSessionManager {
    /// Create a manager with no preview, JPEG snapshots and the build's
    /// default encoder
    pub fn new(source: Box<dyn FrameSource>, config: Config) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let snapshot_writer = ImageSnapshotWriter::new(config.photo_quality);
        Self {
            source,
            classifier: IlluminationClassifier::new(config.classifier),
            router: FrameRouter::new(Box::new(NullPreview), Box::new(snapshot_writer)),
            encoder_factory: default_encoder_factory(),
            filter_mode: config.filter_mode,
            color_mode: config.color_mode,
            config,
            state: SessionState::Idle,
            device: None,
            format: None,
            receiver: None,
            recording: None,
            last_frame: None,
            events,
            frames_processed: 0,
        }
    }

    pub fn with_preview(mut self, preview: Box<dyn PreviewSink>) -> Self {
        self.router.set_preview(preview);
        self
    }

    pub fn with_snapshot_writer(mut self, writer: Box<dyn SnapshotWriter>) -> Self {
        self.router.set_snapshot_writer(writer);
        self
    }

    pub fn with_encoder_factory(mut self, factory: Box<dyn EncoderFactory>) -> Self {
        self.encoder_factory = factory;
        self
    }

    // ===== Queries =====

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Backend the frames come from
    pub fn backend_type(&self) -> SourceBackendType {
        self.source.backend_type()
    }

    pub fn device(&self) -> Option<&DeviceDescriptor> {
        self.device.as_ref()
    }

    pub fn format(&self) -> Option<&CameraFormat> {
        self.format.as_ref()
    }

    pub fn filter_mode(&self) -> FilterMode {
        self.filter_mode
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    pub fn is_streaming(&self) -> bool {
        self.state == SessionState::Streaming
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    pub fn recording_path(&self) -> Option<&Path> {
        self.recording.as_ref().map(|r| r.path())
    }

    /// Last frame that passed the filter, as shown on the preview
    pub fn last_frame(&self) -> Option<&ColorFrame> {
        self.last_frame.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// File extension of recordings made by this manager
    pub fn recording_extension(&self) -> &'static str {
        self.encoder_factory.extension()
    }

    /// Subscribe to status events
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        debug!(?event, "Session event");
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    // ===== Devices =====

    /// Devices offered by the frame source
    pub fn list_devices(&self) -> CaptureResult<Vec<DeviceDescriptor>> {
        Ok(self.source.list_devices()?)
    }

    /// Select a device
    ///
    /// While streaming this behaves like [`switch_device`](Self::switch_device).
    /// Fails with [`CaptureError::DeviceUnavailable`] when the descriptor is
    /// stale or the device cannot be opened; the previous selection stays.
    pub fn select_device(&mut self, device: DeviceDescriptor) -> CaptureResult<()> {
        if self.state == SessionState::Streaming {
            return self.switch_device(device);
        }
        self.open_device(device)?;
        if let Some(device) = &self.device {
            self.emit(SessionEvent::DeviceSelected {
                name: device.name.clone(),
            });
        }
        Ok(())
    }

    fn open_device(&mut self, device: DeviceDescriptor) -> CaptureResult<()> {
        let format = self.source.open(&device).map_err(|e| {
            warn!(device = %device.name, error = %e, "Device unavailable");
            CaptureError::from(e)
        })?;

        info!(
            backend = %self.source.backend_type(),
            device = %device.name,
            format = %format,
            "Device selected"
        );
        self.config.last_device_id = Some(device.id.clone());
        self.device = Some(device);
        self.format = Some(format);
        self.state = SessionState::DeviceSelected;
        Ok(())
    }

    /// Swap the active device, keeping the streaming state
    ///
    /// If the new device cannot be opened the previous one stays selected
    /// (and resumes streaming if it was streaming).
    pub fn switch_device(&mut self, device: DeviceDescriptor) -> CaptureResult<()> {
        let was_streaming = self.state == SessionState::Streaming;
        info!(device = %device.name, was_streaming, "Switching device");

        if was_streaming {
            if let Err(e) = self.stop_streaming() {
                warn!(error = %e, "Recording did not finalize cleanly during device switch");
            }
        }

        if let Err(e) = self.open_device(device) {
            if was_streaming && self.device.is_some() {
                if let Err(resume) = self.start_streaming() {
                    error!(error = %resume, "Failed to resume previous device");
                }
            }
            return Err(e);
        }

        if was_streaming {
            self.start_streaming()?;
        }

        if let Some(device) = &self.device {
            self.emit(SessionEvent::DeviceSwitched {
                name: device.name.clone(),
            });
        }
        Ok(())
    }

    /// Switch to the device after the current one in the source's list
    pub fn next_device(&mut self) -> CaptureResult<DeviceDescriptor> {
        let devices = self.list_devices()?;
        if devices.is_empty() {
            return Err(CaptureError::DeviceUnavailable(
                "no cameras found".to_string(),
            ));
        }

        let current = self
            .device
            .as_ref()
            .and_then(|d| devices.iter().position(|c| c.id == d.id));
        let next = match current {
            Some(index) => devices[(index + 1) % devices.len()].clone(),
            None => devices[0].clone(),
        };

        self.switch_device(next.clone())?;
        Ok(next)
    }

    // ===== Streaming =====

    /// Subscribe to the selected device
    ///
    /// The classifier starts over, so the first frame is UNKNOWN.
    pub fn start_streaming(&mut self) -> CaptureResult<()> {
        match self.state {
            SessionState::Streaming => return Ok(()),
            SessionState::Idle => return Err(CaptureError::NoDeviceSelected),
            SessionState::DeviceSelected => {}
        }
        let (Some(device), Some(format)) = (self.device.as_ref(), self.format.as_ref()) else {
            return Err(CaptureError::NoDeviceSelected);
        };

        let (sender, receiver) = tokio::sync::mpsc::channel(self.config.frame_queue_depth.max(1));
        self.source.subscribe(device, format, sender)?;
        info!(device = %device.name, format = %format, "Streaming started");

        self.receiver = Some(receiver);
        self.classifier.reset();
        self.frames_processed = 0;
        self.state = SessionState::Streaming;
        self.emit(SessionEvent::StreamingStarted);
        Ok(())
    }

    /// Stop streaming, finalizing an active recording first
    ///
    /// Pending snapshots fail with [`CaptureError::NoFrameAvailable`].
    /// Teardown always completes; a recording that failed to finalize is
    /// reported as the error.
    pub fn stop_streaming(&mut self) -> CaptureResult<Option<RecordingSummary>> {
        if self.state != SessionState::Streaming {
            return Ok(None);
        }

        let recording = if self.recording.is_some() {
            Some(self.stop_recording())
        } else {
            None
        };

        self.source.unsubscribe();
        self.receiver = None;
        self.router.cancel_snapshots(CaptureError::NoFrameAvailable);
        self.state = SessionState::DeviceSelected;
        info!(frames = self.frames_processed, "Streaming stopped");
        self.emit(SessionEvent::StreamingStopped);

        recording.transpose()
    }

    // ===== Modes =====

    pub fn set_filter_mode(&mut self, mode: FilterMode) {
        if self.filter_mode != mode {
            info!(filter = %mode, "Filter mode changed");
            self.filter_mode = mode;
            self.emit(SessionEvent::FilterChanged(mode));
        }
    }

    pub fn set_color_mode(&mut self, mode: ColorMode) {
        if self.color_mode != mode {
            info!(color = %mode, "Color mode changed");
            self.color_mode = mode;
            self.emit(SessionEvent::ColorChanged(mode));
        }
    }

    /// Advance to the next filter mode (button behavior)
    pub fn cycle_filter_mode(&mut self) -> FilterMode {
        self.set_filter_mode(self.filter_mode.next());
        self.filter_mode
    }

    /// Advance to the next color mode (button behavior)
    pub fn cycle_color_mode(&mut self) -> ColorMode {
        self.set_color_mode(self.color_mode.next());
        self.color_mode
    }

    // ===== Capture =====

    /// Arm a snapshot of the next frame that passes the filter
    ///
    /// The reply resolves to the saved path, or to
    /// [`CaptureError::NoFrameAvailable`] if streaming stops first or the
    /// source is lost.
    pub fn snapshot(&mut self, path: PathBuf) -> CaptureResult<SnapshotReply> {
        if self.state != SessionState::Streaming {
            return Err(CaptureError::NotStreaming);
        }
        if self.receiver.is_none() {
            return Err(CaptureError::NoFrameAvailable);
        }
        Ok(self.router.request_snapshot(path))
    }

    /// Start recording routed frames to `path`
    ///
    /// The nominal rate is halved while a filter is active, since only
    /// every other frame passes.
    pub fn start_recording(&mut self, path: &Path) -> CaptureResult<()> {
        if self.recording.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }
        if self.state != SessionState::Streaming {
            return Err(CaptureError::NotStreaming);
        }
        let format = self.format.as_ref().ok_or(CaptureError::NoDeviceSelected)?;

        let fps = self.config.recording.fps_for(self.filter_mode);
        let session = RecordingSession::start(
            self.encoder_factory.as_ref(),
            path,
            format.width,
            format.height,
            Framerate::from_int(fps),
            self.config.recording.max_gap_fill,
        )?;

        info!(path = %path.display(), fps, filter = %self.filter_mode, "Recording started");
        self.recording = Some(session);
        self.emit(SessionEvent::RecordingStarted {
            path: path.to_path_buf(),
        });
        Ok(())
    }

    /// Finalize the active recording
    pub fn stop_recording(&mut self) -> CaptureResult<RecordingSummary> {
        let session = self.recording.take().ok_or(CaptureError::NotRecording)?;
        let summary = session.stop()?;
        self.emit(SessionEvent::RecordingSaved(summary.clone()));
        Ok(summary)
    }

    // ===== Frame pump =====

    /// Push one frame through classify → route → record
    pub fn process_frame(&mut self, frame: Frame) -> FrameOutcome {
        if self.state != SessionState::Streaming {
            return FrameOutcome::Ignored;
        }

        self.frames_processed += 1;
        let classified = self.classifier.classify(frame);
        let illumination = classified.illumination;

        if self.frames_processed % timing::FRAME_LOG_INTERVAL == 0 {
            debug!(
                frames = self.frames_processed,
                sequence = classified.frame.sequence,
                mean = classified.mean_luma,
                tag = %illumination,
                "Frame pipeline"
            );
        }

        let outcome = self.router.route(
            &classified,
            self.filter_mode,
            self.color_mode,
            self.recording.as_mut(),
        );

        let delivery = match outcome {
            RouteOutcome::Dropped => return FrameOutcome::Dropped { illumination },
            RouteOutcome::Delivered(delivery) => delivery,
        };

        for result in delivery.snapshots {
            match result {
                Ok(path) => self.emit(SessionEvent::SnapshotSaved(path)),
                Err(e) => self.emit(SessionEvent::SnapshotFailed(e)),
            }
        }

        let mut recorded = self.recording.is_some();
        if let Some(error) = delivery.recording_error {
            recorded = false;
            // Only the recording ends; streaming carries on
            if let Some(session) = self.recording.take() {
                let summary = session.summary();
                drop(session);
                self.emit(SessionEvent::RecordingAborted { error, summary });
            }
        }

        self.last_frame = Some(delivery.frame);
        FrameOutcome::Delivered {
            illumination,
            recorded,
        }
    }

    /// No more frames will arrive; fail any armed snapshots
    fn source_lost(&mut self) {
        warn!("Frame source closed while streaming");
        self.receiver = None;
        self.router.cancel_snapshots(CaptureError::NoFrameAvailable);
        self.emit(SessionEvent::SourceLost);
    }

    /// Wait for the next frame and process it
    ///
    /// Returns `None` when not streaming or when the source went away.
    pub async fn pump_next(&mut self) -> Option<FrameOutcome> {
        let receiver = self.receiver.as_mut()?;
        match receiver.recv().await {
            Some(frame) => Some(self.process_frame(frame)),
            None => {
                self.source_lost();
                None
            }
        }
    }

    /// Process every frame already queued, without waiting
    pub fn drain_pending(&mut self) -> Vec<FrameOutcome> {
        let mut outcomes = Vec::new();
        loop {
            let Some(receiver) = self.receiver.as_mut() else {
                break;
            };
            match receiver.try_recv() {
                Ok(frame) => outcomes.push(self.process_frame(frame)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.source_lost();
                    break;
                }
            }
        }
        outcomes
    }
}

impl Drop for CaptureSessionManager {
    fn drop(&mut self) {
        if let Err(e) = self.stop_streaming() {
            warn!(error = %e, "Failed to finalize recording on shutdown");
        }
    }
}
