// SPDX-License-Identifier: GPL-3.0-only

//! Recording session with frame pacing
//!
//! IR sources deliver frames at an irregular cadence, while the encoder
//! timeline advances by exactly one frame interval per written frame. When
//! the timeline falls more than one interval behind wall-clock time, the
//! previous frame is written again to fill the gap. This bounds playback
//! drift from slow or stalled sources; it does not drop frames when the
//! source runs fast, so a source faster than the nominal rate still plays
//! back sped up.

use super::encoder::{EncoderFactory, VideoEncoder};
use crate::backends::camera::Framerate;
use crate::errors::{CaptureError, CaptureResult};
use crate::media::ColorFrame;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Outcome of a finished recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSummary {
    pub path: PathBuf,
    /// Frames on the encoder timeline, duplicates included
    pub frames_written: u64,
    /// Frames handed to the session
    pub frames_accepted: u64,
    /// Pacing duplicates inserted
    pub frames_duplicated: u64,
    /// Playback duration at the nominal rate
    pub duration: Duration,
}

/// An open recording
///
/// Created by [`start`](Self::start), consumed by [`stop`](Self::stop).
/// Dropping an unfinished session finalizes its encoder.
pub struct RecordingSession {
    encoder: Option<Box<dyn VideoEncoder>>,
    path: PathBuf,
    framerate: Framerate,
    interval: Duration,
    max_gap_fill: u32,
    /// Capture time of the first accepted frame
    epoch: Option<Instant>,
    last_frame: Option<ColorFrame>,
    frames_written: u64,
    frames_accepted: u64,
    frames_duplicated: u64,
}

impl RecordingSession {
    /// Open an encoder and start a session
    ///
    /// Fails with [`CaptureError::RecordingInit`] when the encoder cannot be
    /// opened; no session exists in that case.
    pub fn start(
        factory: &dyn EncoderFactory,
        path: &Path,
        width: u32,
        height: u32,
        framerate: Framerate,
        max_gap_fill: u32,
    ) -> CaptureResult<Self> {
        let encoder = factory
            .open(path, width, height, framerate)
            .map_err(CaptureError::RecordingInit)?;

        info!(
            path = %path.display(),
            width,
            height,
            fps = %framerate,
            "Recording started"
        );

        Ok(Self {
            encoder: Some(encoder),
            path: path.to_path_buf(),
            framerate,
            interval: framerate.frame_interval(),
            max_gap_fill,
            epoch: None,
            last_frame: None,
            frames_written: 0,
            frames_accepted: 0,
            frames_duplicated: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn framerate(&self) -> Framerate {
        self.framerate
    }

    /// Whether the session still accepts frames
    pub fn is_active(&self) -> bool {
        self.encoder.is_some()
    }

    /// Write a frame, inserting pacing duplicates first if needed
    ///
    /// On a write failure the session is aborted: what was written so far
    /// is finalized and [`CaptureError::RecordingWrite`] is returned.
    pub fn accept(&mut self, frame: &ColorFrame) -> CaptureResult<()> {
        if self.encoder.is_none() {
            return Err(CaptureError::NotRecording);
        }

        let epoch = *self.epoch.get_or_insert(frame.captured_at);
        let elapsed = frame.captured_at.saturating_duration_since(epoch);

        let duplicates = self.gap_fill(elapsed);
        if duplicates > 0 {
            if let Some(previous) = self.last_frame.take() {
                for _ in 0..duplicates {
                    if let Err(e) = self.write(&previous) {
                        return Err(self.abort(e));
                    }
                    self.frames_duplicated += 1;
                }
                debug!(duplicates, sequence = frame.sequence, "Filled recording gap");
                self.last_frame = Some(previous);
            }
        }

        if let Err(e) = self.write(frame) {
            return Err(self.abort(e));
        }
        self.frames_accepted += 1;
        self.last_frame = Some(frame.clone());
        Ok(())
    }

    /// Duplicates needed before a frame captured `elapsed` after the epoch
    fn gap_fill(&self, elapsed: Duration) -> u64 {
        if self.last_frame.is_none() {
            return 0;
        }
        let interval = self.interval.as_nanos().max(1);
        let timeline = interval * self.frames_written as u128;
        let behind = elapsed.as_nanos().saturating_sub(timeline);
        if behind <= interval {
            return 0;
        }
        // Largest n with behind - n * interval still above one interval
        let needed = (behind - 1) / interval;
        needed.min(self.max_gap_fill as u128) as u64
    }

    fn write(&mut self, frame: &ColorFrame) -> Result<(), String> {
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| "encoder already finalized".to_string())?;
        encoder.write_frame(frame)?;
        self.frames_written += 1;
        Ok(())
    }

    /// Finalize after a failed write and build the error to report
    fn abort(&mut self, reason: String) -> CaptureError {
        error!(path = %self.path.display(), error = %reason, "Recording write failed, aborting");
        if let Err(e) = self.finalize() {
            warn!(error = %e, "Failed to finalize aborted recording");
        }
        CaptureError::RecordingWrite(reason)
    }

    fn finalize(&mut self) -> Result<(), String> {
        match self.encoder.take() {
            Some(mut encoder) => encoder.finish(),
            None => Ok(()),
        }
    }

    /// Counters so far
    pub fn summary(&self) -> RecordingSummary {
        RecordingSummary {
            path: self.path.clone(),
            frames_written: self.frames_written,
            frames_accepted: self.frames_accepted,
            frames_duplicated: self.frames_duplicated,
            duration: self.interval.saturating_mul(self.frames_written.min(u32::MAX as u64) as u32),
        }
    }

    /// Flush and finalize the encoder
    ///
    /// Stopping a session that was already aborted returns its summary.
    pub fn stop(mut self) -> CaptureResult<RecordingSummary> {
        self.finalize().map_err(CaptureError::RecordingWrite)?;
        let summary = self.summary();
        info!(
            path = %summary.path.display(),
            frames = summary.frames_written,
            duplicated = summary.frames_duplicated,
            duration_ms = summary.duration.as_millis() as u64,
            "Recording saved"
        );
        Ok(summary)
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if self.encoder.is_some() {
            debug!(path = %self.path.display(), "Finalizing recording on drop");
            if let Err(e) = self.finalize() {
                warn!(error = %e, "Failed to finalize recording on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Log {
        sequences: Vec<u64>,
        finished: bool,
    }

    struct MemoryEncoder {
        log: Arc<Mutex<Log>>,
        fail_after: Option<usize>,
    }

    impl VideoEncoder for MemoryEncoder {
        fn write_frame(&mut self, frame: &ColorFrame) -> Result<(), String> {
            let mut log = self.log.lock().unwrap();
            if self.fail_after.is_some_and(|n| log.sequences.len() >= n) {
                return Err("disk full".into());
            }
            log.sequences.push(frame.sequence);
            Ok(())
        }

        fn finish(&mut self) -> Result<(), String> {
            self.log.lock().unwrap().finished = true;
            Ok(())
        }
    }

    struct MemoryFactory {
        log: Arc<Mutex<Log>>,
        fail_after: Option<usize>,
    }

    impl EncoderFactory for MemoryFactory {
        fn open(
            &self,
            _path: &Path,
            _width: u32,
            _height: u32,
            _framerate: Framerate,
        ) -> Result<Box<dyn VideoEncoder>, String> {
            Ok(Box::new(MemoryEncoder {
                log: Arc::clone(&self.log),
                fail_after: self.fail_after,
            }))
        }

        fn extension(&self) -> &'static str {
            "mem"
        }
    }

    fn session(fail_after: Option<usize>) -> (RecordingSession, Arc<Mutex<Log>>) {
        let log = Arc::new(Mutex::new(Log::default()));
        let factory = MemoryFactory {
            log: Arc::clone(&log),
            fail_after,
        };
        let session = RecordingSession::start(
            &factory,
            Path::new("test.mem"),
            2,
            2,
            Framerate::from_int(10),
            30,
        )
        .unwrap();
        (session, log)
    }

    fn frame_at(epoch: Instant, millis: u64, sequence: u64) -> ColorFrame {
        ColorFrame {
            image: RgbImage::new(2, 2),
            captured_at: epoch + Duration::from_millis(millis),
            sequence,
        }
    }

    #[test]
    fn test_regular_cadence_writes_each_frame_once() {
        let (mut session, log) = session(None);
        let epoch = Instant::now();
        for i in 0..10 {
            session.accept(&frame_at(epoch, i * 100, i)).unwrap();
        }
        let summary = session.stop().unwrap();
        assert_eq!(summary.frames_written, 10);
        assert_eq!(summary.frames_duplicated, 0);
        assert_eq!(summary.duration, Duration::from_secs(1));
        assert!(log.lock().unwrap().finished);
    }

    #[test]
    fn test_gap_is_filled_with_previous_frame() {
        let (mut session, log) = session(None);
        let epoch = Instant::now();
        session.accept(&frame_at(epoch, 0, 0)).unwrap();
        session.accept(&frame_at(epoch, 100, 1)).unwrap();
        // Three intervals late: one duplicate of frame 1 keeps the timeline within an interval
        session.accept(&frame_at(epoch, 400, 2)).unwrap();
        let summary = session.stop().unwrap();
        assert_eq!(summary.frames_accepted, 3);
        assert_eq!(summary.frames_written, 4);
        assert_eq!(log.lock().unwrap().sequences, vec![0, 1, 1, 2]);
    }

    #[test]
    fn test_fast_source_gets_no_duplicates() {
        let (mut session, _log) = session(None);
        let epoch = Instant::now();
        for i in 0..5 {
            session.accept(&frame_at(epoch, i * 20, i)).unwrap();
        }
        assert_eq!(session.stop().unwrap().frames_written, 5);
    }

    #[test]
    fn test_gap_fill_is_capped() {
        let (mut session, _log) = session(None);
        let epoch = Instant::now();
        session.accept(&frame_at(epoch, 0, 0)).unwrap();
        session.accept(&frame_at(epoch, 60_000, 1)).unwrap();
        let summary = session.stop().unwrap();
        assert_eq!(summary.frames_duplicated, 30);
    }

    #[test]
    fn test_write_failure_aborts_and_finalizes() {
        let (mut session, log) = session(Some(2));
        let epoch = Instant::now();
        session.accept(&frame_at(epoch, 0, 0)).unwrap();
        session.accept(&frame_at(epoch, 100, 1)).unwrap();
        let err = session.accept(&frame_at(epoch, 200, 2)).unwrap_err();
        assert!(matches!(err, CaptureError::RecordingWrite(_)));
        assert!(!session.is_active());
        assert!(log.lock().unwrap().finished);
        assert_eq!(
            session.accept(&frame_at(epoch, 300, 3)),
            Err(CaptureError::NotRecording)
        );
        assert_eq!(session.stop().unwrap().frames_written, 2);
    }

    #[test]
    fn test_drop_finalizes_encoder() {
        let (session, log) = session(None);
        drop(session);
        assert!(log.lock().unwrap().finished);
    }

    #[test]
    fn test_open_failure_is_init_error() {
        struct Broken;
        impl EncoderFactory for Broken {
            fn open(
                &self,
                _: &Path,
                _: u32,
                _: u32,
                _: Framerate,
            ) -> Result<Box<dyn VideoEncoder>, String> {
                Err("no codec".into())
            }
            fn extension(&self) -> &'static str {
                "x"
            }
        }
        let result = RecordingSession::start(
            &Broken,
            Path::new("x"),
            2,
            2,
            Framerate::from_int(15),
            30,
        );
        assert!(matches!(result, Err(CaptureError::RecordingInit(_))));
    }
}
