// SPDX-License-Identifier: GPL-3.0-only

//! Virtual IR camera
//!
//! Produces GRAY8 frames that mimic a Windows Hello style IR sensor: the
//! emitter LED is toggled every other frame, so the stream alternates between
//! a dark ambient capture and a brightly lit one. Frame cadence is jittered to
//! exercise recording pacing. A second device keeps the LED on permanently,
//! which is what a sensor without an alternating emitter looks like.

use super::frame_loop::{CaptureLoopController, LoopAction};
use super::types::*;
use super::FrameSource;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info};

/// Device id of the alternating-LED virtual camera
pub const ALTERNATING_DEVICE_ID: &str = "synthetic:alternating";
/// Device id of the always-lit virtual camera
pub const STEADY_DEVICE_ID: &str = "synthetic:steady";

/// Log dropped frames only every N drops
const DROP_LOG_INTERVAL: u64 = 30;

/// Virtual camera parameters
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub width: u32,
    pub height: u32,
    pub framerate: Framerate,
    /// Cadence jitter as a fraction of the frame interval (0.0 = perfectly regular)
    pub jitter: f32,
    /// Ambient brightness with the LED off
    pub ambient: u8,
    /// Brightness added at the image center when the LED is on
    pub led_gain: u8,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            framerate: Framerate::from_int(15),
            jitter: 0.3,
            ambient: 40,
            led_gain: 130,
        }
    }
}

/// Frame source backed by a generated alternating-LED pattern
pub struct SyntheticSource {
    config: SyntheticConfig,
    capture: Option<CaptureLoopController>,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self::with_config(SyntheticConfig::default())
    }

    pub fn with_config(config: SyntheticConfig) -> Self {
        Self {
            config,
            capture: None,
        }
    }

    fn format(&self) -> CameraFormat {
        CameraFormat {
            width: self.config.width,
            height: self.config.height,
            framerate: Some(self.config.framerate),
            pixel_format: PixelFormat::Gray8,
        }
    }

    fn devices(&self) -> Vec<DeviceDescriptor> {
        vec![
            DeviceDescriptor::new(
                ALTERNATING_DEVICE_ID,
                "Virtual IR Camera",
                SourceKind::Infrared,
            )
            .with_formats(vec![self.format()]),
            DeviceDescriptor::new(
                STEADY_DEVICE_ID,
                "Virtual IR Camera (steady LED)",
                SourceKind::Infrared,
            )
            .with_formats(vec![self.format()]),
        ]
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for SyntheticSource {
    fn backend_type(&self) -> SourceBackendType {
        SourceBackendType::Synthetic
    }

    fn list_devices(&self) -> BackendResult<Vec<DeviceDescriptor>> {
        Ok(self.devices())
    }

    fn open(&mut self, device: &DeviceDescriptor) -> BackendResult<CameraFormat> {
        if !self.devices().iter().any(|d| d.id == device.id) {
            return Err(BackendError::DeviceNotFound(device.name.clone()));
        }
        Ok(self.format())
    }

    fn subscribe(
        &mut self,
        device: &DeviceDescriptor,
        format: &CameraFormat,
        sender: FrameSender,
    ) -> BackendResult<()> {
        self.unsubscribe();

        let alternating = match device.id.as_str() {
            ALTERNATING_DEVICE_ID => true,
            STEADY_DEVICE_ID => false,
            _ => return Err(BackendError::DeviceNotFound(device.name.clone())),
        };

        info!(device = %device.name, format = %format, "Starting virtual IR camera");

        let mut config = self.config.clone();
        config.width = format.width;
        config.height = format.height;
        if let Some(rate) = format.framerate {
            config.framerate = rate;
        }

        self.capture = Some(CaptureLoopController::start_with_init(
            "synthetic-ir",
            move || Ok(PatternGenerator::new(config, alternating, sender)),
            |generator| generator.tick(),
        ));
        Ok(())
    }

    fn unsubscribe(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            debug!("Stopping virtual IR camera");
            capture.stop();
        }
    }

    fn is_subscribed(&self) -> bool {
        self.capture.as_ref().is_some_and(|c| c.is_running())
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Per-thread frame producer
struct PatternGenerator {
    config: SyntheticConfig,
    alternating: bool,
    sender: FrameSender,
    sequence: u64,
    next_due: Instant,
    dropped: u64,
}

impl PatternGenerator {
    fn new(config: SyntheticConfig, alternating: bool, sender: FrameSender) -> Self {
        Self {
            config,
            alternating,
            sender,
            sequence: 0,
            next_due: Instant::now(),
            dropped: 0,
        }
    }

    fn tick(&mut self) -> LoopAction {
        let now = Instant::now();
        if now < self.next_due {
            return LoopAction::Wait(self.next_due - now);
        }

        let led_on = !self.alternating || self.sequence % 2 == 1;
        let frame = Frame::gray8(
            self.config.width,
            self.config.height,
            render_pattern(&self.config, led_on, self.sequence),
            now,
            self.sequence,
        );

        match self.sender.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                if self.dropped % DROP_LOG_INTERVAL == 1 {
                    debug!(dropped = self.dropped, "Consumer slow, dropping virtual frames");
                }
            }
            Err(TrySendError::Closed(_)) => return LoopAction::Stop,
        }

        self.sequence += 1;
        // After a stall, resume from now instead of bursting to catch up
        self.next_due = self.next_due.max(now) + jittered_interval(&self.config, self.sequence);
        LoopAction::Continue
    }
}

/// Frame interval scaled by a deterministic factor in `1 ± jitter`
fn jittered_interval(config: &SyntheticConfig, sequence: u64) -> Duration {
    let base = config.framerate.frame_interval();
    let jitter = config.jitter.clamp(0.0, 0.9);
    let factor = 1.0 + jitter * (hash01(sequence, 7) * 2.0 - 1.0);
    base.mul_f32(factor)
}

/// Pseudo-random value in [0, 1)
fn hash01(a: u64, b: u64) -> f32 {
    let p = (a as f32 * 127.1 + b as f32 * 311.7) * 0.01;
    (p.sin() * 43758.5453).fract().abs()
}

/// Render one frame: an ambient scene plus LED light falling off from the center
fn render_pattern(config: &SyntheticConfig, led_on: bool, sequence: u64) -> Vec<u8> {
    let width = config.width.max(1) as usize;
    let height = config.height.max(1) as usize;
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let max_r2 = cx * cx + cy * cy;

    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let falloff = 1.0 - ((dx * dx + dy * dy) / max_r2).min(1.0);

            // Slow horizontal gradient gives the scene some structure
            let mut value = config.ambient as f32 * (0.7 + 0.3 * x as f32 / width as f32);
            if led_on {
                value += config.led_gain as f32 * falloff;
            }
            value += (hash01((x + y * width) as u64, sequence) - 0.5) * 4.0;

            data.push(value.clamp(0.0, 255.0) as u8);
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_led_frames_are_brighter() {
        let config = SyntheticConfig::default();
        let dark = Frame::gray8(
            config.width,
            config.height,
            render_pattern(&config, false, 0),
            Instant::now(),
            0,
        );
        let lit = Frame::gray8(
            config.width,
            config.height,
            render_pattern(&config, true, 1),
            Instant::now(),
            1,
        );
        assert!(lit.mean_luma() > dark.mean_luma() + 20.0);
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let config = SyntheticConfig::default();
        let base = config.framerate.frame_interval();
        for seq in 0..100 {
            let interval = jittered_interval(&config, seq);
            assert!(interval >= base.mul_f32(0.69));
            assert!(interval <= base.mul_f32(1.31));
        }
    }

    #[test]
    fn test_factory_reports_backend() {
        let source = crate::backends::camera::create_source(SourceBackendType::Synthetic).unwrap();
        assert_eq!(source.backend_type(), SourceBackendType::Synthetic);
    }

    #[test]
    fn test_open_rejects_unknown_device() {
        let mut source = SyntheticSource::new();
        let stale = DeviceDescriptor::new("synthetic:gone", "Gone", SourceKind::Infrared);
        assert!(matches!(
            source.open(&stale),
            Err(BackendError::DeviceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_subscription_delivers_frames_in_order() {
        let mut source = SyntheticSource::with_config(SyntheticConfig {
            width: 16,
            height: 12,
            framerate: Framerate::from_int(200),
            jitter: 0.0,
            ..SyntheticConfig::default()
        });
        let devices = source.list_devices().unwrap();
        let format = source.open(&devices[0]).unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::channel(64);
        source.subscribe(&devices[0], &format, tx).unwrap();

        let mut last = None;
        for _ in 0..4 {
            let frame = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(frame.width, 16);
            if let Some(prev) = last {
                assert!(frame.sequence > prev);
            }
            last = Some(frame.sequence);
        }

        source.unsubscribe();
        assert!(!source.is_subscribed());
    }
}
