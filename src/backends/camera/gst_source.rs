// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer frame source
//!
//! Enumerates V4L2 video sources through a `DeviceMonitor` and captures
//! with:
//!
//! ```text
//! v4l2src → capsfilter (size, rate) → videoconvert → GRAY8/GRAY16 → appsink
//! ```
//!
//! The appsink callback maps each buffer without copying and hands it to
//! the session with `try_send`; when the session is busy the frame is
//! dropped here.

use super::FrameSource;
use super::types::*;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use gstreamer_video::{VideoFormat, VideoInfo};
use std::time::Instant;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

/// Seconds to wait for the pipeline to reach PLAYING
const START_TIMEOUT_SECS: u64 = 5;

/// Log drops and sample errors only every N frames
const FRAME_LOG_EVERY: u64 = 30;

/// Names of device properties that carry the V4L2 node path
const PATH_PROPERTIES: &[&str] = &["api.v4l2.path", "device.path", "object.path"];

/// Frame source backed by GStreamer's `v4l2src`
pub struct GStreamerSource {
    pipeline: Option<(gst::Pipeline, AppSink)>,
}

impl GStreamerSource {
    pub fn new() -> BackendResult<Self> {
        gst::init()
            .map_err(|e| BackendError::NotAvailable(format!("GStreamer init failed: {}", e)))?;
        Ok(Self { pipeline: None })
    }

    fn enumerate(&self) -> BackendResult<Vec<DeviceDescriptor>> {
        let monitor = gst::DeviceMonitor::new();
        let caps = gst::Caps::new_empty_simple("video/x-raw");
        monitor.add_filter(Some("Video/Source"), Some(&caps));
        monitor
            .start()
            .map_err(|e| BackendError::NotAvailable(format!("Device monitor failed: {}", e)))?;

        let mut devices = Vec::new();
        for device in monitor.devices() {
            let Some(path) = device_path(&device) else {
                debug!(name = %device.display_name(), "Skipping device without a node path");
                continue;
            };
            let name = device.display_name().to_string();
            let formats = device.caps().map(|c| formats_from_caps(&c)).unwrap_or_default();
            let kind = if looks_infrared(&name, &formats) {
                SourceKind::Infrared
            } else {
                SourceKind::Color
            };
            devices.push(DeviceDescriptor::new(path, name, kind).with_formats(formats));
        }
        monitor.stop();

        // IR sensors first
        devices.sort_by_key(|d| !d.is_infrared());
        info!(count = devices.len(), "Enumerated GStreamer video sources");
        Ok(devices)
    }
}

impl FrameSource for GStreamerSource {
    fn backend_type(&self) -> SourceBackendType {
        SourceBackendType::GStreamer
    }

    fn list_devices(&self) -> BackendResult<Vec<DeviceDescriptor>> {
        self.enumerate()
    }

    fn open(&mut self, device: &DeviceDescriptor) -> BackendResult<CameraFormat> {
        let current = self
            .enumerate()?
            .into_iter()
            .find(|d| d.id == device.id)
            .ok_or_else(|| BackendError::DeviceNotFound(device.name.clone()))?;

        // READY opens the node, which is where busy/permission errors show up
        let probe = gst::ElementFactory::make("v4l2src")
            .property("device", current.id.as_str())
            .build()
            .map_err(|e| BackendError::NotAvailable(format!("v4l2src unavailable: {}", e)))?;
        let ready = probe.set_state(gst::State::Ready);
        let _ = probe.set_state(gst::State::Null);
        ready.map_err(|_| BackendError::AccessDenied(current.name.clone()))?;

        let format = current.best_format().cloned().unwrap_or(CameraFormat {
            width: 640,
            height: 480,
            framerate: None,
            pixel_format: PixelFormat::Gray8,
        });
        debug!(device = %current.name, format = %format, "Opened device");
        Ok(format)
    }

    fn subscribe(
        &mut self,
        device: &DeviceDescriptor,
        format: &CameraFormat,
        sender: FrameSender,
    ) -> BackendResult<()> {
        self.unsubscribe();

        let mut caps = format!(
            "video/x-raw,width={},height={}",
            format.width, format.height
        );
        if let Some(rate) = format.framerate {
            caps.push_str(&format!(",framerate={}/{}", rate.num, rate.denom));
        }
        let description = format!(
            "v4l2src device=\"{}\" ! {} ! videoconvert ! video/x-raw,format={} ! appsink name=sink",
            device.id,
            caps,
            format.pixel_format.to_gst_format_string()
        );
        info!(pipeline = %description, "Creating capture pipeline");

        let pipeline = gst::parse::launch(&description)
            .map_err(|e| {
                BackendError::InitializationFailed(format!("Failed to parse pipeline: {}", e))
            })?
            .downcast::<gst::Pipeline>()
            .map_err(|_| BackendError::InitializationFailed("Not a pipeline".to_string()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| BackendError::InitializationFailed("Failed to get appsink".to_string()))?
            .dynamic_cast::<AppSink>()
            .map_err(|_| BackendError::InitializationFailed("Failed to cast appsink".to_string()))?;

        appsink.set_property("sync", false);
        appsink.set_property("max-buffers", 1u32);
        appsink.set_property("drop", true);
        appsink.set_property("enable-last-sample", false);

        let mut sequence: u64 = 0;
        let mut dropped: u64 = 0;
        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let captured_at = Instant::now();
                    let sample = appsink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                    let caps = sample.caps().ok_or(gst::FlowError::Error)?;
                    let info = VideoInfo::from_caps(caps).map_err(|e| {
                        if sequence % FRAME_LOG_EVERY == 0 {
                            error!(error = ?e, "Failed to read video info");
                        }
                        gst::FlowError::Error
                    })?;
                    let pixel_format = match info.format() {
                        VideoFormat::Gray8 => PixelFormat::Gray8,
                        VideoFormat::Gray16Le => PixelFormat::Gray16,
                        other => {
                            error!(format = ?other, "Unexpected sample format");
                            return Err(gst::FlowError::NotNegotiated);
                        }
                    };
                    let buffer = sample.buffer_owned().ok_or(gst::FlowError::Error)?;
                    let mapped = buffer
                        .into_mapped_buffer_readable()
                        .map_err(|_| gst::FlowError::Error)?;

                    let frame = Frame {
                        width: info.width(),
                        height: info.height(),
                        data: FrameData::from_mapped_buffer(mapped),
                        format: pixel_format,
                        stride: info.stride()[0] as u32,
                        captured_at,
                        sequence,
                        illuminated: None,
                    };
                    sequence += 1;

                    match sender.try_send(frame) {
                        Ok(()) => Ok(gst::FlowSuccess::Ok),
                        Err(TrySendError::Full(_)) => {
                            dropped += 1;
                            if dropped % FRAME_LOG_EVERY == 1 {
                                debug!(dropped, "Frame dropped (channel full)");
                            }
                            Ok(gst::FlowSuccess::Ok)
                        }
                        Err(TrySendError::Closed(_)) => Err(gst::FlowError::Eos),
                    }
                })
                .build(),
        );

        pipeline.set_state(gst::State::Playing).map_err(|e| {
            BackendError::AccessDenied(format!("Failed to start {}: {}", device.name, e))
        })?;
        let (result, state, _) = pipeline.state(gst::ClockTime::from_seconds(START_TIMEOUT_SECS));
        if result.is_err() || state != gst::State::Playing {
            warn!(state = ?state, "Capture pipeline did not reach PLAYING");
        }

        self.pipeline = Some((pipeline, appsink));
        Ok(())
    }

    fn unsubscribe(&mut self) {
        if let Some((pipeline, appsink)) = self.pipeline.take() {
            debug!("Stopping capture pipeline");
            appsink.set_callbacks(gstreamer_app::AppSinkCallbacks::builder().build());
            if let Err(e) = pipeline.set_state(gst::State::Null) {
                warn!(error = ?e, "Failed to stop capture pipeline");
            }
        }
    }

    fn is_subscribed(&self) -> bool {
        self.pipeline.is_some()
    }
}

impl Drop for GStreamerSource {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

fn device_path(device: &gst::Device) -> Option<String> {
    let props = device.properties()?;
    PATH_PROPERTIES
        .iter()
        .find_map(|key| props.get::<String>(*key).ok())
}

/// Fixed-size raw formats advertised in `caps`
fn formats_from_caps(caps: &gst::Caps) -> Vec<CameraFormat> {
    let mut formats = Vec::new();
    for structure in caps.iter() {
        let (Ok(width), Ok(height)) = (
            structure.get::<i32>("width"),
            structure.get::<i32>("height"),
        ) else {
            continue;
        };
        let pixel_format = structure
            .get::<&str>("format")
            .ok()
            .and_then(PixelFormat::from_gst_format)
            .unwrap_or(PixelFormat::Gray8);
        let framerate = structure
            .get::<gst::Fraction>("framerate")
            .ok()
            .filter(|f| f.numer() > 0 && f.denom() > 0)
            .map(|f| Framerate::new(f.numer() as u32, f.denom() as u32));

        let format = CameraFormat {
            width: width.max(0) as u32,
            height: height.max(0) as u32,
            framerate,
            pixel_format,
        };
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    formats
}

/// IR sensors expose luma-only formats or say so in their name
fn looks_infrared(name: &str, formats: &[CameraFormat]) -> bool {
    let upper = name.to_ascii_uppercase();
    upper.contains(" IR")
        || upper.contains("INFRARED")
        || formats
            .iter()
            .any(|f| f.pixel_format == PixelFormat::Gray16)
}
