// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer-backed MJPEG/AVI encoder
//!
//! ```text
//! appsrc (RGB) → videoconvert → jpegenc → avimux → filesink
//! ```
//!
//! Buffers carry explicit timestamps (`n × interval`), so duplicated pacing
//! frames occupy their own slot on the timeline.

use super::encoder::{EncoderFactory, VideoEncoder};
use crate::backends::camera::Framerate;
use crate::media::ColorFrame;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app::AppSrc;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// How long `finish` waits for the muxer to drain
const EOS_TIMEOUT_SECS: u64 = 5;

/// Factory for [`GstEncoder`]
#[derive(Debug, Clone, Copy)]
pub struct GstEncoderFactory {
    /// jpegenc quality (0-100)
    pub quality: u8,
}

impl Default for GstEncoderFactory {
    fn default() -> Self {
        Self { quality: 85 }
    }
}

impl EncoderFactory for GstEncoderFactory {
    fn open(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        framerate: Framerate,
    ) -> Result<Box<dyn VideoEncoder>, String> {
        Ok(Box::new(GstEncoder::new(
            path,
            width,
            height,
            framerate,
            self.quality,
        )?))
    }

    fn extension(&self) -> &'static str {
        "avi"
    }
}

/// Recording pipeline fed frame by frame through an appsrc
pub struct GstEncoder {
    pipeline: gst::Pipeline,
    appsrc: AppSrc,
    width: u32,
    height: u32,
    frame_duration: gst::ClockTime,
    frames: u64,
    finished: bool,
}

impl GstEncoder {
    pub fn new(
        path: &Path,
        width: u32,
        height: u32,
        framerate: Framerate,
        quality: u8,
    ) -> Result<Self, String> {
        info!(
            path = %path.display(),
            width,
            height,
            fps = %framerate,
            "Creating GStreamer recording pipeline"
        );

        gst::init().map_err(|e| format!("Failed to initialize GStreamer: {}", e))?;

        let pipeline = gst::Pipeline::new();
        let make = |factory: &str| {
            gst::ElementFactory::make(factory)
                .build()
                .map_err(|e| format!("Failed to create {}: {}", factory, e))
        };

        let appsrc = make("appsrc")?;
        let convert = make("videoconvert")?;
        let jpegenc = make("jpegenc")?;
        let avimux = make("avimux")?;
        let filesink = make("filesink")?;

        jpegenc.set_property("quality", quality.min(100) as i32);
        filesink.set_property("location", path.to_string_lossy().as_ref());

        let appsrc = appsrc
            .downcast::<AppSrc>()
            .map_err(|_| "Failed to downcast to AppSrc".to_string())?;

        let caps = gst::Caps::builder("video/x-raw")
            .field("format", "RGB")
            .field("width", width as i32)
            .field("height", height as i32)
            .field(
                "framerate",
                gst::Fraction::new(framerate.num as i32, framerate.denom as i32),
            )
            .build();
        appsrc.set_caps(Some(&caps));
        appsrc.set_format(gst::Format::Time);
        appsrc.set_is_live(false);
        appsrc.set_do_timestamp(false);

        pipeline
            .add_many([appsrc.upcast_ref(), &convert, &jpegenc, &avimux, &filesink])
            .map_err(|e| format!("Failed to add elements: {}", e))?;
        gst::Element::link_many([appsrc.upcast_ref(), &convert, &jpegenc, &avimux, &filesink])
            .map_err(|e| format!("Failed to link elements: {}", e))?;

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| format!("Failed to start recording pipeline: {}", e))?;

        let interval = framerate.frame_interval();
        Ok(Self {
            pipeline,
            appsrc,
            width,
            height,
            frame_duration: gst::ClockTime::from_nseconds(interval.as_nanos() as u64),
            frames: 0,
            finished: false,
        })
    }

    /// Surface any error the pipeline posted since the last check
    fn check_bus(&self) -> Result<(), String> {
        let Some(bus) = self.pipeline.bus() else {
            return Ok(());
        };
        while let Some(msg) = bus.pop_filtered(&[gst::MessageType::Error]) {
            if let gst::MessageView::Error(err) = msg.view() {
                error!(
                    error = %err.error(),
                    debug = ?err.debug(),
                    "GStreamer error during recording"
                );
                return Err(format!("Encoder error: {}", err.error()));
            }
        }
        Ok(())
    }
}

impl VideoEncoder for GstEncoder {
    fn write_frame(&mut self, frame: &ColorFrame) -> Result<(), String> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(format!(
                "Frame size {}x{} doesn't match pipeline {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            ));
        }
        self.check_bus()?;

        let raw = frame.image.as_raw();
        let mut buffer = gst::Buffer::with_size(raw.len())
            .map_err(|e| format!("Failed to create buffer: {}", e))?;
        {
            let buffer_ref = buffer
                .get_mut()
                .ok_or_else(|| "Failed to get mutable buffer reference".to_string())?;
            buffer_ref.set_pts(self.frame_duration * self.frames);
            buffer_ref.set_duration(self.frame_duration);
            let mut map = buffer_ref
                .map_writable()
                .map_err(|e| format!("Failed to map buffer: {}", e))?;
            map.copy_from_slice(raw);
        }

        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| format!("Failed to push frame: {:?}", e))?;
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), String> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        debug!(frames = self.frames, "Sending EOS to recording pipeline");
        if let Err(e) = self.appsrc.end_of_stream() {
            warn!(?e, "Failed to send EOS");
        }

        let mut result = Ok(());
        if let Some(bus) = self.pipeline.bus() {
            match bus.timed_pop_filtered(
                gst::ClockTime::from_seconds(EOS_TIMEOUT_SECS),
                &[gst::MessageType::Eos, gst::MessageType::Error],
            ) {
                Some(msg) => {
                    if let gst::MessageView::Error(err) = msg.view() {
                        result = Err(format!("Encoder error: {}", err.error()));
                    }
                }
                None => warn!("Timed out waiting for recording EOS"),
            }
        }

        self.pipeline
            .set_state(gst::State::Null)
            .map_err(|e| format!("Failed to stop pipeline: {}", e))?;
        result
    }
}

impl Drop for GstEncoder {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}
