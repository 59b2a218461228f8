// SPDX-License-Identifier: GPL-3.0-only

//! Video recording
//!
//! - [`recorder`]: the paced [`RecordingSession`]
//! - [`encoder`]: the [`VideoEncoder`] seam and the built-in Y4M encoder
//! - `gst_encoder`: MJPEG/AVI through GStreamer (feature `gstreamer`)

pub mod encoder;
#[cfg(feature = "gstreamer")]
pub mod gst_encoder;
pub mod recorder;

pub use encoder::{EncoderFactory, VideoEncoder, Y4mEncoder, Y4mEncoderFactory};
#[cfg(feature = "gstreamer")]
pub use gst_encoder::{GstEncoder, GstEncoderFactory};
pub use recorder::{RecordingSession, RecordingSummary};

/// Encoder factory for this build
///
/// GStreamer builds record MJPEG/AVI; others write uncompressed Y4M.
pub fn default_encoder_factory() -> Box<dyn EncoderFactory> {
    #[cfg(feature = "gstreamer")]
    {
        Box::new(GstEncoderFactory::default())
    }
    #[cfg(not(feature = "gstreamer"))]
    {
        Box::new(Y4mEncoderFactory)
    }
}
