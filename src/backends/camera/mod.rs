// SPDX-License-Identifier: GPL-3.0-only

//! Frame source abstraction
//!
//! The platform capture API is consumed through the [`FrameSource`] trait:
//! it enumerates devices, opens one, and pushes [`Frame`]s into a channel
//! owned by the session manager.
//!
//! ```text
//! ┌──────────────────────┐
//! │ CaptureSessionManager│  ← owns the FrameReceiver
//! └──────────┬───────────┘
//!            │ subscribe(sender)
//!            ▼
//! ┌──────────────────────┐
//! │  FrameSource trait   │
//! └──────────┬───────────┘
//!       ┌────┴─────┐
//!       ▼          ▼
//!  Synthetic   GStreamer (feature)
//! ```

pub mod frame_loop;
#[cfg(feature = "gstreamer")]
pub mod gst_source;
pub mod synthetic;
pub mod types;

pub use types::*;

/// Asynchronous frame source
///
/// Implementations deliver frames with `try_send` on the sender passed to
/// [`subscribe`](FrameSource::subscribe); when the channel is full the frame
/// is dropped at the source, never queued unboundedly.
pub trait FrameSource: Send {
    /// Backend identifier
    fn backend_type(&self) -> SourceBackendType;

    /// Enumerate devices this source can capture from
    fn list_devices(&self) -> BackendResult<Vec<DeviceDescriptor>>;

    /// Validate a descriptor and negotiate its capture format
    ///
    /// Fails with [`BackendError::DeviceNotFound`] for stale descriptors and
    /// [`BackendError::AccessDenied`] when the device cannot be opened.
    fn open(&mut self, device: &DeviceDescriptor) -> BackendResult<CameraFormat>;

    /// Start delivering frames from `device` into `sender`
    fn subscribe(
        &mut self,
        device: &DeviceDescriptor,
        format: &CameraFormat,
        sender: FrameSender,
    ) -> BackendResult<()>;

    /// Stop delivering frames; a no-op when not subscribed
    fn unsubscribe(&mut self);

    /// Whether a subscription is active
    fn is_subscribed(&self) -> bool;
}

/// Create a frame source of the requested type
pub fn create_source(backend: SourceBackendType) -> BackendResult<Box<dyn FrameSource>> {
    match backend {
        SourceBackendType::Synthetic => Ok(Box::new(synthetic::SyntheticSource::new())),
        #[cfg(feature = "gstreamer")]
        SourceBackendType::GStreamer => Ok(Box::new(gst_source::GStreamerSource::new()?)),
        #[cfg(not(feature = "gstreamer"))]
        SourceBackendType::GStreamer => Err(BackendError::NotAvailable(
            "built without the `gstreamer` feature".to_string(),
        )),
    }
}

/// Default source for this build
pub fn default_source_type() -> SourceBackendType {
    if cfg!(feature = "gstreamer") {
        SourceBackendType::GStreamer
    } else {
        SourceBackendType::Synthetic
    }
}
