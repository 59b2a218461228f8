// SPDX-License-Identifier: GPL-3.0-only

//! IR Camera - infrared camera viewer with illumination filtering
//!
//! IR cameras used for face authentication pulse their emitter LED every
//! other frame. This crate classifies each frame as lit or unlit from the
//! brightness alternation, lets the user keep only one class, colors the
//! result and fans it out to preview, snapshots and paced recording.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: frame source abstraction (synthetic, GStreamer)
//! - [`pipelines`]: classification, routing, photo and video pipelines
//! - [`media`]: color mapping
//! - [`session`]: the capture session state machine and frame pump
//! - [`config`]: user configuration handling
//! - [`storage`]: output locations and file naming
//! - [`terminal`]: the terminal viewer
//!
//! # Example
//!
//! ```no_run
//! use ircam::backends::camera::{SourceBackendType, create_source};
//! use ircam::{CaptureSessionManager, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = create_source(SourceBackendType::Synthetic)?;
//! let device = source.list_devices()?.remove(0);
//! let mut manager = CaptureSessionManager::new(source, Config::default());
//! manager.select_device(device)?;
//! manager.start_streaming()?;
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod media;
pub mod pipelines;
pub mod session;
pub mod storage;
pub mod terminal;

// Re-export commonly used types
pub use config::Config;
pub use constants::{ColorMode, FilterMode};
pub use errors::{CaptureError, CaptureResult};
pub use pipelines::Illumination;
pub use session::{CaptureSessionManager, FrameOutcome, SessionEvent, SessionState};
