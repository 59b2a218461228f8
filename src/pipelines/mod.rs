// SPDX-License-Identifier: GPL-3.0-only

//! Frame processing pipeline
//!
//! ```text
//! ┌──────────────┐   ┌────────────────────────┐   ┌─────────────┐
//! │ Frame source │ ─▶│ IlluminationClassifier │ ─▶│ FrameRouter │
//! │  (GRAY8/16)  │   │  RAW / ILLUM / UNKNOWN │   │ gate+color  │
//! └──────────────┘   └────────────────────────┘   └──────┬──────┘
//!                                         ┌──────────────┼───────────────┐
//!                                         ▼              ▼               ▼
//!                                      preview      snapshot       RecordingSession
//! ```
//!
//! Every stage runs synchronously per frame, in arrival order.
//!
//! # Modules
//!
//! - [`illumination`]: LED-state classification from brightness alternation
//! - [`router`]: filter gating, color mapping and fan-out
//! - [`photo`]: snapshot encoding
//! - [`video`]: paced recording and encoders

pub mod illumination;
pub mod photo;
pub mod router;
pub mod video;

pub use illumination::{ClassifiedFrame, Illumination, IlluminationClassifier};
pub use router::{FrameRouter, PreviewSink, RouteOutcome, SnapshotWriter};
