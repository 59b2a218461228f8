// SPDX-License-Identifier: GPL-3.0-only

//! Photo capture
//!
//! Snapshots are taken from the routed stream: the next frame that passes
//! the active filter is color-mapped like the preview, then encoded here.

pub mod encoding;

pub use encoding::{EncodingFormat, EncodingQuality, ImageSnapshotWriter};
