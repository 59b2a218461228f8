// SPDX-License-Identifier: GPL-3.0-only

//! Per-pixel image transforms
//!
//! - [`colormap`]: intensity → RGB color mapping for the color modes

pub mod colormap;

pub use colormap::ColorFrame;
