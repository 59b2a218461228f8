// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for frame capture
//!
//! - [`camera`]: frame sources with device enumeration and frame delivery
//!
//! The session never talks to a capture API directly; everything goes
//! through [`camera::FrameSource`].

pub mod camera;
