// SPDX-License-Identifier: GPL-3.0-only

//! Capture session control
//!
//! ```text
//!   Idle ──select_device──▶ DeviceSelected ──start_streaming──▶ Streaming
//!                                ▲                                 │
//!                                └──────── stop_streaming ─────────┘
//! ```
//!
//! Recording is a flag on top of `Streaming`; stopping the stream finalizes
//! it first.

pub mod manager;
pub mod state;

pub use manager::CaptureSessionManager;
pub use state::{FrameOutcome, SessionEvent, SessionState};
