// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle management for capture loops
//!
//! Frame sources that produce frames on their own thread (the synthetic
//! source, polled devices) run their loop through a [`CaptureLoopController`]
//! so that stopping a subscription always joins the producing thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Granularity of stop-signal checks while a loop is waiting
const STOP_POLL_SLICE: Duration = Duration::from_millis(5);

/// Action returned by the capture loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Run the next iteration immediately
    Continue,
    /// Sleep before the next iteration (stop requests still interrupt the wait)
    Wait(Duration),
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a capture loop running in a separate thread
pub struct CaptureLoopController {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl CaptureLoopController {
    /// Start a capture loop with per-thread state
    ///
    /// `init_fn` runs once on the new thread; if it fails the thread exits
    /// without running `loop_fn`. `loop_fn` is then called until it returns
    /// [`LoopAction::Stop`] or [`stop`](Self::stop) is called.
    pub fn start_with_init<S, I, F>(name: &str, init_fn: I, mut loop_fn: F) -> Self
    where
        S: Send + 'static,
        I: FnOnce() -> Result<S, String> + Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, "Starting capture loop");

        let thread_handle = thread::spawn(move || {
            let mut state = match init_fn() {
                Ok(s) => s,
                Err(e) => {
                    warn!(name = %name_clone, error = %e, "Capture loop initialization failed");
                    return;
                }
            };

            while !stop_signal_clone.load(Ordering::SeqCst) {
                match loop_fn(&mut state) {
                    LoopAction::Continue => {}
                    LoopAction::Wait(duration) => {
                        interruptible_sleep(duration, &stop_signal_clone);
                    }
                    LoopAction::Stop => {
                        debug!(name = %name_clone, "Loop requested stop");
                        break;
                    }
                }
            }

            info!(name = %name_clone, "Capture loop thread exiting");
        });

        Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        }
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Capture loop thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Capture loop thread finished");
            }
        }
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            self.stop();
        }
    }
}

fn interruptible_sleep(duration: Duration, stop_signal: &AtomicBool) {
    let deadline = Instant::now() + duration;
    loop {
        if stop_signal.load(Ordering::SeqCst) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep((deadline - now).min(STOP_POLL_SLICE));
    }
}
