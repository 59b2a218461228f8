// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for IR camera operations
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Taking filtered, color-mapped photos
//! - Recording paced videos

use ircam::backends::camera::{DeviceDescriptor, SourceBackendType, create_source};
use ircam::config::Config;
use ircam::constants::{ColorMode, FilterMode, timing};
use ircam::errors::CaptureError;
use ircam::session::{CaptureSessionManager, SessionEvent};
use ircam::storage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// How often the record loop checks for Ctrl+C and refreshes progress
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Modes applied before capture starts
#[derive(Debug, Clone, Copy)]
pub struct CaptureModes {
    pub filter: Option<FilterMode>,
    pub color: Option<ColorMode>,
}

/// List all available cameras
pub fn list_cameras(backend: SourceBackendType) -> Result<(), Box<dyn std::error::Error>> {
    let source = create_source(backend)?;
    let cameras = source.list_devices()?;

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras ({}):", source.backend_type());
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        let kind = if camera.is_infrared() { " [IR]" } else { "" };
        println!("  [{}] {}{}", index, camera.name, kind);

        if !camera.formats.is_empty() {
            // Show top 3 formats, largest first
            let mut formats = camera.formats.clone();
            formats.sort_by_key(|f| std::cmp::Reverse(f.width as u64 * f.height as u64));
            let shown: Vec<String> = formats.iter().take(3).map(|f| f.to_string()).collect();
            println!("      Formats: {}", shown.join(", "));
        }
        println!();
    }

    Ok(())
}

/// Build a manager with a device selected
///
/// Picks the camera at `camera_index`, else the last-used camera, else the
/// first one listed.
pub fn open_session(
    backend: SourceBackendType,
    camera_index: Option<usize>,
    config: Config,
) -> Result<CaptureSessionManager, Box<dyn std::error::Error>> {
    let source = create_source(backend)?;
    let cameras = source.list_devices()?;
    if cameras.is_empty() {
        return Err("No cameras found".into());
    }

    let camera = pick_camera(&cameras, camera_index, config.last_device_id.as_deref())?;
    println!("Using camera: {}", camera.name);

    let mut manager = CaptureSessionManager::new(source, config);
    manager.select_device(camera)?;
    Ok(manager)
}

fn pick_camera(
    cameras: &[DeviceDescriptor],
    camera_index: Option<usize>,
    last_device_id: Option<&str>,
) -> Result<DeviceDescriptor, Box<dyn std::error::Error>> {
    if let Some(index) = camera_index {
        return cameras.get(index).cloned().ok_or_else(|| {
            format!(
                "Camera index {} out of range (0-{})",
                index,
                cameras.len().saturating_sub(1)
            )
            .into()
        });
    }

    let remembered = last_device_id.and_then(|id| cameras.iter().find(|c| c.id == id));
    remembered
        .or_else(|| cameras.first())
        .cloned()
        .ok_or_else(|| "No cameras found".into())
}

fn apply_modes(manager: &mut CaptureSessionManager, modes: CaptureModes) {
    if let Some(filter) = modes.filter {
        manager.set_filter_mode(filter);
    }
    if let Some(color) = modes.color {
        manager.set_color_mode(color);
    }
}

/// Resolve the output path: an explicit file, a file in an explicit
/// directory, or a file in `default_dir`
fn resolve_output(
    output: Option<PathBuf>,
    default_dir: &Path,
    file_name: &str,
) -> std::io::Result<PathBuf> {
    match output {
        Some(path) if path.is_dir() => storage::prepare_output(&path, file_name),
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Ok(path)
        }
        None => storage::prepare_output(default_dir, file_name),
    }
}

/// Take a photo of the next frame that passes the filter
pub fn take_photo(
    mut manager: CaptureSessionManager,
    output: Option<PathBuf>,
    modes: CaptureModes,
) -> Result<(), Box<dyn std::error::Error>> {
    apply_modes(&mut manager, modes);
    let photo_dir = manager
        .config()
        .photo_dir
        .clone()
        .unwrap_or_else(storage::default_photo_dir);
    let output_path = resolve_output(output, &photo_dir, &storage::photo_file_name())?;

    println!(
        "Capturing... [FILTER: {}] [COLOR: {}]",
        manager.filter_mode(),
        manager.color_mode()
    );

    let rt = tokio::runtime::Runtime::new()?;
    let saved = rt.block_on(async {
        manager.start_streaming()?;

        // Let exposure and the classifier settle (camera warm-up)
        let warmup = tokio::time::timeout(timing::PHOTO_WARMUP, async {
            while manager.pump_next().await.is_some() {}
        })
        .await;
        if warmup.is_ok() {
            // Pump ended early: the source went away
            return Err(CaptureError::NoFrameAvailable);
        }
        debug!("Warm-up done");

        let mut reply = manager.snapshot(output_path.clone())?;
        let waited = tokio::time::timeout(timing::FIRST_FRAME_TIMEOUT, async {
            loop {
                if let Ok(result) = reply.try_recv() {
                    return result;
                }
                if manager.pump_next().await.is_none() {
                    return reply.try_recv().unwrap_or(Err(CaptureError::NoFrameAvailable));
                }
            }
        })
        .await;

        let result = waited.unwrap_or(Err(CaptureError::NoFrameAvailable));
        manager.stop_streaming()?;
        result
    });

    match saved {
        Ok(path) => {
            println!("Photo saved: {}", path.display());
            Ok(())
        }
        Err(CaptureError::NoFrameAvailable) if manager.filter_mode() != FilterMode::Off => Err(
            format!(
                "No {} frame arrived; the camera may not alternate its emitter",
                manager.filter_mode()
            )
            .into(),
        ),
        Err(e) => Err(e.into()),
    }
}

/// Record a video for `duration` seconds or until Ctrl+C
pub fn record_video(
    mut manager: CaptureSessionManager,
    duration: u64,
    output: Option<PathBuf>,
    modes: CaptureModes,
) -> Result<(), Box<dyn std::error::Error>> {
    apply_modes(&mut manager, modes);
    let video_dir = manager
        .config()
        .video_dir
        .clone()
        .unwrap_or_else(storage::default_video_dir);
    let file_name = storage::video_file_name(manager.filter_mode(), manager.recording_extension());
    let output_path = resolve_output(output, &video_dir, &file_name)?;

    let fps = manager.config().recording.fps_for(manager.filter_mode());
    if let Some(format) = manager.format() {
        println!(
            "Recording format: {}x{} @ {}fps [FILTER: {}] [COLOR: {}]",
            format.width,
            format.height,
            fps,
            manager.filter_mode(),
            manager.color_mode()
        );
    }
    println!("Output: {}", output_path.display());
    println!("Duration: {} seconds", duration);

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    let mut events = manager.subscribe_events();
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        manager.start_streaming()?;
        manager.start_recording(&output_path)?;

        println!();
        println!("Recording... (press Ctrl+C to stop early)");

        let start = Instant::now();
        let target_duration = Duration::from_secs(duration);
        while start.elapsed() < target_duration {
            if stop_flag.load(Ordering::SeqCst) {
                println!();
                println!("Stopping early...");
                break;
            }

            match tokio::time::timeout(PROGRESS_INTERVAL, manager.pump_next()).await {
                Ok(None) => {
                    println!();
                    println!("Camera disconnected");
                    break;
                }
                Ok(Some(_)) | Err(_) => {}
            }
            if !manager.is_recording() {
                break;
            }

            // Print progress
            let elapsed = start.elapsed().as_secs();
            print!("\rRecording: {:02}:{:02}", elapsed / 60, elapsed % 60);
            std::io::Write::flush(&mut std::io::stdout())?;
        }
        println!();
        Ok::<_, Box<dyn std::error::Error>>(())
    })?;

    if !manager.is_recording() {
        // The session ended on its own; report why
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::RecordingAborted { error, summary } = event {
                println!(
                    "Partial video saved: {} ({} frames)",
                    summary.path.display(),
                    summary.frames_written
                );
                return Err(error.into());
            }
        }
        return Err(CaptureError::NotRecording.into());
    }

    let summary = manager.stop_recording()?;
    manager.stop_streaming()?;
    info!(?summary, "Recording finished");

    println!("Video saved: {}", summary.path.display());
    println!(
        "Frames: {} written ({} from camera, {} repeated to hold the frame rate), {:.1}s",
        summary.frames_written,
        summary.frames_accepted,
        summary.frames_duplicated,
        summary.duration.as_secs_f64()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ircam::backends::camera::SourceKind;

    fn cameras() -> Vec<DeviceDescriptor> {
        vec![
            DeviceDescriptor::new("a", "Camera A", SourceKind::Infrared),
            DeviceDescriptor::new("b", "Camera B", SourceKind::Color),
        ]
    }

    #[test]
    fn test_pick_camera_prefers_index_then_last_used() {
        let cameras = cameras();
        assert_eq!(pick_camera(&cameras, Some(1), Some("a")).unwrap().id, "b");
        assert_eq!(pick_camera(&cameras, None, Some("b")).unwrap().id, "b");
        assert_eq!(pick_camera(&cameras, None, Some("gone")).unwrap().id, "a");
        assert!(pick_camera(&cameras, Some(5), None).is_err());
    }

    #[test]
    fn test_resolve_output_into_directory() {
        let dir = std::env::temp_dir().join(format!("ircam-cli-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = resolve_output(Some(dir.clone()), Path::new("/unused"), "x.jpg").unwrap();
        assert_eq!(path, dir.join("x.jpg"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
