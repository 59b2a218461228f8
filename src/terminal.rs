// SPDX-License-Identifier: GPL-3.0-only

//! Terminal-based IR camera viewer
//!
//! Renders the routed preview to the terminal using Unicode half-block
//! characters for improved vertical resolution, and maps keys onto the
//! session controls.

use crate::constants::timing;
use crate::media::ColorFrame;
use crate::pipelines::router::{PreviewReceiver, preview_channel};
use crate::session::{CaptureSessionManager, SessionEvent};
use crate::storage;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    widgets::Widget,
};
use std::io::{self, stdout};
use std::path::PathBuf;
use std::time::Instant;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{error, info, warn};

/// Where captures from the viewer are written
#[derive(Debug, Clone)]
pub struct OutputDirs {
    pub photos: PathBuf,
    pub videos: PathBuf,
}

/// Run the terminal viewer on a manager with a selected device
pub fn run(
    manager: CaptureSessionManager,
    dirs: OutputDirs,
) -> Result<(), Box<dyn std::error::Error>> {
    let (preview, receiver) = preview_channel();
    let mut manager = manager.with_preview(Box::new(preview));
    manager.start_streaming()?;

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let result = run_app(&mut terminal, &mut manager, receiver, &dirs);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Some(summary) = manager.stop_streaming()? {
        info!(path = %summary.path.display(), "Recording finalized on exit");
    }

    // Remember modes and camera for the next run
    let mut config = manager.config().clone();
    config.filter_mode = manager.filter_mode();
    config.color_mode = manager.color_mode();
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
    result
}

/// Keys the viewer reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Photo,
    ToggleRecording,
    CycleFilter,
    CycleColor,
    SwitchCamera,
    ToggleHelp,
    Quit,
}

fn command_for(code: KeyCode, modifiers: KeyModifiers) -> Option<Command> {
    if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
        return Some(Command::Quit);
    }
    match code {
        KeyCode::Char('p') => Some(Command::Photo),
        KeyCode::Char('r') => Some(Command::ToggleRecording),
        KeyCode::Char('f') => Some(Command::CycleFilter),
        KeyCode::Char('c') => Some(Command::CycleColor),
        KeyCode::Char('s') => Some(Command::SwitchCamera),
        KeyCode::Char('h') => Some(Command::ToggleHelp),
        KeyCode::Char('q') | KeyCode::Esc => Some(Command::Quit),
        _ => None,
    }
}

/// Latest status text and when it was posted
struct Status {
    message: Option<(String, Instant)>,
    show_help: bool,
}

impl Status {
    fn post(&mut self, message: String) {
        self.show_help = false;
        self.message = Some((message, Instant::now()));
    }

    fn current(&self) -> Option<&str> {
        match &self.message {
            Some((msg, at)) if at.elapsed() < timing::STATUS_DISPLAY_TIME => Some(msg),
            _ => None,
        }
    }
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    manager: &mut CaptureSessionManager,
    preview: PreviewReceiver,
    dirs: &OutputDirs,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut events = manager.subscribe_events();
    let frame_widget = FrameWidget { preview };
    let mut status = Status {
        message: None,
        show_help: false,
    };

    loop {
        // Run every queued frame through the pipeline; the preview keeps the newest
        manager.drain_pending();

        loop {
            match events.try_recv() {
                Ok(event) => {
                    if matches!(event, SessionEvent::RecordingAborted { .. }) {
                        error!(status = %event.status_message(), "Recording aborted");
                    }
                    status.post(event.status_message());
                }
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }

        let bar_text = status_text(manager, &status);
        terminal.draw(|f| {
            let area = f.area();

            // Reserve bottom line for status
            let camera_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(1),
            };
            f.render_widget(&frame_widget, camera_area);

            let status_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };
            f.render_widget(
                StatusBar {
                    message: &bar_text,
                    recording: manager.is_recording(),
                },
                status_area,
            );
        })?;

        // Handle input with timeout for frame updates
        if event::poll(timing::UI_TICK)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            let Some(command) = command_for(key.code, key.modifiers) else {
                continue;
            };
            if command == Command::Quit {
                break;
            }
            if let Err(e) = handle_command(command, manager, dirs, &mut status) {
                error!(error = %e, ?command, "Command failed");
                status.post(format!("Error: {}", e));
            }
        }
    }

    Ok(())
}

fn handle_command(
    command: Command,
    manager: &mut CaptureSessionManager,
    dirs: &OutputDirs,
    status: &mut Status,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Photo => {
            let path = storage::prepare_output(&dirs.photos, &storage::photo_file_name())?;
            // Result arrives as a SnapshotSaved/SnapshotFailed event
            drop(manager.snapshot(path)?);
        }
        Command::ToggleRecording => {
            if manager.is_recording() {
                manager.stop_recording()?;
            } else {
                let name =
                    storage::video_file_name(manager.filter_mode(), manager.recording_extension());
                let path = storage::prepare_output(&dirs.videos, &name)?;
                manager.start_recording(&path)?;
            }
        }
        Command::CycleFilter => {
            manager.cycle_filter_mode();
        }
        Command::CycleColor => {
            manager.cycle_color_mode();
        }
        Command::SwitchCamera => {
            let device = manager.next_device()?;
            info!(device = %device.name, "Switched camera");
        }
        Command::ToggleHelp => {
            status.show_help = !status.show_help;
            status.message = None;
        }
        Command::Quit => {}
    }
    Ok(())
}

fn status_text(manager: &CaptureSessionManager, status: &Status) -> String {
    let modes = format!(
        "[FILTER: {}] [COLOR: {}]",
        manager.filter_mode(),
        manager.color_mode()
    );
    let detail = if status.show_help {
        "p: Photo | r: Record | f: Filter | c: Color | s: Switch camera | h: Help | q/Ctrl+C: Quit"
            .to_string()
    } else if let Some(message) = status.current() {
        message.to_string()
    } else {
        "'p' photo | 'r' record | 'f' filter | 'c' color | 's' switch | 'h' help | 'q' quit"
            .to_string()
    };
    format!("{} {}", modes, detail)
}

/// Widget that renders the latest preview frame using half-block characters
struct FrameWidget {
    preview: PreviewReceiver,
}

impl Widget for &FrameWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let latest = self.preview.borrow();
        let Some(frame) = latest.as_ref().filter(|f| f.width() > 0 && f.height() > 0) else {
            // No frame yet - show placeholder
            let msg = "Waiting for camera...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, ratatui::style::Style::default());
            }
            return;
        };

        // Each terminal cell displays 2 vertical pixels
        let frame_aspect = frame.width() as f64 / frame.height() as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            // Terminal is wider - fit to height
            let h = term_height;
            let w = h * frame_aspect;
            (w as u16, (h / 2.0) as u16)
        } else {
            // Terminal is taller - fit to width
            let w = term_width;
            let h = w / frame_aspect;
            (w as u16, (h / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        // Center the image
        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = frame.width() as f64 / display_width as f64;
        let y_scale = frame.height() as f64 / (display_height * 2) as f64;

        // Upper half (▀) colored with fg, lower half with bg
        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;
                if term_x >= area.x + area.width || term_y >= area.y + area.height {
                    continue;
                }

                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(sample_pixel(frame, src_x, src_y_top));
                    cell.set_bg(sample_pixel(frame, src_x, src_y_bottom));
                }
            }
        }
    }
}

fn sample_pixel(frame: &ColorFrame, x: u32, y: u32) -> Color {
    let x = x.min(frame.width() - 1);
    let y = y.min(frame.height() - 1);
    let [r, g, b] = frame.image.get_pixel(x, y).0;
    Color::Rgb(r, g, b)
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
    recording: bool,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bg = if self.recording {
            Color::Red
        } else {
            Color::DarkGray
        };

        // Fill background
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(bg);
            }
        }

        let prefix = if self.recording { "● REC " } else { "" };
        let text: String = prefix
            .chars()
            .chain(self.message.chars())
            .take(area.width as usize)
            .collect();

        buf.set_string(
            area.x,
            area.y,
            text,
            ratatui::style::Style::default().fg(Color::White).bg(bg),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_bindings() {
        let none = KeyModifiers::NONE;
        assert_eq!(command_for(KeyCode::Char('p'), none), Some(Command::Photo));
        assert_eq!(
            command_for(KeyCode::Char('r'), none),
            Some(Command::ToggleRecording)
        );
        assert_eq!(command_for(KeyCode::Char('c'), none), Some(Command::CycleColor));
        assert_eq!(
            command_for(KeyCode::Char('c'), KeyModifiers::CONTROL),
            Some(Command::Quit)
        );
        assert_eq!(command_for(KeyCode::Char('x'), none), None);
    }

    #[test]
    fn test_status_message_expires() {
        let mut status = Status {
            message: None,
            show_help: true,
        };
        status.post("Saved: a.jpg".to_string());
        assert!(!status.show_help);
        assert_eq!(status.current(), Some("Saved: a.jpg"));

        status.message = Some((
            "old".to_string(),
            Instant::now() - timing::STATUS_DISPLAY_TIME * 2,
        ));
        assert_eq!(status.current(), None);
    }
}
