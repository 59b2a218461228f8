// SPDX-License-Identifier: GPL-3.0-only

//! Video encoder seam and the built-in YUV4MPEG2 encoder
//!
//! A [`RecordingSession`](super::RecordingSession) owns exactly one
//! [`VideoEncoder`]; nothing else writes to it. Encoders place frames on a
//! fixed timeline (frame `n` is shown at `n / framerate`), so pacing is the
//! session's job, not the encoder's.

use crate::backends::camera::Framerate;
use crate::media::ColorFrame;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Sink for a fixed-rate sequence of RGB frames
pub trait VideoEncoder: Send {
    /// Append one frame to the timeline
    fn write_frame(&mut self, frame: &ColorFrame) -> Result<(), String>;

    /// Flush and finalize the output; called once
    fn finish(&mut self) -> Result<(), String>;
}

/// Opens encoders for new recordings
pub trait EncoderFactory: Send {
    /// Open an encoder writing `width`x`height` frames at `framerate` to `path`
    fn open(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        framerate: Framerate,
    ) -> Result<Box<dyn VideoEncoder>, String>;

    /// File extension of the produced container
    fn extension(&self) -> &'static str;
}

/// Factory for [`Y4mEncoder`]
#[derive(Debug, Clone, Copy, Default)]
pub struct Y4mEncoderFactory;

impl EncoderFactory for Y4mEncoderFactory {
    fn open(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        framerate: Framerate,
    ) -> Result<Box<dyn VideoEncoder>, String> {
        Ok(Box::new(Y4mEncoder::create(path, width, height, framerate)?))
    }

    fn extension(&self) -> &'static str {
        "y4m"
    }
}

/// Uncompressed YUV4MPEG2 writer (4:4:4, full range BT.601)
///
/// Readable by ffmpeg, mpv and GStreamer's `y4mdec`, and needs no codec
/// libraries at runtime.
pub struct Y4mEncoder {
    writer: BufWriter<File>,
    width: u32,
    height: u32,
    /// Reused Y, U, V plane buffer
    planes: Vec<u8>,
    frames: u64,
}

impl Y4mEncoder {
    /// Create the output file and write the stream header
    pub fn create(
        path: &Path,
        width: u32,
        height: u32,
        framerate: Framerate,
    ) -> Result<Self, String> {
        if width == 0 || height == 0 {
            return Err(format!("invalid frame size {}x{}", width, height));
        }

        let file = File::create(path)
            .map_err(|e| format!("Failed to create {}: {}", path.display(), e))?;
        let mut writer = BufWriter::new(file);
        writeln!(
            writer,
            "YUV4MPEG2 W{} H{} F{}:{} Ip A1:1 C444 XCOLORRANGE=FULL",
            width, height, framerate.num, framerate.denom
        )
        .map_err(|e| format!("Failed to write header: {}", e))?;

        info!(path = %path.display(), width, height, fps = %framerate, "Opened Y4M encoder");

        Ok(Self {
            writer,
            width,
            height,
            planes: vec![0; width as usize * height as usize * 3],
            frames: 0,
        })
    }
}

impl VideoEncoder for Y4mEncoder {
    fn write_frame(&mut self, frame: &ColorFrame) -> Result<(), String> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(format!(
                "Frame size {}x{} doesn't match stream {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            ));
        }

        let plane_len = self.width as usize * self.height as usize;
        let (y_plane, chroma) = self.planes.split_at_mut(plane_len);
        let (u_plane, v_plane) = chroma.split_at_mut(plane_len);
        for (i, pixel) in frame.image.pixels().enumerate() {
            let [y, u, v] = rgb_to_ycbcr(pixel.0);
            y_plane[i] = y;
            u_plane[i] = u;
            v_plane[i] = v;
        }

        self.writer
            .write_all(b"FRAME\n")
            .and_then(|_| self.writer.write_all(&self.planes))
            .map_err(|e| format!("Failed to write frame {}: {}", self.frames, e))?;
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), String> {
        self.writer
            .flush()
            .map_err(|e| format!("Failed to flush recording: {}", e))?;
        debug!(frames = self.frames, "Y4M encoder finished");
        Ok(())
    }
}

/// Full-range BT.601 (JFIF) RGB → YCbCr
#[inline]
fn rgb_to_ycbcr([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = 128.0 - 0.168736 * r - 0.331264 * g + 0.5 * b;
    let cr = 128.0 + 0.5 * r - 0.418688 * g - 0.081312 * b;
    [
        y.round().clamp(0.0, 255.0) as u8,
        cb.round().clamp(0.0, 255.0) as u8,
        cr.round().clamp(0.0, 255.0) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::time::Instant;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> ColorFrame {
        ColorFrame {
            image: RgbImage::from_pixel(width, height, Rgb(rgb)),
            captured_at: Instant::now(),
            sequence: 0,
        }
    }

    #[test]
    fn test_gray_has_neutral_chroma() {
        assert_eq!(rgb_to_ycbcr([0, 0, 0]), [0, 128, 128]);
        assert_eq!(rgb_to_ycbcr([255, 255, 255]), [255, 128, 128]);
        assert_eq!(rgb_to_ycbcr([77, 77, 77]), [77, 128, 128]);
    }

    #[test]
    fn test_y4m_layout() {
        let path = std::env::temp_dir().join(format!("ircam-{}.y4m", uuid::Uuid::new_v4()));
        let mut encoder = Y4mEncoder::create(&path, 2, 2, Framerate::from_int(15)).unwrap();
        encoder.write_frame(&solid(2, 2, [255, 255, 255])).unwrap();
        encoder.write_frame(&solid(2, 2, [0, 0, 0])).unwrap();
        encoder.finish().unwrap();

        let data = std::fs::read(&path).unwrap();
        let header = b"YUV4MPEG2 W2 H2 F15:1 Ip A1:1 C444 XCOLORRANGE=FULL\n";
        assert!(data.starts_with(header));
        let frame_len = b"FRAME\n".len() + 2 * 2 * 3;
        assert_eq!(data.len(), header.len() + 2 * frame_len);
        assert_eq!(&data[header.len()..header.len() + 6], b"FRAME\n");
        assert_eq!(data[header.len() + 6], 255);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_size_mismatch_is_a_write_error() {
        let path = std::env::temp_dir().join(format!("ircam-{}.y4m", uuid::Uuid::new_v4()));
        let mut encoder = Y4mEncoder::create(&path, 4, 4, Framerate::from_int(15)).unwrap();
        assert!(encoder.write_frame(&solid(2, 2, [0, 0, 0])).is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_unwritable_path_fails_to_open() {
        let path = std::env::temp_dir()
            .join(format!("ircam-missing-{}", uuid::Uuid::new_v4()))
            .join("out.y4m");
        assert!(Y4mEncoderFactory.open(&path, 2, 2, Framerate::from_int(15)).is_err());
    }
}
