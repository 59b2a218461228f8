// SPDX-License-Identifier: GPL-3.0-only

//! Intensity to color mapping
//!
//! Converts single-channel IR frames into RGB images:
//! - OFF: grayscale replicated across channels
//! - GREEN: night-vision style, green channel only
//! - HEAT: black → red → yellow → white
//! - JET: blue → cyan → green → yellow → red
//!
//! Gradients are piecewise-linear over fixed control points and evaluated
//! through a 256-entry lookup table, so mapping a frame is one table lookup
//! per pixel. 16-bit input is reduced to its high byte first.

use crate::backends::camera::Frame;
use crate::constants::ColorMode;
use image::{Rgb, RgbImage};
use std::sync::OnceLock;
use std::time::Instant;

/// Control points as (position 0..=1, color)
type ControlPoints = &'static [(f32, [u8; 3])];

const HEAT_POINTS: ControlPoints = &[
    (0.0, [0, 0, 0]),
    (1.0 / 3.0, [255, 0, 0]),
    (2.0 / 3.0, [255, 255, 0]),
    (1.0, [255, 255, 255]),
];

const JET_POINTS: ControlPoints = &[
    (0.0, [0, 0, 255]),
    (0.25, [0, 255, 255]),
    (0.5, [0, 255, 0]),
    (0.75, [255, 255, 0]),
    (1.0, [255, 0, 0]),
];

type Lut = [[u8; 3]; 256];

/// A color-mapped frame ready for display, snapshot or recording
#[derive(Debug, Clone)]
pub struct ColorFrame {
    pub image: RgbImage,
    /// Capture time of the source frame
    pub captured_at: Instant,
    /// Sequence number of the source frame
    pub sequence: u64,
}

impl ColorFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Map a frame through `mode`
///
/// Output has the same dimensions, timestamp and sequence number as the input.
pub fn apply(frame: &Frame, mode: ColorMode) -> ColorFrame {
    let lut = lut_for(mode);
    let image = RgbImage::from_fn(frame.width, frame.height, |x, y| {
        Rgb(lut[frame.luma8(x, y) as usize])
    });
    ColorFrame {
        image,
        captured_at: frame.captured_at,
        sequence: frame.sequence,
    }
}

/// Map a single 8-bit intensity
pub fn map_value(value: u8, mode: ColorMode) -> [u8; 3] {
    lut_for(mode)[value as usize]
}

/// Map an intensity given on an arbitrary scale, clamping to `0.0..=255.0`
pub fn map_intensity(value: f32, mode: ColorMode) -> [u8; 3] {
    let clamped = if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 255.0)
    };
    map_value(clamped.round() as u8, mode)
}

fn lut_for(mode: ColorMode) -> &'static Lut {
    static OFF: OnceLock<Lut> = OnceLock::new();
    static GREEN: OnceLock<Lut> = OnceLock::new();
    static HEAT: OnceLock<Lut> = OnceLock::new();
    static JET: OnceLock<Lut> = OnceLock::new();

    match mode {
        ColorMode::Off => OFF.get_or_init(|| build_lut(|v| [v, v, v])),
        ColorMode::Green => GREEN.get_or_init(|| build_lut(|v| [0, v, 0])),
        ColorMode::Heat => HEAT.get_or_init(|| build_lut(|v| gradient(HEAT_POINTS, v))),
        ColorMode::Jet => JET.get_or_init(|| build_lut(|v| gradient(JET_POINTS, v))),
    }
}

fn build_lut(f: impl Fn(u8) -> [u8; 3]) -> Lut {
    let mut lut = [[0u8; 3]; 256];
    for (i, entry) in lut.iter_mut().enumerate() {
        *entry = f(i as u8);
    }
    lut
}

/// Piecewise-linear interpolation over `points`
fn gradient(points: ControlPoints, value: u8) -> [u8; 3] {
    let t = value as f32 / 255.0;
    for pair in points.windows(2) {
        let (t0, c0) = pair[0];
        let (t1, c1) = pair[1];
        if t <= t1 {
            let span = (t1 - t0).max(f32::EPSILON);
            let f = ((t - t0) / span).clamp(0.0, 1.0);
            return [
                lerp(c0[0], c1[0], f),
                lerp(c0[1], c1[1], f),
                lerp(c0[2], c1[2], f),
            ];
        }
    }
    points.last().map(|&(_, c)| c).unwrap_or([0, 0, 0])
}

#[inline]
fn lerp(a: u8, b: u8, f: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * f).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_off_is_grayscale_identity() {
        for v in 0..=255u8 {
            assert_eq!(map_value(v, ColorMode::Off), [v, v, v]);
        }
    }

    #[test]
    fn test_green_has_no_red_or_blue() {
        for v in 0..=255u8 {
            let [r, g, b] = map_value(v, ColorMode::Green);
            assert_eq!((r, b), (0, 0));
            assert_eq!(g, v);
        }
    }

    #[test]
    fn test_heat_endpoints_and_midpoints() {
        assert_eq!(map_value(0, ColorMode::Heat), [0, 0, 0]);
        assert_eq!(map_value(85, ColorMode::Heat), [255, 0, 0]);
        assert_eq!(map_value(170, ColorMode::Heat), [255, 255, 0]);
        assert_eq!(map_value(255, ColorMode::Heat), [255, 255, 255]);
    }

    #[test]
    fn test_heat_is_monotonic_in_brightness() {
        let mut last = 0u32;
        for v in 0..=255u8 {
            let [r, g, b] = map_value(v, ColorMode::Heat);
            let sum = r as u32 + g as u32 + b as u32;
            assert!(sum >= last);
            last = sum;
        }
    }

    #[test]
    fn test_jet_endpoints() {
        assert_eq!(map_value(0, ColorMode::Jet), [0, 0, 255]);
        assert_eq!(map_value(255, ColorMode::Jet), [255, 0, 0]);
        let [r, g, b] = map_value(128, ColorMode::Jet);
        assert!(g > 250 && r < 5 && b < 5);
    }

    #[test]
    fn test_out_of_range_intensity_is_clamped() {
        assert_eq!(map_intensity(-40.0, ColorMode::Off), [0, 0, 0]);
        assert_eq!(map_intensity(1000.0, ColorMode::Off), [255, 255, 255]);
        assert_eq!(map_intensity(f32::NAN, ColorMode::Jet), [0, 0, 255]);
    }

    #[test]
    fn test_apply_preserves_dimensions_and_timestamp() {
        let captured_at = Instant::now();
        let frame = Frame::gray8(3, 2, vec![0, 50, 100, 150, 200, 250], captured_at, 9);
        let color = apply(&frame, ColorMode::Off);
        assert_eq!((color.width(), color.height()), (3, 2));
        assert_eq!(color.captured_at, captured_at);
        assert_eq!(color.sequence, 9);
        assert_eq!(color.image.get_pixel(1, 1).0, [200, 200, 200]);
    }

    #[test]
    fn test_apply_reduces_16bit_to_high_byte() {
        let frame = Frame::gray16(2, 1, &[0x1234, 0xff00], Instant::now(), 0);
        let color = apply(&frame, ColorMode::Off);
        assert_eq!(color.image.get_pixel(0, 0).0, [0x12, 0x12, 0x12]);
        assert_eq!(color.image.get_pixel(1, 0).0, [0xff, 0xff, 0xff]);
    }
}
