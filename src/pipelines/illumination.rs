// SPDX-License-Identifier: GPL-3.0-only

//! Illumination classification
//!
//! IR sensors used for face authentication toggle their emitter LED every
//! frame, but the raw buffer carries no flag saying which frames were lit.
//! The classifier recovers it from brightness alone: a frame is tagged
//! ILLUM when it is clearly brighter than its predecessor, RAW when clearly
//! darker, and only while consecutive steps keep alternating in sign.
//! Anything else (the first frame, a steady or slowly drifting stream) is
//! UNKNOWN.
//!
//! Tags are advisory: a wrong tag only changes which filter bucket a frame
//! lands in.

use crate::backends::camera::Frame;
use crate::config::ClassifierConfig;
use tracing::trace;

/// Illumination state of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Illumination {
    /// LED off (ambient IR only)
    Raw,
    /// LED on
    Illum,
    /// No alternation detected
    Unknown,
}

impl std::fmt::Display for Illumination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Illumination::Raw => write!(f, "RAW"),
            Illumination::Illum => write!(f, "ILLUM"),
            Illumination::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// A frame together with its illumination tag
#[derive(Debug, Clone)]
pub struct ClassifiedFrame {
    pub frame: Frame,
    pub illumination: Illumination,
    /// Mean luma the tag was derived from (8-bit scale)
    pub mean_luma: f32,
}

/// Brightness-alternation classifier
///
/// Frames must be fed in arrival order; each tag depends on the frame
/// immediately before it.
#[derive(Debug, Clone)]
pub struct IlluminationClassifier {
    config: ClassifierConfig,
    previous_mean: Option<f32>,
    /// Signed step from the frame before `previous_mean`, if it was significant
    previous_step: Option<f32>,
    /// Smoothed magnitude of frame-to-frame steps
    rolling_step: Option<f32>,
}

impl IlluminationClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            previous_mean: None,
            previous_step: None,
            rolling_step: None,
        }
    }

    /// Forget all history; the next frame is classified UNKNOWN
    pub fn reset(&mut self) {
        self.previous_mean = None;
        self.previous_step = None;
        self.rolling_step = None;
    }

    /// Current step threshold on the 8-bit scale
    ///
    /// Scales with the typical step size rather than the brightness, so an
    /// alternation is found at any exposure while noise stays below it.
    pub fn threshold(&self) -> f32 {
        let relative = self.rolling_step.unwrap_or(0.0) * self.config.relative_threshold;
        self.config.min_threshold.max(relative)
    }

    /// Tag a frame and take ownership of it
    ///
    /// A platform-reported LED state on the frame wins over the heuristic,
    /// but the brightness history is updated either way.
    pub fn classify(&mut self, frame: Frame) -> ClassifiedFrame {
        let mean = frame.mean_luma();
        let heuristic = self.observe(mean);
        let illumination = match frame.illuminated {
            Some(true) => Illumination::Illum,
            Some(false) => Illumination::Raw,
            None => heuristic,
        };

        trace!(
            sequence = frame.sequence,
            mean,
            tag = %illumination,
            "Classified frame"
        );

        ClassifiedFrame {
            frame,
            illumination,
            mean_luma: mean,
        }
    }

    /// Feed one mean-luma sample and return its tag
    pub fn observe(&mut self, mean: f32) -> Illumination {
        let threshold = self.threshold();

        let tag = match self.previous_mean {
            None => {
                self.previous_step = None;
                Illumination::Unknown
            }
            Some(previous) => {
                let step = mean - previous;
                if step.abs() <= threshold {
                    self.previous_step = None;
                    Illumination::Unknown
                } else {
                    // Two significant steps in the same direction is a ramp, not a toggle
                    let alternates = self
                        .previous_step
                        .is_none_or(|prev| prev.signum() != step.signum());
                    self.previous_step = Some(step);
                    match (alternates, step > 0.0) {
                        (false, _) => Illumination::Unknown,
                        (true, true) => Illumination::Illum,
                        (true, false) => Illumination::Raw,
                    }
                }
            }
        };

        if let Some(previous) = self.previous_mean {
            let magnitude = (mean - previous).abs();
            let smoothing = self.config.smoothing.clamp(0.0, 1.0);
            self.rolling_step = Some(match self.rolling_step {
                Some(rolling) => rolling + (magnitude - rolling) * smoothing,
                None => magnitude,
            });
        }
        self.previous_mean = Some(mean);

        tag
    }
}

impl Default for IlluminationClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}
