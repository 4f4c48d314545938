//! Detector and registration configuration.
//!
//! The detector pixel pitch is a system-wide constant. It lives here exactly once and is
//! carried into every plane-to-pixel conversion through [`DetectorConfig`], so the full-size
//! and spacing-scaled conversion modes can never disagree about it.
//!
//! # Conversion modes
//!
//! ```text
//! FullSize:          pixel = (uv + size / 2) / pitch
//! Scaled { s }:      pixel = uv / (s · pitch) + size / 2
//! ```
//!
//! `size` is the image size in pixels, `x` pairs with the width and `y` with the height.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Detector pixel pitch in length units per pixel.
pub const PIXEL_PITCH: f64 = 0.194;

/// Reference constant the registration cost is measured against (`cost = reference - score`).
pub const REFERENCE_INTENSITY: f64 = 6000.0;

/// Configuration errors, raised when a config is validated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Pixel pitch must be positive and finite, got {0}")]
    InvalidPixelPitch(f64),

    #[error("Pixel spacing must be positive and finite, got {0}")]
    InvalidSpacing(f64),

    #[error("Scale entry {index} must be non-zero and finite, got {value}")]
    InvalidScale { index: usize, value: f64 },

    #[error("Image size must be non-empty, got {width}x{height}")]
    InvalidImageSize { width: usize, height: usize },
}

/// Image size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    /// Number of columns (pixel x)
    pub width: usize,
    /// Number of rows (pixel y)
    pub height: usize,
}

impl ImageSize {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Half the size, as the center offset used by both conversion modes.
    pub fn half(&self) -> Vector2<f64> {
        Vector2::new(self.width as f64 / 2.0, self.height as f64 / 2.0)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidImageSize {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Plane-basis to pixel conversion mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PixelMapping {
    /// Tomosynthesis-reconstruction convention: offset by half the size, then divide by pitch.
    FullSize,
    /// CT convention: divide by `spacing · pitch`, then center at half the size.
    Scaled { spacing: f64 },
}

impl fmt::Display for PixelMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelMapping::FullSize => write!(f, "full-size"),
            PixelMapping::Scaled { spacing } => write!(f, "scaled (spacing {spacing})"),
        }
    }
}

/// Detector configuration shared by every conversion site.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Physical length represented by one detector pixel
    pub pixel_pitch: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            pixel_pitch: PIXEL_PITCH,
        }
    }
}

impl DetectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the pixel pitch (tests and simulated detectors only).
    pub fn with_pixel_pitch(mut self, pixel_pitch: f64) -> Self {
        self.pixel_pitch = pixel_pitch;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.pixel_pitch.is_finite() && self.pixel_pitch > 0.0) {
            return Err(ConfigError::InvalidPixelPitch(self.pixel_pitch));
        }
        Ok(())
    }

    /// Convert plane-basis coordinates to pixel coordinates.
    pub fn to_pixel(&self, uv: &Vector2<f64>, mapping: PixelMapping, size: ImageSize) -> Vector2<f64> {
        let half = size.half();
        match mapping {
            PixelMapping::FullSize => (uv + half) / self.pixel_pitch,
            PixelMapping::Scaled { spacing } => uv / (spacing * self.pixel_pitch) + half,
        }
    }

    /// Inverse of [`DetectorConfig::to_pixel`].
    pub fn to_plane(
        &self,
        pixel: &Vector2<f64>,
        mapping: PixelMapping,
        size: ImageSize,
    ) -> Vector2<f64> {
        let half = size.half();
        match mapping {
            PixelMapping::FullSize => pixel * self.pixel_pitch - half,
            PixelMapping::Scaled { spacing } => (pixel - half) * (spacing * self.pixel_pitch),
        }
    }
}

/// Configuration of the registration objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationConfig {
    pub detector: DetectorConfig,
    /// Size of the projection images in pixels
    pub image_size: ImageSize,
    /// Physical x/y spacing of the source volume, used by the scaled pixel mapping
    pub pixel_spacing: f64,
    /// Per-parameter scale; the optimizer works on `pose · scale`
    pub scale: [f64; 6],
    /// Constant the average intensity is subtracted from
    pub reference_intensity: f64,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            image_size: ImageSize::new(1536, 2048),
            pixel_spacing: 1.0,
            scale: [1.0; 6],
            reference_intensity: REFERENCE_INTENSITY,
        }
    }
}

impl RegistrationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detector(mut self, detector: DetectorConfig) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_image_size(mut self, image_size: ImageSize) -> Self {
        self.image_size = image_size;
        self
    }

    pub fn with_pixel_spacing(mut self, pixel_spacing: f64) -> Self {
        self.pixel_spacing = pixel_spacing;
        self
    }

    pub fn with_scale(mut self, scale: [f64; 6]) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_reference_intensity(mut self, reference_intensity: f64) -> Self {
        self.reference_intensity = reference_intensity;
        self
    }

    /// The conversion mode the objective samples with.
    pub fn pixel_mapping(&self) -> PixelMapping {
        PixelMapping::Scaled {
            spacing: self.pixel_spacing,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detector.validate()?;
        self.image_size.validate()?;
        if !(self.pixel_spacing.is_finite() && self.pixel_spacing > 0.0) {
            return Err(ConfigError::InvalidSpacing(self.pixel_spacing));
        }
        for (index, &value) in self.scale.iter().enumerate() {
            if !value.is_finite() || value == 0.0 {
                return Err(ConfigError::InvalidScale { index, value });
            }
        }
        Ok(())
    }
}

impl fmt::Display for RegistrationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RegistrationConfig {{ pixel_pitch: {}, image_size: {}, pixel_spacing: {}, scale: {:?}, reference_intensity: {} }}",
            self.detector.pixel_pitch,
            self.image_size,
            self.pixel_spacing,
            self.scale,
            self.reference_intensity
        )
    }
}

/// Filled marker drawn around each projected point in masks and overlays.
///
/// The marker covers `[row - rows/2, row + rows/2)` by `[col - cols/2, col + cols/2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerFootprint {
    pub rows: usize,
    pub cols: usize,
}

impl MarkerFootprint {
    /// Vessel masks for tomosynthesis-reconstruction points.
    pub const TOMO_RECON: MarkerFootprint = MarkerFootprint { rows: 20, cols: 24 };

    /// Vessel overlays for CT points.
    pub const CT_OVERLAY: MarkerFootprint = MarkerFootprint { rows: 6, cols: 6 };

    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    pub fn half_rows(&self) -> i64 {
        (self.rows / 2) as i64
    }

    pub fn half_cols(&self) -> i64 {
        (self.cols / 2) as i64
    }
}
