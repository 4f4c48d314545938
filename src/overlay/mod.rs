//! Mask and vessel-overlay rasterisation.
//!
//! For every emitter row of a geometry table the source points are (optionally) moved by a
//! pose, projected onto the detector and marked with a filled rectangle of value 255 on a
//! zero background. One 8-bit image per emitter is written as `<prefix><NN>.<ext>`, with a
//! two-digit 1-based index.
//!
//! Two styles match the two acquisition setups:
//! - **Tomo-recon masks** (`mask_ct_`): tomosynthesis-reconstruction geometry, full-size pixel
//!   mapping, 20×24 markers
//! - **CT overlays** (`vessOverlay_`): CT geometry, spacing-scaled pixel mapping, 6×6 markers

use crate::config::{DetectorConfig, ImageSize, MarkerFootprint, PixelMapping};
use crate::error::TomoResult;
use crate::geometry::projection::PerspectiveProjector;
use crate::geometry::rigid::RigidTransform3D;
use crate::geometry::{EmitterGeometry, PlaneGeometry, Point3, Pose6};
use crate::imaging::{ImageWriter, MaskImage};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Marker value written into masks.
pub const MARKER_VALUE: u8 = 255;

/// Detector/emitter layout used to project the points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquisitionPreset {
    /// Plane at the origin, emitter `(-x, y, z)`
    Ct,
    /// Plane centered at half the detector size, emitter shifted by half the detector extent
    TomoRecon,
}

impl AcquisitionPreset {
    /// Projector for one geometry-table row.
    pub fn projector(
        &self,
        emitter_row: &Point3,
        size: ImageSize,
        detector: &DetectorConfig,
    ) -> PerspectiveProjector {
        match self {
            AcquisitionPreset::Ct => {
                PerspectiveProjector::new(EmitterGeometry::ct(emitter_row), PlaneGeometry::ct())
            }
            AcquisitionPreset::TomoRecon => PerspectiveProjector::new(
                EmitterGeometry::tomo_recon(emitter_row, size, detector.pixel_pitch),
                PlaneGeometry::tomo_recon(size),
            ),
        }
    }
}

/// How and where markers are drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayStyle {
    pub preset: AcquisitionPreset,
    pub mapping: PixelMapping,
    pub footprint: MarkerFootprint,
    /// File-name prefix, followed by the two-digit emitter index
    pub prefix: String,
    /// File extension; selects the encoder
    pub extension: String,
}

impl OverlayStyle {
    /// Vessel masks from tomosynthesis-reconstruction points.
    pub fn tomo_recon_mask() -> Self {
        Self {
            preset: AcquisitionPreset::TomoRecon,
            mapping: PixelMapping::FullSize,
            footprint: MarkerFootprint::TOMO_RECON,
            prefix: "mask_ct_".to_string(),
            extension: "png".to_string(),
        }
    }

    /// Vessel overlays from CT points with the given volume spacing.
    pub fn ct_overlay(spacing: f64) -> Self {
        Self {
            preset: AcquisitionPreset::Ct,
            mapping: PixelMapping::Scaled { spacing },
            footprint: MarkerFootprint::CT_OVERLAY,
            prefix: "vessOverlay_".to_string(),
            extension: "png".to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_footprint(mut self, footprint: MarkerFootprint) -> Self {
        self.footprint = footprint;
        self
    }

    /// `<prefix><NN>.<ext>` for the 0-based emitter `index`.
    pub fn file_name(&self, index: usize) -> String {
        format!("{}{:02}.{}", self.prefix, index + 1, self.extension)
    }
}

impl fmt::Display for OverlayStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} preset, {} mapping, {}x{} markers, files {}NN.{}",
            self.preset,
            self.mapping,
            self.footprint.rows,
            self.footprint.cols,
            self.prefix,
            self.extension
        )
    }
}

/// Renders one mask per emitter position.
#[derive(Debug, Clone)]
pub struct OverlayRenderer {
    style: OverlayStyle,
    detector: DetectorConfig,
    size: ImageSize,
    transform: RigidTransform3D,
}

impl OverlayRenderer {
    pub fn new(style: OverlayStyle, size: ImageSize) -> Self {
        Self {
            style,
            detector: DetectorConfig::default(),
            size,
            transform: RigidTransform3D::identity(),
        }
    }

    pub fn with_detector(mut self, detector: DetectorConfig) -> Self {
        self.detector = detector;
        self
    }

    /// Move the source points by `pose` before projecting.
    pub fn with_pose(mut self, pose: &Pose6) -> Self {
        self.transform = RigidTransform3D::build(pose);
        self
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    /// Pixel coordinates of every projectable point for one emitter row.
    ///
    /// Points whose ray runs parallel to the detector are skipped with a warning.
    pub fn project_points(&self, emitter_row: &Point3, points: &[Point3]) -> Vec<Vector2<f64>> {
        let projector = self.style.preset.projector(emitter_row, self.size, &self.detector);
        self.transform
            .apply_all(points)
            .iter()
            .enumerate()
            .filter_map(|(index, point)| {
                match projector.project_to_pixel(point, &self.detector, self.style.mapping, self.size) {
                    Ok(pixel) => Some(pixel),
                    Err(e) => {
                        warn!("Skipping point {}: {}", index, e);
                        None
                    }
                }
            })
            .collect()
    }

    /// Rasterise the mask for one emitter row.
    pub fn render(&self, emitter_row: &Point3, points: &[Point3]) -> MaskImage {
        let mut mask = MaskImage::zeros(self.size.height, self.size.width);
        let half_rows = self.style.footprint.half_rows();
        let half_cols = self.style.footprint.half_cols();

        let mut drawn = 0;
        for pixel in self.project_points(emitter_row, points) {
            if !self.is_inside(&pixel) {
                continue;
            }
            let (row, col) = (pixel.y.trunc() as i64, pixel.x.trunc() as i64);
            mask.fill_rect(
                (row - half_rows, row + half_rows),
                (col - half_cols, col + half_cols),
                MARKER_VALUE,
            );
            drawn += 1;
        }
        debug!("Drew {} of {} markers", drawn, points.len());
        mask
    }

    /// Render and write one mask per emitter row into `dest_dir`.
    pub fn write_all(
        &self,
        emitter_rows: &[Point3],
        points: &[Point3],
        dest_dir: &Path,
        writer: &dyn ImageWriter,
    ) -> TomoResult<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(emitter_rows.len());
        for (index, row) in emitter_rows.iter().enumerate() {
            let mask = self.render(row, points);
            let path = dest_dir.join(self.style.file_name(index));
            writer.write(&path, &mask)?;
            info!(
                "Emitter {} of {} complete: {}",
                index + 1,
                emitter_rows.len(),
                path.display()
            );
            written.push(path);
        }
        Ok(written)
    }

    fn is_inside(&self, pixel: &Vector2<f64>) -> bool {
        pixel.x >= 0.0
            && pixel.y >= 0.0
            && pixel.x < self.size.width as f64
            && pixel.y < self.size.height as f64
    }
}
