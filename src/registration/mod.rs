//! Intensity-based registration objective.
//!
//! The objective scores a candidate pose by projecting a fixed source point cloud into every
//! emitter view and averaging the detector intensity under the projected pixels:
//!
//! ```text
//! pose       = scaled_pose / scale                       (element-wise)
//! q_i        = T(pose) · p_i
//! score_i    = (1 / V) · Σ_v  I_v(trunc(pixel_v(q_i)))   (0 for samples outside I_v)
//! cost       = reference - (1 / N) · Σ_i score_i
//! ```
//!
//! Brighter alignment means lower cost, so generic minimizers can drive it directly through
//! [`CostFunction`]. Images are read once up front (see [`crate::imaging::ImageCache`]); each
//! evaluation is a pure function of the pose and runs the per-point loop on the rayon pool.

use crate::config::{ConfigError, DetectorConfig, ImageSize, PixelMapping, RegistrationConfig};
use crate::error::TomoResult;
use crate::geometry::projection::PerspectiveProjector;
use crate::geometry::rigid::RigidTransform3D;
use crate::geometry::{EmitterGeometry, GeometryError, PlaneGeometry, Point3, Pose6};
use crate::imaging::{ImageCache, ImageError, IntensityImage};
use nalgebra::Vector2;
use rayon::prelude::*;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, trace};

/// Registration-specific errors
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Invalid registration input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RegistrationError {
    /// Emit the error through `tracing` and hand it back for propagation.
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }
}

/// Seam between the objective and an external minimizer.
///
/// Implementors map a parameter vector to a scalar the minimizer drives down. The minimizer
/// owns the step strategy and convergence criteria.
pub trait CostFunction: Send + Sync {
    /// Cost at `params`.
    fn cost(&self, params: &[f64]) -> TomoResult<f64>;

    /// Number of parameters `cost` expects.
    fn dimension(&self) -> usize;
}

/// One acquisition: an emitter over the detector plane and the image it produced.
#[derive(Clone)]
pub struct EmitterView {
    projector: PerspectiveProjector,
    image: Arc<dyn IntensityImage>,
}

impl EmitterView {
    pub fn new(projector: PerspectiveProjector, image: Arc<dyn IntensityImage>) -> Self {
        Self { projector, image }
    }

    /// View in CT coordinates for one geometry-table row.
    pub fn ct(emitter_row: &Point3, image: Arc<dyn IntensityImage>) -> Self {
        let projector =
            PerspectiveProjector::new(EmitterGeometry::ct(emitter_row), PlaneGeometry::ct());
        Self::new(projector, image)
    }

    pub fn projector(&self) -> &PerspectiveProjector {
        &self.projector
    }

    pub fn image(&self) -> &dyn IntensityImage {
        self.image.as_ref()
    }

    /// Intensity under `pixel`, or `None` when the truncated index falls outside the image.
    pub fn sample(&self, pixel: &Vector2<f64>) -> Option<f64> {
        let (row, col) = pixel_index(pixel)?;
        self.image.sample(row, col)
    }
}

impl fmt::Debug for EmitterView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmitterView")
            .field("projector", &self.projector)
            .field("image_bounds", &self.image.bounds())
            .finish()
    }
}

/// `(row, col)` index under a pixel coordinate, truncating toward zero.
///
/// Negative or non-finite coordinates have no index. Rows follow pixel y, columns pixel x.
pub fn pixel_index(pixel: &Vector2<f64>) -> Option<(usize, usize)> {
    if !(pixel.x.is_finite() && pixel.y.is_finite()) || pixel.x < 0.0 || pixel.y < 0.0 {
        return None;
    }
    Some((pixel.y.trunc() as usize, pixel.x.trunc() as usize))
}

/// Transform one point by `pose`, project it and convert to pixel coordinates.
pub fn project_to_pixel(
    pose: &Pose6,
    point: &Point3,
    projector: &PerspectiveProjector,
    detector: &DetectorConfig,
    mapping: PixelMapping,
    size: ImageSize,
) -> Result<Vector2<f64>, GeometryError> {
    let transformed = RigidTransform3D::build(pose).apply(point);
    projector.project_to_pixel(&transformed, detector, mapping, size)
}

/// Breakdown of one objective evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Unscaled pose the points were transformed by
    pub pose: Pose6,
    /// `reference - mean_intensity`
    pub cost: f64,
    /// Mean over points of the per-point view-averaged intensity
    pub mean_intensity: f64,
    /// Samples that landed inside their image
    pub sampled: usize,
    /// Samples that fell outside their image and contributed zero
    pub skipped: usize,
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cost {:.6} (mean intensity {:.6}, {} sampled, {} out of bounds) at {}",
            self.cost, self.mean_intensity, self.sampled, self.skipped, self.pose
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PointScore {
    score: f64,
    sampled: usize,
    skipped: usize,
}

/// Registration objective over a fixed point cloud and a fixed set of emitter views.
#[derive(Debug, Clone)]
pub struct RegistrationObjective {
    points: Vec<Point3>,
    views: Vec<EmitterView>,
    config: RegistrationConfig,
}

impl RegistrationObjective {
    /// Build an objective, validating inputs and configuration.
    pub fn new(
        points: Vec<Point3>,
        views: Vec<EmitterView>,
        config: RegistrationConfig,
    ) -> Result<Self, RegistrationError> {
        if points.is_empty() {
            return Err(RegistrationError::InvalidInput("point cloud is empty".to_string()).log());
        }
        if views.is_empty() {
            return Err(RegistrationError::InvalidInput("no emitter views".to_string()).log());
        }
        config.validate().map_err(|e| RegistrationError::from(e).log())?;

        // Pixel centring uses the configured size, bounds use the image shape
        let expected = (config.image_size.height, config.image_size.width);
        for (index, view) in views.iter().enumerate() {
            let (rows, cols) = view.image.bounds();
            if (rows, cols) != expected {
                return Err(RegistrationError::InvalidInput(format!(
                    "view {index} image is {cols}x{rows}, configured size is {}",
                    config.image_size
                ))
                .log());
            }
        }

        debug!(
            "Registration objective: {} points, {} views, {}",
            points.len(),
            views.len(),
            config
        );
        Ok(Self {
            points,
            views,
            config,
        })
    }

    /// Build CT-geometry views from a geometry table and one image path per row.
    ///
    /// Images are read through `cache`, so repeated construction never re-reads a file.
    pub fn from_acquisition<P: AsRef<Path>>(
        points: Vec<Point3>,
        emitter_rows: &[Point3],
        image_paths: &[P],
        cache: &ImageCache,
        config: RegistrationConfig,
    ) -> Result<Self, RegistrationError> {
        if emitter_rows.len() != image_paths.len() {
            return Err(RegistrationError::InvalidInput(format!(
                "{} emitter rows but {} images",
                emitter_rows.len(),
                image_paths.len()
            ))
            .log());
        }

        let images = cache.load_all(image_paths)?;
        let views = emitter_rows
            .iter()
            .zip(images)
            .map(|(row, image)| EmitterView::ct(row, image))
            .collect();
        info!("Prepared {} emitter views", emitter_rows.len());
        Self::new(points, views, config)
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn views(&self) -> &[EmitterView] {
        &self.views
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Cost for an optimizer-side (scaled) pose.
    pub fn evaluate(&self, scaled_pose: &[f64]) -> Result<f64, RegistrationError> {
        Ok(self.evaluate_detailed(scaled_pose)?.cost)
    }

    /// Like [`RegistrationObjective::evaluate`], with sample counts.
    pub fn evaluate_detailed(&self, scaled_pose: &[f64]) -> Result<Evaluation, RegistrationError> {
        let pose = Pose6::from_slice(scaled_pose)?.unscaled(&self.config.scale);
        if !pose.is_finite() {
            return Err(RegistrationError::InvalidInput(format!("non-finite pose {pose}")).log());
        }

        let transform = RigidTransform3D::build(&pose);
        let scores = self
            .points
            .par_iter()
            .map(|point| self.score_point(&transform.apply(point)))
            .collect::<Result<Vec<_>, _>>()?;

        let total = scores.iter().fold(PointScore::default(), |acc, s| PointScore {
            score: acc.score + s.score,
            sampled: acc.sampled + s.sampled,
            skipped: acc.skipped + s.skipped,
        });
        let mean_intensity = total.score / self.points.len() as f64;
        let evaluation = Evaluation {
            pose,
            cost: self.config.reference_intensity - mean_intensity,
            mean_intensity,
            sampled: total.sampled,
            skipped: total.skipped,
        };

        debug!("{}", evaluation);
        Ok(evaluation)
    }

    fn score_point(&self, transformed: &Point3) -> Result<PointScore, GeometryError> {
        let mapping = self.config.pixel_mapping();
        let mut score = PointScore::default();
        for (index, view) in self.views.iter().enumerate() {
            let pixel = view.projector.project_to_pixel(
                transformed,
                &self.config.detector,
                mapping,
                self.config.image_size,
            )?;
            match view.sample(&pixel) {
                Some(value) => {
                    score.score += value;
                    score.sampled += 1;
                }
                None => {
                    trace!(
                        "View {}: pixel ({:.2}, {:.2}) out of bounds",
                        index, pixel.x, pixel.y
                    );
                    score.skipped += 1;
                }
            }
        }
        score.score /= self.views.len() as f64;
        Ok(score)
    }
}

impl CostFunction for RegistrationObjective {
    fn cost(&self, params: &[f64]) -> TomoResult<f64> {
        Ok(self.evaluate(params)?)
    }

    fn dimension(&self) -> usize {
        6
    }
}
