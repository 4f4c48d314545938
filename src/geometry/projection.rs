//! Line-plane intersection projection.
//!
//! # Mathematical Model
//!
//! With plane origin `p0`, basis `p01 = p1 - p0`, `p02 = p2 - p0`, emitter `E` and target `P`:
//!
//! ```text
//! ray   = -(E - P)
//! rel   = P - p0
//! denom = ray · (p01 × p02)
//!
//! u = ((p02 × ray) · rel) / denom
//! v = ((ray × p01) · rel) / denom
//! t = ((p01 × p02) · rel) / denom
//!
//! intersection = P + ray · t
//! ```
//!
//! `(u, v)` are coordinates in the plane's own basis and `t` is the parametric distance along
//! the source ray. `denom == 0` means the ray is parallel to the plane or the basis is
//! collinear; it is reported as [`GeometryError::DegenerateGeometry`].
//!
//! # References
//!
//! - <https://en.wikipedia.org/wiki/Line%E2%80%93plane_intersection>

use super::{EmitterGeometry, GeometryError, PARALLEL_TOLERANCE, PlaneGeometry, Point3};
use crate::config::{DetectorConfig, ImageSize, PixelMapping};
use nalgebra::{Vector2, Vector3};
use rayon::prelude::*;

/// Output of a single projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionResult {
    /// Coordinates in the plane basis
    pub uv: Vector2<f64>,
    /// 3D point returned alongside the plane coordinates (`target + ray · t`)
    pub intersection: Point3,
    /// Parametric ray distance
    pub t: f64,
}

impl ProjectionResult {
    /// Pixel coordinates of `uv` under the given conversion mode.
    pub fn to_pixel(
        &self,
        detector: &DetectorConfig,
        mapping: PixelMapping,
        size: ImageSize,
    ) -> Vector2<f64> {
        detector.to_pixel(&self.uv, mapping, size)
    }
}

/// Immutable projector for one emitter and one detector plane.
///
/// Plane-dependent terms (basis vectors and their cross product) are computed once at
/// construction; each call to [`PerspectiveProjector::project`] is otherwise independent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveProjector {
    emitter: EmitterGeometry,
    plane: PlaneGeometry,
    p01: Vector3<f64>,
    p02: Vector3<f64>,
    basis_normal: Vector3<f64>,
}

impl PerspectiveProjector {
    pub fn new(emitter: EmitterGeometry, plane: PlaneGeometry) -> Self {
        let p01 = plane.x_axis();
        let p02 = plane.y_axis();
        Self {
            emitter,
            plane,
            p01,
            p02,
            basis_normal: p01.cross(&p02),
        }
    }

    pub fn emitter(&self) -> &EmitterGeometry {
        &self.emitter
    }

    pub fn plane(&self) -> &PlaneGeometry {
        &self.plane
    }

    /// Project `target` onto the detector plane along the ray from the emitter.
    pub fn project(&self, target: &Point3) -> Result<ProjectionResult, GeometryError> {
        let ray = -(self.emitter.position - target);
        let rel = target - self.plane.center;

        let denom = ray.dot(&self.basis_normal);
        let cutoff = PARALLEL_TOLERANCE * ray.norm() * self.basis_normal.norm();
        if !denom.is_finite() || denom.abs() <= cutoff {
            return Err(GeometryError::DegenerateGeometry { denominator: denom });
        }

        let u = self.p02.cross(&ray).dot(&rel) / denom;
        let v = ray.cross(&self.p01).dot(&rel) / denom;
        let t = self.basis_normal.dot(&rel) / denom;

        Ok(ProjectionResult {
            uv: Vector2::new(u, v),
            intersection: target + ray * t,
            t,
        })
    }

    /// Project every point in order; the first degenerate point aborts the batch.
    pub fn project_all(&self, targets: &[Point3]) -> Result<Vec<ProjectionResult>, GeometryError> {
        targets.par_iter().map(|p| self.project(p)).collect()
    }

    /// Project and convert straight to pixel coordinates.
    pub fn project_to_pixel(
        &self,
        target: &Point3,
        detector: &DetectorConfig,
        mapping: PixelMapping,
        size: ImageSize,
    ) -> Result<Vector2<f64>, GeometryError> {
        Ok(self.project(target)?.to_pixel(detector, mapping, size))
    }
}
