//! Acquisition geometry: poses, detector planes and emitters.
//!
//! This module provides the value types shared by the rigid transform, the perspective
//! projector and the Jacobian estimator:
//! - **`Pose6`**: rigid-body pose (tx, ty, tz, rz, ry, rx), rotations in radians
//! - **`PlaneGeometry`**: detector plane given by its center and two direction points
//! - **`EmitterGeometry`**: X-ray source position and center of rotation
//!
//! Two acquisition presets are provided. The CT preset places a unit-basis plane at the
//! origin; the tomosynthesis-reconstruction preset centers the plane at half the detector
//! size and shifts emitters by half the detector extent in physical units.

use crate::config::ImageSize;
use nalgebra::{Vector3, Vector6};
use std::fmt;
use thiserror::Error;

pub mod jacobian;
pub mod projection;
pub mod rigid;

/// 3D point or vector in detector-space length units.
pub type Point3 = Vector3<f64>;

/// Relative tolerance on the projection denominator.
///
/// A ray is parallel to the plane when `|ray · n| <= PARALLEL_TOLERANCE * |ray| * |n|`, with `n`
/// the basis normal, so the test does not depend on the length units in use.
pub const PARALLEL_TOLERANCE: f64 = 1e-12;

/// Tolerance below which the versor scalar term is treated as zero.
pub const ORIENTATION_TOLERANCE: f64 = 1e-9;

/// Errors raised by projection and Jacobian computations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// The ray is parallel to the plane, or the plane basis vectors are collinear
    #[error("Degenerate geometry: ray/plane denominator is {denominator}")]
    DegenerateGeometry { denominator: f64 },

    /// The versor scalar term is too close to zero for the closed-form Jacobian
    #[error("Degenerate orientation: versor scalar term is {vw}")]
    DegenerateOrientation { vw: f64 },

    #[error("Invalid geometry input: {0}")]
    InvalidInput(String),
}

/// Rigid-body pose with rotations applied Z, then Y, then X, translation last.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose6 {
    pub tx: f64,
    pub ty: f64,
    pub tz: f64,
    pub rz: f64,
    pub ry: f64,
    pub rx: f64,
}

impl Pose6 {
    pub fn new(tx: f64, ty: f64, tz: f64, rz: f64, ry: f64, rx: f64) -> Self {
        Self {
            tx,
            ty,
            tz,
            rz,
            ry,
            rx,
        }
    }

    pub fn identity() -> Self {
        Self::default()
    }

    /// Build from the optimizer's parameter order `[tx, ty, tz, rz, ry, rx]`.
    pub fn from_array(params: [f64; 6]) -> Self {
        Self::new(
            params[0], params[1], params[2], params[3], params[4], params[5],
        )
    }

    /// Build from a parameter slice, which must hold exactly six values.
    pub fn from_slice(params: &[f64]) -> Result<Self, GeometryError> {
        let array: [f64; 6] = params.try_into().map_err(|_| {
            GeometryError::InvalidInput(format!(
                "pose needs 6 parameters, got {}",
                params.len()
            ))
        })?;
        Ok(Self::from_array(array))
    }

    pub fn to_array(&self) -> [f64; 6] {
        [self.tx, self.ty, self.tz, self.rz, self.ry, self.rx]
    }

    pub fn to_vector(&self) -> Vector6<f64> {
        Vector6::from(self.to_array())
    }

    pub fn translation(&self) -> Vector3<f64> {
        Vector3::new(self.tx, self.ty, self.tz)
    }

    /// Rotation angles in the `(x, y, z)` order the versor Jacobian expects.
    pub fn rotation_xyz(&self) -> Vector3<f64> {
        Vector3::new(self.rx, self.ry, self.rz)
    }

    /// Element-wise `self / scale`, undoing optimizer-side parameter scaling.
    pub fn unscaled(&self, scale: &[f64; 6]) -> Self {
        let p = self.to_array();
        Self::from_array(std::array::from_fn(|i| p[i] / scale[i]))
    }

    /// Element-wise `self * scale`.
    pub fn scaled(&self, scale: &[f64; 6]) -> Self {
        let p = self.to_array();
        Self::from_array(std::array::from_fn(|i| p[i] * scale[i]))
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

impl fmt::Display for Pose6 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pose6 [ t: ({:.4}, {:.4}, {:.4}), r(z,y,x): ({:.6}, {:.6}, {:.6}) ]",
            self.tx, self.ty, self.tz, self.rz, self.ry, self.rx
        )
    }
}

/// Detector plane.
///
/// The in-plane basis is `x_direction - center` and `y_direction - center`. The normal is
/// carried for completeness; the projector derives orientation from the basis alone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneGeometry {
    pub center: Point3,
    pub normal: Vector3<f64>,
    pub x_direction: Point3,
    pub y_direction: Point3,
}

impl PlaneGeometry {
    pub fn new(center: Point3, normal: Vector3<f64>, x_direction: Point3, y_direction: Point3) -> Self {
        Self {
            center,
            normal,
            x_direction,
            y_direction,
        }
    }

    /// Unit-basis plane at the origin (CT acquisitions).
    pub fn ct() -> Self {
        Self::new(
            Point3::zeros(),
            Vector3::z(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        )
    }

    /// Unit-basis plane centered at half the detector size (tomosynthesis reconstructions).
    pub fn tomo_recon(size: ImageSize) -> Self {
        let half = size.half();
        Self::new(
            Point3::new(half.x, half.y, 0.0),
            Vector3::z(),
            Point3::new(half.x + 1.0, half.y, 0.0),
            Point3::new(half.x, half.y + 1.0, 0.0),
        )
    }

    /// First in-plane basis vector.
    pub fn x_axis(&self) -> Vector3<f64> {
        self.x_direction - self.center
    }

    /// Second in-plane basis vector.
    pub fn y_axis(&self) -> Vector3<f64> {
        self.y_direction - self.center
    }

    /// `x_axis × y_axis`; zero when the basis is collinear.
    pub fn basis_normal(&self) -> Vector3<f64> {
        self.x_axis().cross(&self.y_axis())
    }
}

impl fmt::Display for PlaneGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Plane [ center: ({}, {}, {}), x: ({}, {}, {}), y: ({}, {}, {}) ]",
            self.center.x,
            self.center.y,
            self.center.z,
            self.x_direction.x,
            self.x_direction.y,
            self.x_direction.z,
            self.y_direction.x,
            self.y_direction.y,
            self.y_direction.z
        )
    }
}

/// X-ray emitter for one acquisition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmitterGeometry {
    pub position: Point3,
    /// Reference point for the Jacobian only; projection ignores it
    pub center_of_rotation: Point3,
}

impl EmitterGeometry {
    pub fn new(position: Point3) -> Self {
        Self {
            position,
            center_of_rotation: Point3::zeros(),
        }
    }

    pub fn with_center_of_rotation(mut self, center_of_rotation: Point3) -> Self {
        self.center_of_rotation = center_of_rotation;
        self
    }

    /// Emitter for a geometry-table row in CT coordinates: `(-x, y, z)`.
    pub fn ct(row: &Point3) -> Self {
        Self::new(Point3::new(-row.x, row.y, row.z))
    }

    /// Emitter for a geometry-table row in tomosynthesis-reconstruction coordinates,
    /// shifted by half the detector extent.
    pub fn tomo_recon(row: &Point3, size: ImageSize, pixel_pitch: f64) -> Self {
        let half = size.half();
        Self::new(Point3::new(
            half.x * pixel_pitch - row.x,
            half.y * pixel_pitch + row.y,
            row.z,
        ))
    }
}

impl fmt::Display for EmitterGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Emitter [ position: ({}, {}, {}) ]",
            self.position.x, self.position.y, self.position.z
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pose_array_order() {
        let pose = Pose6::from_array([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(pose.tx, 1.0);
        assert_eq!(pose.rz, 4.0);
        assert_eq!(pose.rx, 6.0);
        assert_eq!(pose.to_array(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(pose.rotation_xyz(), Vector3::new(6.0, 5.0, 4.0));
    }

    #[test]
    fn test_pose_from_slice_length() {
        assert!(Pose6::from_slice(&[0.0; 6]).is_ok());
        assert!(matches!(
            Pose6::from_slice(&[0.0; 5]),
            Err(GeometryError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_pose_unscale_inverts_scale() {
        let scale = [10.0, 10.0, 10.0, 100.0, 100.0, 100.0];
        let pose = Pose6::new(1.0, -2.0, 0.5, 0.01, 0.02, -0.03);
        let round_trip = pose.scaled(&scale).unscaled(&scale);
        for (a, b) in round_trip.to_array().iter().zip(pose.to_array().iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_ct_presets() {
        let plane = PlaneGeometry::ct();
        assert_eq!(plane.x_axis(), Vector3::x());
        assert_eq!(plane.y_axis(), Vector3::y());
        assert_eq!(plane.basis_normal(), Vector3::z());

        let emitter = EmitterGeometry::ct(&Point3::new(10.0, 20.0, 650.0));
        assert_eq!(emitter.position, Point3::new(-10.0, 20.0, 650.0));
        assert_eq!(emitter.center_of_rotation, Point3::zeros());
    }

    #[test]
    fn test_tomo_recon_presets() {
        let size = ImageSize::new(1536, 2048);
        let plane = PlaneGeometry::tomo_recon(size);
        assert_eq!(plane.center, Point3::new(768.0, 1024.0, 0.0));
        assert_eq!(plane.x_axis(), Vector3::x());
        assert_eq!(plane.y_axis(), Vector3::y());

        let emitter = EmitterGeometry::tomo_recon(&Point3::new(10.0, 20.0, 650.0), size, 0.5);
        assert_eq!(emitter.position, Point3::new(374.0, 532.0, 650.0));
    }
}
