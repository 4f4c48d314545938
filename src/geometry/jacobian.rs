//! Analytic Jacobian of a versor-rotated point with respect to the pose parameters.
//!
//! Rotation angles `(x, y, z)` are first converted to versor (unit quaternion) components
//! from half-angle sines and cosines:
//!
//! ```text
//! vx = sx·cy·cz + cx·sy·sz
//! vy = cx·sy·cz + sx·cy·sz
//! vz = cx·cy·sz + sx·sy·cz
//! vw = cx·cy·cz + sx·sy·sz
//! ```
//!
//! Columns 0–2 of the 3×6 result are the derivatives of `R(v)·(p - c)` with respect to the
//! versor vector part, with `vw` eliminated through the unit-norm constraint. Every entry is
//! divided by `vw`, so a near-zero scalar term is reported as
//! [`GeometryError::DegenerateOrientation`]. Columns 3–5 are the translation block, the 3×3
//! identity.

use super::{GeometryError, ORIENTATION_TOLERANCE, Point3, Pose6};
use nalgebra::{Matrix3, SMatrix, Vector3};
use std::fmt;

/// 3×6 Jacobian: rows are output x/y/z, columns are three rotation then three translation parameters.
pub type PoseJacobian = SMatrix<f64, 3, 6>;

/// How half-angle sines are taken when converting angles to a versor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersorConvention {
    /// Each axis uses the sine of its own half angle.
    #[default]
    Standard,
    /// The x and y sines reuse `sin(z/2)`. Kept for parity with Jacobians computed by
    /// earlier versions of the registration pipeline.
    Legacy,
}

impl fmt::Display for VersorConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersorConvention::Standard => write!(f, "standard"),
            VersorConvention::Legacy => write!(f, "legacy"),
        }
    }
}

/// Versor components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Versor {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Versor {
    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// Convert rotation angles `(x, y, z)` in radians.
    pub fn from_angles(angles: &Vector3<f64>, convention: VersorConvention) -> Self {
        let (x, y, z) = (angles.x, angles.y, angles.z);

        let cz = (z * 0.5).cos();
        let sz = (z * 0.5).sin();
        let cy = (y * 0.5).cos();
        let cx = (x * 0.5).cos();
        let (sx, sy) = match convention {
            VersorConvention::Standard => ((x * 0.5).sin(), (y * 0.5).sin()),
            VersorConvention::Legacy => (sz, sz),
        };

        Self {
            x: sx * cy * cz + cx * sy * sz,
            y: cx * sy * cz + sx * cy * sz,
            z: cx * cy * sz + sx * sy * cz,
            w: cx * cy * cz + sx * sy * sz,
        }
    }

    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    /// Rotation matrix of the (assumed unit) versor.
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        let (x, y, z, w) = (self.x, self.y, self.z, self.w);
        Matrix3::new(
            1.0 - 2.0 * (y * y + z * z),
            2.0 * (x * y - z * w),
            2.0 * (x * z + y * w),
            2.0 * (x * y + z * w),
            1.0 - 2.0 * (x * x + z * z),
            2.0 * (y * z - x * w),
            2.0 * (x * z - y * w),
            2.0 * (y * z + x * w),
            1.0 - 2.0 * (x * x + y * y),
        )
    }

    /// Jacobian of `R(v)·rel` with respect to the pose parameters.
    pub fn jacobian(&self, rel: &Vector3<f64>) -> Result<PoseJacobian, GeometryError> {
        let (vx, vy, vz, vw) = (self.x, self.y, self.z, self.w);
        if !vw.is_finite() || vw.abs() < ORIENTATION_TOLERANCE {
            return Err(GeometryError::DegenerateOrientation { vw });
        }

        let (px, py, pz) = (rel.x, rel.y, rel.z);

        let vxx = vx * vx;
        let vyy = vy * vy;
        let vzz = vz * vz;
        let vww = vw * vw;

        let vxy = vx * vy;
        let vxz = vx * vz;
        let vxw = vx * vw;

        let vyz = vy * vz;
        let vyw = vy * vw;

        let vzw = vz * vw;

        let mut jacobian = PoseJacobian::zeros();

        jacobian[(0, 0)] = 2.0 * ((vyw + vxz) * py + (vzw - vxy) * pz) / vw;
        jacobian[(1, 0)] = 2.0 * ((vyw - vxz) * px - 2.0 * vxw * py + (vxx - vww) * pz) / vw;
        jacobian[(2, 0)] = 2.0 * ((vzw + vxy) * px + (vww - vxx) * py - 2.0 * vxw * pz) / vw;

        jacobian[(0, 1)] = 2.0 * (-2.0 * vyw * px + (vxw + vyz) * py + (vww - vyy) * pz) / vw;
        jacobian[(1, 1)] = 2.0 * ((vxw - vyz) * px + (vzw + vxy) * pz) / vw;
        jacobian[(2, 1)] = 2.0 * ((vyy - vww) * px + (vzw - vxy) * py - 2.0 * vyw * pz) / vw;

        jacobian[(0, 2)] = 2.0 * (-2.0 * vzw * px + (vzz - vww) * py + (vxw - vyz) * pz) / vw;
        jacobian[(1, 2)] = 2.0 * ((vww - vzz) * px - 2.0 * vzw * py + (vyw + vxz) * pz) / vw;
        jacobian[(2, 2)] = 2.0 * ((vxw + vyz) * px + (vyw - vxz) * py) / vw;

        jacobian[(0, 3)] = 1.0;
        jacobian[(1, 4)] = 1.0;
        jacobian[(2, 5)] = 1.0;

        Ok(jacobian)
    }
}

impl fmt::Display for Versor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Versor [w: {:.6}, x: {:.6}, y: {:.6}, z: {:.6}]",
            self.w, self.x, self.y, self.z
        )
    }
}

/// Jacobian estimator for gradient-based optimizer clients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VersorJacobian {
    center_of_rotation: Point3,
    convention: VersorConvention,
}

impl VersorJacobian {
    pub fn new(center_of_rotation: Point3) -> Self {
        Self {
            center_of_rotation,
            convention: VersorConvention::default(),
        }
    }

    pub fn with_convention(mut self, convention: VersorConvention) -> Self {
        self.convention = convention;
        self
    }

    pub fn center_of_rotation(&self) -> &Point3 {
        &self.center_of_rotation
    }

    pub fn convention(&self) -> VersorConvention {
        self.convention
    }

    /// Versor for rotation angles `(x, y, z)` under this estimator's convention.
    pub fn versor(&self, angles: &Vector3<f64>) -> Versor {
        Versor::from_angles(angles, self.convention)
    }

    /// 3×6 Jacobian for rotation angles `(x, y, z)` at `point`.
    pub fn compute(&self, angles: &Vector3<f64>, point: &Point3) -> Result<PoseJacobian, GeometryError> {
        let rel = point - self.center_of_rotation;
        self.versor(angles).jacobian(&rel)
    }

    /// Jacobian using the rotation part of a pose.
    pub fn compute_for_pose(&self, pose: &Pose6, point: &Point3) -> Result<PoseJacobian, GeometryError> {
        self.compute(&pose.rotation_xyz(), point)
    }
}

impl Default for VersorJacobian {
    fn default() -> Self {
        Self::new(Point3::zeros())
    }
}
