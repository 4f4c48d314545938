//! Six-parameter rigid transform in homogeneous coordinates.
//!
//! For a pose (tx, ty, tz, rz, ry, rx) and a point p:
//!
//! ```text
//! p' = T · Rx · Ry · Rz · p
//! ```
//!
//! i.e. rotate about Z, then Y, then X, and translate last. Each rotation is the standard
//! right-handed rotation about its axis; angles are radians.

use super::{Point3, Pose6};
use nalgebra::{Matrix4, Vector3};
use rayon::prelude::*;
use std::fmt;

/// Point sets at least this large are transformed on the rayon pool.
pub const PARALLEL_THRESHOLD: usize = 1024;

/// Homogeneous 4×4 rigid transform built from a [`Pose6`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform3D {
    matrix: Matrix4<f64>,
}

impl RigidTransform3D {
    /// Build `T · Rx · Ry · Rz` from a pose.
    pub fn build(pose: &Pose6) -> Self {
        let matrix = Self::translation(&pose.translation())
            * Self::rotation_x(pose.rx)
            * Self::rotation_y(pose.ry)
            * Self::rotation_z(pose.rz);
        Self { matrix }
    }

    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    pub fn from_matrix(matrix: Matrix4<f64>) -> Self {
        Self { matrix }
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    /// `self ∘ other`: apply `other` first.
    pub fn compose(&self, other: &RigidTransform3D) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    pub fn rotation_z(angle: f64) -> Matrix4<f64> {
        let (s, c) = angle.sin_cos();
        Matrix4::new(
            c, -s, 0.0, 0.0, //
            s, c, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        )
    }

    pub fn rotation_y(angle: f64) -> Matrix4<f64> {
        let (s, c) = angle.sin_cos();
        Matrix4::new(
            c, 0.0, s, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            -s, 0.0, c, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        )
    }

    pub fn rotation_x(angle: f64) -> Matrix4<f64> {
        let (s, c) = angle.sin_cos();
        Matrix4::new(
            1.0, 0.0, 0.0, 0.0, //
            0.0, c, -s, 0.0, //
            0.0, s, c, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        )
    }

    pub fn translation(t: &Vector3<f64>) -> Matrix4<f64> {
        Matrix4::new(
            1.0, 0.0, 0.0, t.x, //
            0.0, 1.0, 0.0, t.y, //
            0.0, 0.0, 1.0, t.z, //
            0.0, 0.0, 0.0, 1.0,
        )
    }

    /// Transform one point: append w = 1, multiply, drop w.
    pub fn apply(&self, point: &Point3) -> Point3 {
        let homogeneous = self.matrix * point.push(1.0);
        homogeneous.xyz()
    }

    /// Transform every point, preserving order and count.
    pub fn apply_all(&self, points: &[Point3]) -> Vec<Point3> {
        if points.len() >= PARALLEL_THRESHOLD {
            points.par_iter().map(|p| self.apply(p)).collect()
        } else {
            points.iter().map(|p| self.apply(p)).collect()
        }
    }
}

impl Default for RigidTransform3D {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<&Pose6> for RigidTransform3D {
    fn from(pose: &Pose6) -> Self {
        Self::build(pose)
    }
}

impl fmt::Display for RigidTransform3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RigidTransform3D {}", self.matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const TOLERANCE: f64 = 1e-12;

    fn assert_point_eq(a: &Point3, b: &Point3) {
        assert!(
            (a - b).norm() < TOLERANCE,
            "Points {:?} and {:?} differ by more than {}",
            a,
            b,
            TOLERANCE
        );
    }

    #[test]
    fn test_zero_pose_is_identity() {
        let transform = RigidTransform3D::build(&Pose6::identity());
        assert_eq!(*transform.matrix(), Matrix4::identity());

        for p in [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.5, -2.25, 1e6),
            Point3::new(-3.0, 4.0, -5.0),
        ] {
            assert_eq!(transform.apply(&p), p);
        }
    }

    #[test]
    fn test_rotation_then_translation_order() {
        let pose = Pose6::new(1.0, 0.0, 0.0, FRAC_PI_2, 0.0, 0.0);
        let transform = RigidTransform3D::build(&pose);
        let p = Point3::new(1.0, 0.0, 0.0);

        assert_point_eq(&transform.apply(&p), &Point3::new(1.0, 1.0, 0.0));

        // Translating first would land on (0, 2, 0)
        let misordered = RigidTransform3D::from_matrix(
            RigidTransform3D::rotation_z(FRAC_PI_2)
                * RigidTransform3D::translation(&pose.translation()),
        );
        assert_point_eq(&misordered.apply(&p), &Point3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn test_rotation_axis_order() {
        // Z first maps x to y, then X maps y to z
        let pose = Pose6::new(0.0, 0.0, 0.0, FRAC_PI_2, 0.0, FRAC_PI_2);
        let transform = RigidTransform3D::build(&pose);
        assert_point_eq(
            &transform.apply(&Point3::new(1.0, 0.0, 0.0)),
            &Point3::new(0.0, 0.0, 1.0),
        );
    }

    #[test]
    fn test_right_handed_rotations() {
        let ry = RigidTransform3D::from_matrix(RigidTransform3D::rotation_y(FRAC_PI_2));
        assert_point_eq(
            &ry.apply(&Point3::new(0.0, 0.0, 1.0)),
            &Point3::new(1.0, 0.0, 0.0),
        );

        let rx = RigidTransform3D::from_matrix(RigidTransform3D::rotation_x(FRAC_PI_2));
        assert_point_eq(
            &rx.apply(&Point3::new(0.0, 1.0, 0.0)),
            &Point3::new(0.0, 0.0, 1.0),
        );
    }

    #[test]
    fn test_compose_matches_sequential_application() {
        let a = RigidTransform3D::build(&Pose6::new(1.0, 2.0, 3.0, 0.1, 0.2, 0.3));
        let b = RigidTransform3D::build(&Pose6::new(-0.5, 0.0, 4.0, -0.3, 0.0, 0.7));
        let p = Point3::new(0.3, -1.2, 2.0);
        assert_point_eq(&a.compose(&b).apply(&p), &a.apply(&b.apply(&p)));
    }

    #[test]
    fn test_apply_all_preserves_order_and_count() {
        let transform = RigidTransform3D::build(&Pose6::new(0.5, -1.0, 2.0, 0.3, -0.2, 0.1));
        assert!(transform.apply_all(&[]).is_empty());

        // Large enough to take the parallel path
        let points: Vec<Point3> = (0..PARALLEL_THRESHOLD + 7)
            .map(|i| Point3::new(i as f64, (i % 13) as f64, -(i as f64) * 0.5))
            .collect();
        let transformed = transform.apply_all(&points);
        assert_eq!(transformed.len(), points.len());
        for (p, q) in points.iter().zip(transformed.iter()) {
            assert_point_eq(&transform.apply(p), q);
        }
    }

    #[test]
    fn test_apply_preserves_distances() {
        let transform = RigidTransform3D::build(&Pose6::new(3.0, -2.0, 7.0, 0.4, -1.1, 2.3));
        let a = Point3::new(1.0, 2.0, 3.0);
        let b = Point3::new(-4.0, 0.5, 9.0);
        let d0 = (a - b).norm();
        let d1 = (transform.apply(&a) - transform.apply(&b)).norm();
        assert!((d0 - d1).abs() < 1e-9);
    }
}
