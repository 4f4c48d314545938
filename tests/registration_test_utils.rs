//! Shared utilities for registration integration tests
//!
//! Builds small deterministic acquisitions: a vessel-like point cloud above the CT plane, a
//! fan of emitter positions, and synthetic projection images with bright blobs under the
//! points' true projections.

#![allow(dead_code)]

use nalgebra::DMatrix;
use std::sync::Arc;
use tomo_register::config::ImageSize;
use tomo_register::{
    DetectorConfig, DetectorImage, EmitterGeometry, EmitterView, IntensityImage,
    PerspectiveProjector, PlaneGeometry, Point3, Pose6, RegistrationConfig, RigidTransform3D,
};

/// Detector size used by the synthetic scenes
pub const SCENE_SIZE: ImageSize = ImageSize {
    width: 256,
    height: 256,
};

/// Intensity of the blobs painted under each true projection
pub const BLOB_INTENSITY: f64 = 1000.0;

/// Half-width of each blob in pixels
pub const BLOB_RADIUS: i64 = 2;

/// Generate N points along a gently curving vessel
///
/// Points stay within ±15 units laterally and 10–40 units above the plane, so they land
/// well inside a 256×256 detector for every emitter of [`emitter_fan`].
pub fn vessel_points(n: usize) -> Vec<Point3> {
    (0..n)
        .map(|i| {
            let s = i as f64 / n.max(1) as f64;
            let angle = s * 2.0 * std::f64::consts::PI;
            Point3::new(
                -15.0 + 30.0 * s,
                8.0 * angle.sin(),
                25.0 + 15.0 * (1.5 * angle).cos(),
            )
        })
        .collect()
}

/// Geometry-table rows for a linear sweep of `n` emitters at height 650
pub fn emitter_fan(n: usize) -> Vec<Point3> {
    (0..n)
        .map(|i| {
            let offset = if n > 1 {
                -25.0 + 50.0 * i as f64 / (n - 1) as f64
            } else {
                0.0
            };
            Point3::new(offset, 0.0, 650.0)
        })
        .collect()
}

/// Registration config matching the synthetic scenes
pub fn scene_config() -> RegistrationConfig {
    RegistrationConfig::new()
        .with_image_size(SCENE_SIZE)
        .with_pixel_spacing(1.0)
}

/// Paint a blob under every point's projection for one emitter row
pub fn render_blob_image(
    emitter_row: &Point3,
    points: &[Point3],
    config: &RegistrationConfig,
) -> DetectorImage {
    let view_projector =
        PerspectiveProjector::new(EmitterGeometry::ct(emitter_row), PlaneGeometry::ct());

    let size = config.image_size;
    let mut image = DetectorImage::zeros(size.height, size.width);
    for point in points {
        let Ok(pixel) = view_projector.project_to_pixel(
            point,
            &config.detector,
            config.pixel_mapping(),
            size,
        ) else {
            continue;
        };
        let (row, col) = (pixel.y.trunc() as i64, pixel.x.trunc() as i64);
        for r in (row - BLOB_RADIUS)..=(row + BLOB_RADIUS) {
            for c in (col - BLOB_RADIUS)..=(col + BLOB_RADIUS) {
                if r >= 0 && c >= 0 {
                    image.set(r as usize, c as usize, BLOB_INTENSITY);
                }
            }
        }
    }
    image
}

/// Emitter views whose images show `points` moved by `true_pose`
pub fn synthetic_views(
    points: &[Point3],
    rows: &[Point3],
    true_pose: &Pose6,
    config: &RegistrationConfig,
) -> Vec<EmitterView> {
    let moved = RigidTransform3D::build(true_pose).apply_all(points);
    rows.iter()
        .map(|row| {
            let image: Arc<dyn IntensityImage> = Arc::new(render_blob_image(row, &moved, config));
            EmitterView::ct(row, image)
        })
        .collect()
}

/// Uniform image of the given size
pub fn uniform_image(size: ImageSize, value: f64) -> Arc<dyn IntensityImage> {
    Arc::new(DetectorImage::new(DMatrix::from_element(
        size.height,
        size.width,
        value,
    )))
}

/// Pixel pitch of the default detector
pub fn pitch() -> f64 {
    DetectorConfig::default().pixel_pitch
}
