use super::{IoError, PointRecord, parse_xyz_rows, read_text};
use crate::geometry::Point3;
use crate::geometry::projection::ProjectionResult;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Source point-cloud loader.
///
/// Files with a `.csv` extension are read as headed CSV (`x,y,z`); anything else is parsed
/// as whitespace-separated rows like the geometry table.
pub struct PointCloudLoader;

impl PointCloudLoader {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Vec<Point3>, IoError> {
        let path = path.as_ref();
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

        let points = if is_csv {
            Self::load_csv(path)?
        } else {
            parse_xyz_rows(&read_text(path)?)?
        };
        info!("Loaded {} source points from {}", points.len(), path.display());
        Ok(points)
    }

    /// Read a headed `x,y,z` CSV file.
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Point3>, IoError> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| {
                IoError::Csv(e).log_with_source(format!("Failed to open {}", path.display()))
            })?;

        let mut points = Vec::new();
        for record in reader.deserialize::<PointRecord>() {
            points.push(Point3::from(record?));
        }
        Ok(points)
    }
}

/// One projected point as written to CSV.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPointRecord {
    /// Index into the source point cloud
    pub point: usize,
    pub u: f64,
    pub v: f64,
    pub pixel_x: f64,
    pub pixel_y: f64,
    pub t: f64,
}

impl ProjectedPointRecord {
    pub fn new(point: usize, projection: &ProjectionResult, pixel: &Vector2<f64>) -> Self {
        Self {
            point,
            u: projection.uv.x,
            v: projection.uv.y,
            pixel_x: pixel.x,
            pixel_y: pixel.y,
            t: projection.t,
        }
    }
}

/// CSV export of projected points (`point,u,v,pixel_x,pixel_y,t`).
pub struct ProjectedPointWriter;

impl ProjectedPointWriter {
    pub fn write<P: AsRef<Path>>(path: P, records: &[ProjectedPointRecord]) -> Result<(), IoError> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path).map_err(|e| {
            IoError::Csv(e).log_with_source(format!("Failed to create {}", path.display()))
        })?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        info!("Wrote {} projected points to {}", records.len(), path.display());
        Ok(())
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Vec<ProjectedPointRecord>, IoError> {
        let mut reader = csv::Reader::from_path(path)?;
        reader
            .deserialize()
            .map(|record| record.map_err(IoError::from))
            .collect()
    }
}
