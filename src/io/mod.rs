//! Geometry-table and point-cloud loading, projected-point export.
//!
//! Both input formats are plain text with one 3D point per line:
//! - **Geometry tables** (`geo.txt`): one emitter position per acquisition, `x y z`
//! - **Point clouds**: source points, either the same whitespace layout or a CSV file with
//!   an `x,y,z` header
//!
//! Blank lines and `#` comments are skipped; every parse error carries its line number.

use crate::geometry::Point3;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::error;

pub mod points;
pub mod table;

pub use points::{PointCloudLoader, ProjectedPointRecord, ProjectedPointWriter};
pub use table::GeometryTableLoader;

/// Errors that can occur while reading or writing tables
#[derive(Error, Debug)]
pub enum IoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid number format at line {line}: {value}")]
    InvalidNumber { line: usize, value: String },

    #[error("Missing required fields at line {line}")]
    MissingFields { line: usize },
}

impl IoError {
    /// Emit the error through `tracing` and hand it back for propagation.
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Like [`IoError::log`], with context describing what was being attempted.
    pub fn log_with_source(self, context: String) -> Self {
        error!("{}: {}", context, self);
        self
    }
}

/// One `x, y, z` CSV row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<PointRecord> for Point3 {
    fn from(record: PointRecord) -> Self {
        Point3::new(record.x, record.y, record.z)
    }
}

impl From<&Point3> for PointRecord {
    fn from(point: &Point3) -> Self {
        Self {
            x: point.x,
            y: point.y,
            z: point.z,
        }
    }
}

/// Parse whitespace- or comma-separated rows of three numbers.
pub(crate) fn parse_xyz_rows(content: &str) -> Result<Vec<Point3>, IoError> {
    let mut points = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if let Some(point) = parse_xyz_line(line, idx + 1)? {
            points.push(point);
        }
    }
    Ok(points)
}

fn parse_xyz_line(line: &str, line_num: usize) -> Result<Option<Point3>, IoError> {
    let line = line.trim();

    // Skip empty lines and comments
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let parts: Vec<&str> = line
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .collect();
    if parts.len() < 3 {
        return Err(IoError::MissingFields { line: line_num });
    }

    let parse = |s: &str| {
        s.parse::<f64>().map_err(|_| IoError::InvalidNumber {
            line: line_num,
            value: s.to_string(),
        })
    };

    Ok(Some(Point3::new(
        parse(parts[0])?,
        parse(parts[1])?,
        parse(parts[2])?,
    )))
}

/// Read a whole text file through a memory map.
pub(crate) fn read_text(path: &Path) -> Result<String, IoError> {
    let file = std::fs::File::open(path).map_err(|e| {
        IoError::Io(e).log_with_source(format!("Failed to open {}", path.display()))
    })?;

    // Empty files cannot be mapped on every platform
    if file.metadata()?.len() == 0 {
        return Ok(String::new());
    }

    let mmap = unsafe {
        memmap2::Mmap::map(&file).map_err(|e| {
            IoError::Io(e).log_with_source(format!("Failed to memory-map {}", path.display()))
        })?
    };
    let content = std::str::from_utf8(&mmap).map_err(|e| IoError::Parse {
        line: 0,
        message: format!("Invalid UTF-8: {e}"),
    })?;
    Ok(content.to_string())
}
