//! Point Projection Binary
//!
//! Projects a point cloud for one emitter row of a geometry table and exports the plane
//! coordinates, pixel coordinates and ray parameters as CSV.
//!
//! # Usage
//! ```bash
//! cargo run --release --bin project_points -- geo.txt ct_points.csv --row 14 -o projected.csv
//! ```

use clap::{ArgAction, Parser, ValueEnum};
use std::error::Error;
use std::path::PathBuf;
use tomo_register::config::{ImageSize, PixelMapping};
use tomo_register::io::ProjectedPointRecord;
use tomo_register::overlay::AcquisitionPreset;
use tomo_register::{
    DetectorConfig, GeometryTableLoader, PointCloudLoader, Pose6, ProjectedPointWriter,
    RigidTransform3D, init_logger_for_verbosity,
};
use tracing::info;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Preset {
    /// CT geometry with spacing-scaled pixels
    Ct,
    /// Tomosynthesis-reconstruction geometry with full-size pixels
    TomoRecon,
}

/// Project a point cloud for one emitter position and export CSV
#[derive(Parser)]
#[command(name = "project_points")]
#[command(about = "Project a point cloud for one emitter position and export CSV")]
struct Args {
    /// Emitter geometry table (one `x y z` row per acquisition)
    #[arg(value_name = "GEOMETRY")]
    geometry: PathBuf,

    /// Source point cloud
    #[arg(value_name = "POINTS")]
    points: PathBuf,

    /// 0-based geometry row to project for
    #[arg(long, default_value_t = 0)]
    row: usize,

    /// Output CSV path
    #[arg(short, long, default_value = "projected.csv")]
    output: PathBuf,

    /// Acquisition geometry
    #[arg(long, value_enum, default_value_t = Preset::Ct)]
    preset: Preset,

    /// Volume x/y spacing (CT preset only)
    #[arg(long, default_value_t = 1.0)]
    spacing: f64,

    /// Detector width in pixels
    #[arg(long, default_value_t = 1536)]
    width: usize,

    /// Detector height in pixels
    #[arg(long, default_value_t = 2048)]
    height: usize,

    /// Pose applied to the points first: tx,ty,tz,rz,ry,rx
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pose: Option<Vec<f64>>,

    /// More log output: -v for per-evaluation debug, -vv for trace
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    init_logger_for_verbosity(args.verbose);

    let size = ImageSize::new(args.width, args.height);
    size.validate()?;
    let detector = DetectorConfig::default();

    let rows = GeometryTableLoader::load(&args.geometry)?;
    let emitter_row = rows.get(args.row).ok_or_else(|| {
        format!(
            "Row {} requested but {} has {} rows",
            args.row,
            args.geometry.display(),
            rows.len()
        )
    })?;

    let (preset, mapping) = match args.preset {
        Preset::Ct => (
            AcquisitionPreset::Ct,
            PixelMapping::Scaled {
                spacing: args.spacing,
            },
        ),
        Preset::TomoRecon => (AcquisitionPreset::TomoRecon, PixelMapping::FullSize),
    };
    let projector = preset.projector(emitter_row, size, &detector);
    info!("{}", projector.emitter());
    info!("{}", projector.plane());

    let pose = match &args.pose {
        Some(values) => Pose6::from_slice(values)?,
        None => Pose6::identity(),
    };
    let points = RigidTransform3D::build(&pose).apply_all(&PointCloudLoader::load(&args.points)?);

    let projections = projector.project_all(&points)?;
    let records: Vec<ProjectedPointRecord> = projections
        .iter()
        .enumerate()
        .map(|(index, projection)| {
            ProjectedPointRecord::new(index, projection, &projection.to_pixel(&detector, mapping, size))
        })
        .collect();

    ProjectedPointWriter::write(&args.output, &records)?;
    Ok(())
}
