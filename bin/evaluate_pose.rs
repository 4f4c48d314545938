//! Pose Evaluation Binary
//!
//! Loads a geometry table, a CT point cloud and one projection image per emitter, then
//! evaluates the registration cost at a pose. Useful for checking a pose found by an
//! external optimizer, or for sweeping one parameter from a shell loop.
//!
//! # Usage
//! ```bash
//! cargo run --release --bin evaluate_pose -- geo.txt ct_points.csv proj_*.png \
//!     --spacing 0.5 --pose=-2.5,1.0,0.0,0.01,0.0,0.0
//! ```

use clap::{ArgAction, Parser};
use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;
use tomo_register::config::ImageSize;
use tomo_register::{
    GeometryTableLoader, ImageCache, PointCloudLoader, RegistrationConfig, RegistrationObjective,
    init_logger_for_verbosity,
};
use tracing::info;

/// Evaluate the registration cost of a pose
#[derive(Parser)]
#[command(name = "evaluate_pose")]
#[command(about = "Evaluate the registration cost of a pose")]
struct Args {
    /// Emitter geometry table (one `x y z` row per acquisition)
    #[arg(value_name = "GEOMETRY")]
    geometry: PathBuf,

    /// CT source point cloud
    #[arg(value_name = "POINTS")]
    points: PathBuf,

    /// Projection images, one per geometry row, in row order
    #[arg(value_name = "IMAGES", num_args = 1..)]
    images: Vec<PathBuf>,

    /// Volume x/y spacing
    #[arg(long, default_value_t = 1.0)]
    spacing: f64,

    /// Detector width in pixels
    #[arg(long, default_value_t = 1536)]
    width: usize,

    /// Detector height in pixels
    #[arg(long, default_value_t = 2048)]
    height: usize,

    /// Scaled pose: tx,ty,tz,rz,ry,rx
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pose: Option<Vec<f64>>,

    /// Per-parameter scale the pose was given in
    #[arg(long, value_delimiter = ',')]
    scale: Option<Vec<f64>>,

    /// More log output: -v for per-evaluation debug, -vv for trace
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    init_logger_for_verbosity(args.verbose);

    let mut config = RegistrationConfig::new()
        .with_image_size(ImageSize::new(args.width, args.height))
        .with_pixel_spacing(args.spacing);
    if let Some(scale) = &args.scale {
        let scale: [f64; 6] = scale
            .as_slice()
            .try_into()
            .map_err(|_| format!("--scale needs 6 values, got {}", scale.len()))?;
        config = config.with_scale(scale);
    }
    info!("{}", config);

    let rows = GeometryTableLoader::load(&args.geometry)?;
    let points = PointCloudLoader::load(&args.points)?;

    let start_load = Instant::now();
    let cache = ImageCache::from_files();
    let objective =
        RegistrationObjective::from_acquisition(points, &rows, &args.images, &cache, config)?;
    info!("Loaded {} images in {:?}", cache.len()?, start_load.elapsed());

    let pose = args.pose.unwrap_or_else(|| vec![0.0; 6]);
    let start = Instant::now();
    let evaluation = objective.evaluate_detailed(&pose)?;
    info!("Evaluation time: {:?}", start.elapsed());
    info!("{}", evaluation);
    Ok(())
}
