//! Mask / Overlay Generation Binary
//!
//! Projects a source point cloud for every emitter row of a geometry table and writes one
//! marker image per emitter.
//!
//! # Usage
//! ```bash
//! # Vessel masks from tomosynthesis-reconstruction points (mask_ct_01.png, ...)
//! cargo run --release --bin make_overlays -- geo.txt recon_points.csv out/ --style mask
//!
//! # Vessel overlays from CT points with 0.5 mm spacing (vessOverlay_01.png, ...)
//! cargo run --release --bin make_overlays -- geo.txt ct_points.csv out/ --style overlay --spacing 0.5
//! ```

use clap::{ArgAction, Parser, ValueEnum};
use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;
use tomo_register::config::ImageSize;
use tomo_register::overlay::{OverlayRenderer, OverlayStyle};
use tomo_register::{
    FileImageIo, GeometryTableLoader, PointCloudLoader, Pose6, init_logger_for_verbosity,
};
use tracing::info;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Style {
    /// Tomosynthesis-reconstruction masks, 20x24 markers
    Mask,
    /// CT vessel overlays, 6x6 markers
    Overlay,
}

/// Write one mask or overlay image per emitter position
#[derive(Parser)]
#[command(name = "make_overlays")]
#[command(about = "Write one mask or overlay image per emitter position")]
struct Args {
    /// Emitter geometry table (one `x y z` row per acquisition)
    #[arg(value_name = "GEOMETRY")]
    geometry: PathBuf,

    /// Source point cloud (`.csv` with x,y,z header, or whitespace rows)
    #[arg(value_name = "POINTS")]
    points: PathBuf,

    /// Output directory
    #[arg(value_name = "DEST_DIR")]
    dest_dir: PathBuf,

    /// Marker style
    #[arg(long, value_enum, default_value_t = Style::Mask)]
    style: Style,

    /// Volume x/y spacing (overlay style only)
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

    /// Output image extension
    #[arg(long, default_value = "png")]
    extension: String,

    /// More log output: -v for per-evaluation debug, -vv for trace
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    init_logger_for_verbosity(args.verbose);

    let size = ImageSize::new(args.width, args.height);
    size.validate()?;

    let rows = GeometryTableLoader::load(&args.geometry)?;
    let points = PointCloudLoader::load(&args.points)?;

    let style = match args.style {
        Style::Mask => OverlayStyle::tomo_recon_mask(),
        Style::Overlay => OverlayStyle::ct_overlay(args.spacing),
    }
    .with_extension(args.extension);
    info!("Style: {}", style);

    let mut renderer = OverlayRenderer::new(style, size);
    if let Some(values) = &args.pose {
        let pose = Pose6::from_slice(values)?;
        info!("Applying {}", pose);
        renderer = renderer.with_pose(&pose);
    }

    std::fs::create_dir_all(&args.dest_dir)?;
    let start = Instant::now();
    let written = renderer.write_all(&rows, &points, &args.dest_dir, &FileImageIo)?;
    info!(
        "Wrote {} images to {} in {:?}",
        written.len(),
        args.dest_dir.display(),
        start.elapsed()
    );
    Ok(())
}
