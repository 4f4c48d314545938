//! # Tomo Register
//!
//! Perspective projection and intensity-based pose registration for aligning
//! tomosynthesis / CT reconstruction geometry with acquired projection images.
//!
//! ## Features
//!
//! - **Line-plane projection**: project 3D points onto a detector plane along the ray from an
//!   X-ray emitter, expressed in the plane's own 2D basis
//! - **Rigid transforms**: six-parameter poses (tx, ty, tz, rz, ry, rx) composed as
//!   Z, then Y, then X rotation, then translation
//! - **Versor Jacobian**: analytic 3×6 derivatives for gradient-based optimizer clients
//! - **Registration objective**: inverted average intensity over all emitter views, ready for a
//!   black-box minimizer
//! - **Overlays**: mask and vessel overlay rasterisation per emitter position
//!
//! ## Data flow
//!
//! ```text
//! optimizer -> Pose6 -> RigidTransform3D -> PerspectiveProjector -> PixelMapping
//!           <- cost  <- average intensity <- IntensityImage::sample
//! ```

pub mod config;
pub mod error;
pub mod geometry;
pub mod imaging;
pub mod io;
pub mod logger;
pub mod overlay;
pub mod registration;

// Re-export configuration
pub use config::{
    ConfigError, DetectorConfig, ImageSize, MarkerFootprint, PIXEL_PITCH, PixelMapping,
    REFERENCE_INTENSITY, RegistrationConfig,
};

// Re-export error types
pub use error::{TomoError, TomoResult};

// Re-export geometry types
pub use geometry::jacobian::{VersorConvention, VersorJacobian};
pub use geometry::projection::{PerspectiveProjector, ProjectionResult};
pub use geometry::rigid::RigidTransform3D;
pub use geometry::{EmitterGeometry, GeometryError, PlaneGeometry, Point3, Pose6};

// Re-export image capabilities
pub use imaging::{
    DetectorImage, FileImageIo, ImageCache, ImageError, ImageReader, ImageWriter, IntensityImage,
    MaskImage,
};

// Re-export loaders
pub use io::{
    GeometryTableLoader, IoError, PointCloudLoader, ProjectedPointRecord, ProjectedPointWriter,
};

// Re-export logger
pub use logger::{
    init_logger, init_logger_for_verbosity, init_logger_with_level, level_for_verbosity,
};

// Re-export overlay rendering
pub use overlay::{AcquisitionPreset, OverlayRenderer, OverlayStyle};

// Re-export registration types
pub use registration::{
    CostFunction, EmitterView, Evaluation, RegistrationError, RegistrationObjective,
    project_to_pixel,
};
