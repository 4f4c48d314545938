//! Error types for the tomo-register library
//!
//! This module provides the main error and result types used throughout the library.
//! Every module owns a `thiserror` enum; [`TomoError`] aggregates them so binaries can
//! propagate any failure with `?`.

use crate::{
    config::ConfigError, geometry::GeometryError, imaging::ImageError, io::IoError,
    registration::RegistrationError,
};
use std::fmt::Display;
use thiserror::Error;
use tracing::error;

/// Main result type used throughout the tomo-register library
pub type TomoResult<T> = Result<T, TomoError>;

/// Main error type for the tomo-register library
#[derive(Debug, Error)]
pub enum TomoError {
    /// Degenerate projection geometry or orientation
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// Image read/write failures
    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    /// Table and point-cloud file errors
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// Invalid configuration values
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Registration objective errors
    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    /// Invalid input parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<std::io::Error> for TomoError {
    fn from(err: std::io::Error) -> Self {
        TomoError::Io(IoError::Io(err))
    }
}

impl TomoError {
    /// Emit the error through `tracing` and hand it back for propagation.
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Like [`TomoError::log`], with the lower-level cause that produced it.
    pub fn log_with_source(self, source: impl Display) -> Self {
        error!("{} (caused by: {})", self, source);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn test_tomo_error_display() {
        let error = TomoError::InvalidInput("empty point cloud".to_string());
        assert_eq!(error.to_string(), "Invalid input: empty point cloud");
    }

    #[test]
    fn test_tomo_error_from_io() {
        let io_error = std::io::Error::new(ErrorKind::NotFound, "File not found");
        let error = TomoError::from(io_error);

        match error {
            TomoError::Io(inner) => assert!(inner.to_string().contains("File not found")),
            _ => panic!("Expected IO error"),
        }
    }

    #[test]
    fn test_tomo_error_from_geometry() {
        let error = TomoError::from(GeometryError::DegenerateGeometry { denominator: 0.0 });
        assert!(matches!(error, TomoError::Geometry(_)));
        assert!(error.to_string().starts_with("Geometry error:"));
    }

    #[test]
    fn test_log_returns_same_error() {
        let error = TomoError::InvalidInput("scale".to_string()).log_with_source("zero entry");
        assert!(matches!(error, TomoError::InvalidInput(ref msg) if msg == "scale"));
    }

    #[test]
    fn test_tomo_result_err() {
        let result: TomoResult<i32> = Err(TomoError::InvalidInput("Test error".to_string()));
        assert!(result.is_err());
    }
}
