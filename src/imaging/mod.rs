//! Image sampling, reading and writing.
//!
//! The registration core only needs point sampling and bounds checks, expressed by the
//! [`IntensityImage`] trait. Files are decoded through the `image` crate into an owned
//! [`DetectorImage`] and shared between threads behind `Arc`. [`ImageCache`] reads each path
//! once so the objective never touches the filesystem inside the optimizer loop.
//!
//! Coordinates are `(row, col)`: rows follow pixel y, columns follow pixel x.

use image::{DynamicImage, ImageBuffer, Luma, Primitive};
use nalgebra::DMatrix;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, error};

/// Image read/write errors.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Failed to read image {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to write image {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error("Pixel buffer has {actual} values, expected {expected} for {rows}x{cols}")]
    BufferSize {
        rows: usize,
        cols: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Image cache lock poisoned")]
    CachePoisoned,
}

impl ImageError {
    /// Emit the error through `tracing` and hand it back for propagation.
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }
}

/// Point-sampling capability the registration objective depends on.
pub trait IntensityImage: Send + Sync {
    /// `(rows, cols)`.
    fn bounds(&self) -> (usize, usize);

    /// Intensity at `(row, col)`, `None` outside the image.
    fn sample(&self, row: usize, col: usize) -> Option<f64>;

    fn contains(&self, row: usize, col: usize) -> bool {
        let (rows, cols) = self.bounds();
        row < rows && col < cols
    }
}

/// Owned grayscale intensity image.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorImage {
    pixels: DMatrix<f64>,
}

impl DetectorImage {
    pub fn new(pixels: DMatrix<f64>) -> Self {
        Self { pixels }
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::new(DMatrix::zeros(rows, cols))
    }

    /// Build from row-major samples.
    pub fn from_row_slice(rows: usize, cols: usize, data: &[f64]) -> Result<Self, ImageError> {
        if data.len() != rows * cols {
            return Err(ImageError::BufferSize {
                rows,
                cols,
                expected: rows * cols,
                actual: data.len(),
            });
        }
        Ok(Self::new(DMatrix::from_row_slice(rows, cols, data)))
    }

    pub fn pixels(&self) -> &DMatrix<f64> {
        &self.pixels
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        if row < self.pixels.nrows() && col < self.pixels.ncols() {
            self.pixels[(row, col)] = value;
        }
    }
}

impl IntensityImage for DetectorImage {
    fn bounds(&self) -> (usize, usize) {
        self.pixels.shape()
    }

    fn sample(&self, row: usize, col: usize) -> Option<f64> {
        self.pixels.get((row, col)).copied()
    }
}

/// 8-bit mask / overlay image.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskImage {
    pixels: DMatrix<u8>,
}

impl MaskImage {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            pixels: DMatrix::zeros(rows, cols),
        }
    }

    pub fn pixels(&self) -> &DMatrix<u8> {
        &self.pixels
    }

    pub fn rows(&self) -> usize {
        self.pixels.nrows()
    }

    pub fn cols(&self) -> usize {
        self.pixels.ncols()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<u8> {
        self.pixels.get((row, col)).copied()
    }

    /// Fill `[row_start, row_end) × [col_start, col_end)`, clipped to the image.
    pub fn fill_rect(&mut self, rows: (i64, i64), cols: (i64, i64), value: u8) {
        let clip = |range: (i64, i64), len: usize| {
            let start = range.0.clamp(0, len as i64) as usize;
            let end = range.1.clamp(0, len as i64) as usize;
            start..end.max(start)
        };
        let row_range = clip(rows, self.rows());
        let col_range = clip(cols, self.cols());
        for r in row_range {
            for c in col_range.clone() {
                self.pixels[(r, c)] = value;
            }
        }
    }

    /// Number of non-zero pixels.
    pub fn count_nonzero(&self) -> usize {
        self.pixels.iter().filter(|&&v| v != 0).count()
    }
}

impl IntensityImage for MaskImage {
    fn bounds(&self) -> (usize, usize) {
        self.pixels.shape()
    }

    fn sample(&self, row: usize, col: usize) -> Option<f64> {
        self.get(row, col).map(f64::from)
    }
}

/// Image-reading capability.
pub trait ImageReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<DetectorImage, ImageError>;
}

/// Image-writing capability.
pub trait ImageWriter: Send + Sync {
    fn write(&self, path: &Path, image: &MaskImage) -> Result<(), ImageError>;
}

/// File-backed reader/writer built on the `image` crate.
///
/// Reads keep each file's native sample values: an 8-bit 255 samples as 255.0 and a 16-bit
/// 4000 as 4000.0. Colour files are reduced to luma at their own bit depth. Writes produce
/// 8-bit grayscale in the format implied by the file extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileImageIo;

impl ImageReader for FileImageIo {
    fn read(&self, path: &Path) -> Result<DetectorImage, ImageError> {
        let decoded = image::open(path).map_err(|e| {
            ImageError::Read {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
            .log()
        })?;

        let pixels = match &decoded {
            DynamicImage::ImageLuma8(buffer) => luma_to_matrix(buffer),
            DynamicImage::ImageLuma16(buffer) => luma_to_matrix(buffer),
            DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageRgb8(_)
            | DynamicImage::ImageRgba8(_) => luma_to_matrix(&decoded.to_luma8()),
            DynamicImage::ImageLumaA16(_)
            | DynamicImage::ImageRgb16(_)
            | DynamicImage::ImageRgba16(_) => luma_to_matrix(&decoded.to_luma16()),
            _ => luma_to_matrix(&decoded.to_luma32f()),
        };
        let (rows, cols) = pixels.shape();
        debug!("Read {} ({}x{})", path.display(), cols, rows);
        Ok(DetectorImage::new(pixels))
    }
}

/// Copy a single-channel buffer into a `(row, col)` matrix without rescaling.
fn luma_to_matrix<S>(buffer: &ImageBuffer<Luma<S>, Vec<S>>) -> DMatrix<f64>
where
    S: Primitive + Into<f64>,
{
    let (width, height) = buffer.dimensions();
    DMatrix::from_fn(height as usize, width as usize, |r, c| {
        buffer.get_pixel(c as u32, r as u32).0[0].into()
    })
}

impl ImageWriter for FileImageIo {
    fn write(&self, path: &Path, mask: &MaskImage) -> Result<(), ImageError> {
        let mut buffer = image::GrayImage::new(mask.cols() as u32, mask.rows() as u32);
        for (x, y, pixel) in buffer.enumerate_pixels_mut() {
            *pixel = image::Luma([mask.pixels[(y as usize, x as usize)]]);
        }
        buffer.save(path).map_err(|e| {
            ImageError::Write {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
            .log()
        })?;
        debug!("Wrote {} ({}x{})", path.display(), mask.cols(), mask.rows());
        Ok(())
    }
}

/// Read-once image cache keyed by path.
pub struct ImageCache {
    reader: Box<dyn ImageReader>,
    images: RwLock<HashMap<PathBuf, Arc<DetectorImage>>>,
}

impl ImageCache {
    pub fn new(reader: Box<dyn ImageReader>) -> Self {
        Self {
            reader,
            images: RwLock::new(HashMap::new()),
        }
    }

    /// Cache backed by [`FileImageIo`].
    pub fn from_files() -> Self {
        Self::new(Box::new(FileImageIo))
    }

    /// Return the cached image, reading it on first access.
    pub fn get(&self, path: &Path) -> Result<Arc<DetectorImage>, ImageError> {
        {
            let images = self.images.read().map_err(|_| ImageError::CachePoisoned)?;
            if let Some(image) = images.get(path) {
                return Ok(Arc::clone(image));
            }
        }

        let image = Arc::new(self.reader.read(path)?);
        let mut images = self.images.write().map_err(|_| ImageError::CachePoisoned)?;
        let entry = images
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::clone(&image));
        Ok(Arc::clone(entry))
    }

    /// Load every path, in order.
    pub fn load_all<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<Arc<DetectorImage>>, ImageError> {
        paths.iter().map(|p| self.get(p.as_ref())).collect()
    }

    /// Number of cached images.
    pub fn len(&self) -> Result<usize, ImageError> {
        let images = self
            .images
            .read()
            .map_err(|_| ImageError::CachePoisoned.log())?;
        Ok(images.len())
    }

    pub fn is_empty(&self) -> Result<bool, ImageError> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    struct CountingReader {
        reads: Arc<AtomicUsize>,
    }

    impl ImageReader for CountingReader {
        fn read(&self, _path: &Path) -> Result<DetectorImage, ImageError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            DetectorImage::from_row_slice(1, 2, &[7.0, 9.0])
        }
    }

    #[test]
    fn test_detector_image_sampling() -> TestResult {
        let image = DetectorImage::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])?;
        assert_eq!(image.bounds(), (2, 3));
        assert_eq!(image.sample(0, 2), Some(3.0));
        assert_eq!(image.sample(1, 0), Some(4.0));
        assert_eq!(image.sample(2, 0), None);
        assert_eq!(image.sample(0, 3), None);
        assert!(image.contains(1, 2));
        assert!(!image.contains(1, 3));
        Ok(())
    }

    #[test]
    fn test_buffer_size_mismatch() {
        let result = DetectorImage::from_row_slice(2, 2, &[1.0, 2.0, 3.0]);
        assert!(matches!(
            result,
            Err(ImageError::BufferSize {
                expected: 4,
                actual: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_mask_fill_rect_clips() {
        let mut mask = MaskImage::zeros(4, 5);
        mask.fill_rect((-2, 2), (3, 8), 255);
        assert_eq!(mask.count_nonzero(), 2 * 2);
        assert_eq!(mask.get(0, 3), Some(255));
        assert_eq!(mask.get(1, 4), Some(255));
        assert_eq!(mask.get(2, 4), Some(0));

        // Entirely outside
        mask.fill_rect((10, 12), (0, 2), 255);
        assert_eq!(mask.count_nonzero(), 4);
    }

    #[test]
    fn test_cache_reads_each_path_once() -> TestResult {
        let reads = Arc::new(AtomicUsize::new(0));
        let cache = ImageCache::new(Box::new(CountingReader {
            reads: Arc::clone(&reads),
        }));

        let a = cache.get(Path::new("a.png"))?;
        let again = cache.get(Path::new("a.png"))?;
        let _b = cache.get(Path::new("b.png"))?;

        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(reads.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len()?, 2);
        assert!(!cache.is_empty()?);
        assert_eq!(a.sample(0, 1), Some(9.0));
        Ok(())
    }

    #[test]
    fn test_file_round_trip() -> TestResult {
        let dir = TempDir::new()?;
        let path = dir.path().join("mask.png");

        let mut mask = MaskImage::zeros(3, 4);
        mask.fill_rect((1, 2), (0, 4), 255);
        FileImageIo.write(&path, &mask)?;

        let image = FileImageIo.read(&path)?;
        assert_eq!(image.bounds(), (3, 4));
        assert_eq!(image.sample(0, 0), Some(0.0));
        assert_eq!(image.sample(1, 3), Some(255.0));
        Ok(())
    }

    #[test]
    fn test_sixteen_bit_file_keeps_values() -> TestResult {
        let dir = TempDir::new()?;
        let path = dir.path().join("detector.png");

        let buffer: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_fn(3, 2, |x, y| Luma([(1000 * (y * 3 + x)) as u16]));
        buffer.save(&path)?;

        let image = FileImageIo.read(&path)?;
        assert_eq!(image.bounds(), (2, 3));
        assert_eq!(image.sample(0, 0), Some(0.0));
        assert_eq!(image.sample(0, 2), Some(2000.0));
        assert_eq!(image.sample(1, 1), Some(4000.0));
        Ok(())
    }

    #[test]
    fn test_poisoned_cache_reports_error() {
        let cache = Arc::new(ImageCache::new(Box::new(CountingReader {
            reads: Arc::new(AtomicUsize::new(0)),
        })));

        let poisoner = Arc::clone(&cache);
        let joined = std::thread::spawn(move || {
            let _guard = poisoner.images.write();
            panic!("poison the cache lock");
        })
        .join();
        assert!(joined.is_err());

        assert!(matches!(cache.len(), Err(ImageError::CachePoisoned)));
        assert!(matches!(cache.is_empty(), Err(ImageError::CachePoisoned)));
        assert!(matches!(
            cache.get(Path::new("a.png")),
            Err(ImageError::CachePoisoned)
        ));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let result = FileImageIo.read(Path::new("/definitely/not/here.png"));
        assert!(matches!(result, Err(ImageError::Read { .. })));
    }
}
