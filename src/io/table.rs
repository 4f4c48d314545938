use super::{IoError, parse_xyz_rows, read_text};
use crate::geometry::Point3;
use std::path::Path;
use tracing::info;

/// Emitter geometry table loader (`geo.txt`): one `x y z` emitter position per acquisition.
///
/// Row order is acquisition order; the `n`-th row pairs with the `n`-th projection image.
pub struct GeometryTableLoader;

impl GeometryTableLoader {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Vec<Point3>, IoError> {
        let path = path.as_ref();
        let content = read_text(path)?;
        let rows = Self::parse_content(&content)?;
        info!("Loaded {} emitter positions from {}", rows.len(), path.display());
        Ok(rows)
    }

    pub fn parse_content(content: &str) -> Result<Vec<Point3>, IoError> {
        parse_xyz_rows(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_load_geometry_table() -> TestResult {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "# x y z")?;
        writeln!(file, "-25.0 0.0 650.0")?;
        writeln!(file, "0.0 0.0 650.0")?;
        writeln!(file)?;
        writeln!(file, "25.0 0.0 650.0")?;
        file.flush()?;

        let rows = GeometryTableLoader::load(file.path())?;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], Point3::new(-25.0, 0.0, 650.0));
        assert_eq!(rows[2], Point3::new(25.0, 0.0, 650.0));
        Ok(())
    }

    #[test]
    fn test_empty_table() -> TestResult {
        let file = NamedTempFile::new()?;
        let rows = GeometryTableLoader::load(file.path())?;
        assert!(rows.is_empty());
        Ok(())
    }

    #[test]
    fn test_missing_table_is_io_error() {
        let result = GeometryTableLoader::load("/nonexistent/geo.txt");
        assert!(matches!(result, Err(IoError::Io(_))));
    }

    #[test]
    fn test_error_line_number_counts_comments() {
        let result = GeometryTableLoader::parse_content("# header\n1 2 3\n4 5\n");
        assert!(matches!(result, Err(IoError::MissingFields { line: 3 })));
    }
}
