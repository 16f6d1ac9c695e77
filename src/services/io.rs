//! Image I/O operations service
//!
//! Separates file access from the strategies so they only ever see decoded
//! rasters.

use crate::{
    config::OutputFormat,
    error::{BgRemovalError, Result},
    services::OutputFormatHandler,
    types::SourceImage,
};
use image::DynamicImage;
use std::path::Path;

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Read and decode a source image
    ///
    /// # Errors
    /// - `Io` when the file is missing or unreadable
    /// - `Decode` when the content is not a supported image
    ///
    /// # Examples
    /// ```rust,no_run
    /// use bgcutout::services::ImageIOService;
    ///
    /// let source = ImageIOService::load_source("input.jpg")?;
    /// println!("{}x{}", source.width(), source.height());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_source<P: AsRef<Path>>(path: P) -> Result<SourceImage> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(BgRemovalError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        SourceImage::from_path(path_ref)
    }

    /// Decode an image, trusting content over the file extension
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        Self::load_source(path).map(|source| source.image().clone())
    }

    /// Encode and write an image, creating parent directories as needed
    ///
    /// # Errors
    /// - Directory creation or write failure
    /// - Encoder failure
    pub fn save_image<P: AsRef<Path>>(
        image: &DynamicImage,
        path: P,
        format: OutputFormat,
        jpeg_quality: u8,
    ) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                BgRemovalError::file_io_error("create output directory", parent, &e)
            })?;
        }

        let bytes = OutputFormatHandler::encode(image, format, jpeg_quality).map_err(|e| {
            BgRemovalError::processing_stage_error(
                "image save",
                &e.to_string(),
                Some(&format!("format: {:?}, path: {}", format, path_ref.display())),
            )
        })?;

        std::fs::write(path_ref, bytes)
            .map_err(|e| BgRemovalError::file_io_error("write image", path_ref, &e))
    }

    /// Check if a file path has an accepted upload extension
    #[must_use]
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .is_some_and(|ext| matches!(ext.as_str(), "jpg" | "jpeg" | "png" | "webp"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = ImageIOService::load_source("/definitely/missing/input.png");
        assert!(matches!(result, Err(BgRemovalError::Io(_))));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("out.png");
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(12, 7, Rgb([1, 2, 3])));

        ImageIOService::save_image(&image, &path, OutputFormat::Png, 95).unwrap();
        let source = ImageIOService::load_source(&path).unwrap();

        assert_eq!(source.dimensions(), (12, 7));
        assert_eq!(source.format(), Some(image::ImageFormat::Png));
        assert_eq!(source.path(), Some(path.as_path()));
    }

    #[test]
    fn test_content_beats_extension() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("actually_png.jpg");
        let image = DynamicImage::ImageRgb8(RgbImage::new(5, 5));
        ImageIOService::save_image(&image, &path, OutputFormat::Png, 95).unwrap();

        let source = ImageIOService::load_source(&path).unwrap();
        assert_eq!(source.format(), Some(image::ImageFormat::Png));
    }

    #[test]
    fn test_undecodable_file_is_decode_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();

        assert!(matches!(
            ImageIOService::load_source(&path),
            Err(BgRemovalError::Decode(_))
        ));
    }

    #[test]
    fn test_supported_extensions() {
        assert!(ImageIOService::is_supported_format("a.JPG"));
        assert!(ImageIOService::is_supported_format("a.webp"));
        assert!(!ImageIOService::is_supported_format("a.gif"));
        assert!(!ImageIOService::is_supported_format("no_extension"));
    }
}
