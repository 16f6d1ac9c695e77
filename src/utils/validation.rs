//! Upload validation
//!
//! Rejects inputs the pipeline should never see: oversized files, formats
//! other than JPEG/PNG/WebP, and images too small or too large to process.

use crate::error::{BgRemovalError, Result};
use image::{ImageFormat, ImageReader};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Acceptance limits for uploaded images
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadLimits {
    /// Largest accepted file size in bytes
    pub max_file_size: u64,
    /// Smallest accepted side in pixels
    pub min_dimension: u32,
    /// Largest accepted side in pixels
    pub max_dimension: u32,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_size: 25 * 1024 * 1024,
            min_dimension: 50,
            max_dimension: 6000,
        }
    }
}

/// Facts gathered while validating an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub size_bytes: u64,
}

/// Validator for uploaded image files
pub struct InputValidator;

impl InputValidator {
    /// Formats accepted for upload
    pub const ACCEPTED_FORMATS: [ImageFormat; 3] =
        [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::WebP];

    /// Validate a file against `limits`, sniffing format from content
    ///
    /// Only the header is decoded, so this is cheap even for large files.
    ///
    /// # Errors
    /// - `Io` when the file cannot be opened
    /// - `InvalidInput` for size, format or dimension violations
    pub fn validate_file<P: AsRef<Path>>(path: P, limits: &UploadLimits) -> Result<ImageInfo> {
        let path = path.as_ref();
        let size_bytes = std::fs::metadata(path)
            .map_err(|e| BgRemovalError::file_io_error("read metadata of", path, &e))?
            .len();
        Self::validate_size(size_bytes, limits)?;

        let reader = ImageReader::open(path)
            .map_err(|e| BgRemovalError::file_io_error("open image", path, &e))?
            .with_guessed_format()
            .map_err(|e| BgRemovalError::file_io_error("sniff format of", path, &e))?;
        let format = reader.format().ok_or_else(|| {
            BgRemovalError::invalid_input(format!(
                "Unrecognized image format: {}. Supported formats: JPEG, PNG, WebP",
                path.display()
            ))
        })?;
        Self::validate_format(format)?;

        let (width, height) = reader.into_dimensions().map_err(|e| {
            BgRemovalError::invalid_input(format!(
                "Invalid or corrupted image file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::validate_dimensions(width, height, limits)?;

        log::debug!(
            "Validated upload {} ({:?}, {}x{}, {} bytes)",
            path.display(),
            format,
            width,
            height,
            size_bytes
        );

        Ok(ImageInfo {
            width,
            height,
            format,
            size_bytes,
        })
    }

    /// # Errors
    /// - File larger than the limit
    #[allow(clippy::cast_precision_loss)]
    pub fn validate_size(size_bytes: u64, limits: &UploadLimits) -> Result<()> {
        if size_bytes > limits.max_file_size {
            return Err(BgRemovalError::invalid_input(format!(
                "File size too large ({:.1}MB). Maximum allowed size is {:.0}MB",
                size_bytes as f64 / (1024.0 * 1024.0),
                limits.max_file_size as f64 / (1024.0 * 1024.0)
            )));
        }
        Ok(())
    }

    /// # Errors
    /// - Format outside JPEG, PNG, WebP
    pub fn validate_format(format: ImageFormat) -> Result<()> {
        if Self::ACCEPTED_FORMATS.contains(&format) {
            Ok(())
        } else {
            Err(BgRemovalError::invalid_input(format!(
                "Unsupported file format {:?}. Supported formats: JPEG, PNG, WebP",
                format
            )))
        }
    }

    /// # Errors
    /// - Either side outside the accepted range
    pub fn validate_dimensions(width: u32, height: u32, limits: &UploadLimits) -> Result<()> {
        if width < limits.min_dimension || height < limits.min_dimension {
            return Err(BgRemovalError::invalid_input(format!(
                "Image too small ({}x{}). Minimum size is {}x{} pixels",
                width, height, limits.min_dimension, limits.min_dimension
            )));
        }
        if width > limits.max_dimension || height > limits.max_dimension {
            return Err(BgRemovalError::invalid_input(format!(
                "Image too large ({}x{}). Maximum size is {}x{} pixels",
                width, height, limits.max_dimension, limits.max_dimension
            )));
        }
        Ok(())
    }
}
