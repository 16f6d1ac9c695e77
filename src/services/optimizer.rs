//! Input pre-optimization
//!
//! Oversized inputs are downsized before any strategy sees them. The
//! optimized copy lives in a temporary file owned by the returned guard, so
//! it is removed on every exit path.

use crate::{
    config::{PipelineConfig, DEFAULT_JPEG_QUALITY, DEFAULT_MAX_DIMENSIONS},
    error::{BgRemovalError, Result},
    services::OutputFormatHandler,
};
use image::{imageops::FilterType, ImageFormat};
use std::io::{Cursor, Write};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::instrument;

/// Effective input path after optimization
///
/// Dereferences to the path strategies should read. A resized copy is
/// deleted when this value is dropped.
#[derive(Debug)]
pub enum OptimizedImage {
    /// Input was within bounds or could not be optimized
    Original(PathBuf),
    /// Downsized copy in a temporary file
    Resized {
        file: NamedTempFile,
        original: PathBuf,
        dimensions: (u32, u32),
    },
}

impl OptimizedImage {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Original(path) => path,
            Self::Resized { file, .. } => file.path(),
        }
    }

    #[must_use]
    pub fn original_path(&self) -> &Path {
        match self {
            Self::Original(path) => path,
            Self::Resized { original, .. } => original,
        }
    }

    #[must_use]
    pub fn is_resized(&self) -> bool {
        matches!(self, Self::Resized { .. })
    }

    /// New dimensions when resized
    #[must_use]
    pub fn resized_dimensions(&self) -> Option<(u32, u32)> {
        match self {
            Self::Original(_) => None,
            Self::Resized { dimensions, .. } => Some(*dimensions),
        }
    }
}

impl Deref for OptimizedImage {
    type Target = Path;

    fn deref(&self) -> &Path {
        self.path()
    }
}

impl AsRef<Path> for OptimizedImage {
    fn as_ref(&self) -> &Path {
        self.path()
    }
}

/// Downsizes inputs exceeding a bounding box, preserving aspect ratio
#[derive(Debug, Clone)]
pub struct ImageOptimizer {
    max_dimensions: (u32, u32),
    temp_dir: Option<PathBuf>,
    jpeg_quality: u8,
}

impl Default for ImageOptimizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIMENSIONS)
    }
}

impl ImageOptimizer {
    #[must_use]
    pub fn new(max_dimensions: (u32, u32)) -> Self {
        Self {
            max_dimensions,
            temp_dir: None,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            max_dimensions: config.max_dimensions,
            temp_dir: config.temp_dir.clone(),
            jpeg_quality: config.jpeg_quality,
        }
    }

    /// Write optimized copies into `dir` instead of next to the input
    #[must_use]
    pub fn with_temp_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn max_dimensions(&self) -> (u32, u32) {
        self.max_dimensions
    }

    /// Size after fitting `(width, height)` into `max`, or `None` when it already fits
    ///
    /// ```rust
    /// use bgcutout::services::ImageOptimizer;
    ///
    /// assert_eq!(ImageOptimizer::target_dimensions((4000, 3000), (2000, 2000)), Some((2000, 1500)));
    /// assert_eq!(ImageOptimizer::target_dimensions((800, 600), (2000, 2000)), None);
    /// ```
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn target_dimensions(dimensions: (u32, u32), max: (u32, u32)) -> Option<(u32, u32)> {
        let (width, height) = dimensions;
        let (max_width, max_height) = max;
        if width <= max_width && height <= max_height {
            return None;
        }

        let scale = (f64::from(max_width) / f64::from(width))
            .min(f64::from(max_height) / f64::from(height));
        let new_width = (f64::from(width) * scale).round() as u32;
        let new_height = (f64::from(height) * scale).round() as u32;

        Some((
            new_width.clamp(1, max_width.max(1)),
            new_height.clamp(1, max_height.max(1)),
        ))
    }

    /// Optimize `path`, falling back to the original on any failure
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn optimize<P: AsRef<Path>>(&self, path: P) -> OptimizedImage {
        let path = path.as_ref();
        match self.try_optimize(path) {
            Ok(optimized) => optimized,
            Err(e) => {
                log::warn!(
                    "Image optimization failed for {}, using original: {}",
                    path.display(),
                    e
                );
                OptimizedImage::Original(path.to_path_buf())
            },
        }
    }

    /// Optimize `path`, surfacing failures
    ///
    /// # Errors
    /// - Input cannot be read or decoded
    /// - Temporary file cannot be created or written
    pub fn try_optimize(&self, path: &Path) -> Result<OptimizedImage> {
        let bytes = std::fs::read(path)
            .map_err(|e| BgRemovalError::file_io_error("read image for optimization", path, &e))?;
        let format = image::guess_format(&bytes)
            .map_err(|e| BgRemovalError::decode_error(path, &e))?;
        let image = image::load_from_memory_with_format(&bytes, format)
            .map_err(|e| BgRemovalError::decode_error(path, &e))?;

        let original = (image.width(), image.height());
        let Some((new_width, new_height)) = Self::target_dimensions(original, self.max_dimensions)
        else {
            log::debug!(
                "Image {}x{} within {}x{}, no optimization needed",
                original.0,
                original.1,
                self.max_dimensions.0,
                self.max_dimensions.1
            );
            return Ok(OptimizedImage::Original(path.to_path_buf()));
        };

        log::info!(
            "Resizing large image from {}x{} to {}x{}",
            original.0,
            original.1,
            new_width,
            new_height
        );
        let resized = image.resize_exact(new_width, new_height, FilterType::Lanczos3);

        let encoded = match format {
            ImageFormat::Jpeg => OutputFormatHandler::encode_jpeg(&resized, self.jpeg_quality)?,
            other => {
                let mut buffer = Cursor::new(Vec::new());
                resized.write_to(&mut buffer, other)?;
                buffer.into_inner()
            },
        };

        let dir = self.temp_dir_for(path);
        let extension = format.extensions_str().first().copied().unwrap_or("img");
        let mut file = tempfile::Builder::new()
            .prefix("bgcutout_optimized_")
            .suffix(&format!(".{extension}"))
            .tempfile_in(&dir)
            .map_err(|e| BgRemovalError::file_io_error("create temporary file in", &dir, &e))?;
        file.write_all(&encoded)
            .and_then(|()| file.flush())
            .map_err(|e| BgRemovalError::file_io_error("write optimized image", file.path(), &e))?;

        Ok(OptimizedImage::Resized {
            file,
            original: path.to_path_buf(),
            dimensions: (new_width, new_height),
        })
    }

    fn temp_dir_for(&self, input: &Path) -> PathBuf {
        self.temp_dir
            .clone()
            .or_else(|| {
                input
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf)
            })
            .unwrap_or_else(std::env::temp_dir)
    }
}
