//! Core types flowing through the background removal pipeline

use crate::{
    config::OutputFormat,
    error::{BgRemovalError, Result},
};
use chrono::{DateTime, Utc};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which removal algorithm produced a mask, in descending quality order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyCapability {
    /// Segmentation model through ONNX Runtime
    Neural,
    /// Otsu threshold + largest external contour
    Contour,
    /// Corner color distance, always available
    CornerHeuristic,
}

impl StrategyCapability {
    /// Every tier, best first
    pub const ALL: [Self; 3] = [Self::Neural, Self::Contour, Self::CornerHeuristic];

    /// Short lowercase name used in logs and filenames
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Neural => "neural",
            Self::Contour => "contour",
            Self::CornerHeuristic => "corner-heuristic",
        }
    }
}

impl std::fmt::Display for StrategyCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded input image plus the bytes it came from
///
/// Owned by one pipeline invocation. Strategies read it, never mutate it.
#[derive(Debug, Clone)]
pub struct SourceImage {
    bytes: Vec<u8>,
    image: DynamicImage,
    format: Option<ImageFormat>,
    path: Option<PathBuf>,
}

impl SourceImage {
    /// Read and decode an image file
    ///
    /// # Errors
    /// - `Io` when the file cannot be read
    /// - `Decode` when the bytes are not a supported image
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| BgRemovalError::file_io_error("read image file", path, &e))?;
        let image =
            image::load_from_memory(&bytes).map_err(|e| BgRemovalError::decode_error(path, &e))?;
        let format = image::guess_format(&bytes).ok();

        Ok(Self {
            bytes,
            image,
            format,
            path: Some(path.to_path_buf()),
        })
    }

    /// Decode an in-memory encoded image
    ///
    /// # Errors
    /// - `Decode` when the bytes are not a supported image
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let image = image::load_from_memory(&bytes)
            .map_err(|e| BgRemovalError::decode(format!("Failed to decode image bytes: {}", e)))?;
        let format = image::guess_format(&bytes).ok();

        Ok(Self {
            bytes,
            image,
            format,
            path: None,
        })
    }

    /// Wrap an already decoded image (no encoded bytes are kept)
    #[must_use]
    pub fn from_image(image: DynamicImage) -> Self {
        Self {
            bytes: Vec::new(),
            image,
            format: None,
            path: None,
        }
    }

    #[must_use]
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Encoded bytes; empty when built with [`SourceImage::from_image`]
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// 4 when the source carries alpha, else 3
    #[must_use]
    pub fn channel_count(&self) -> u8 {
        if self.image.color().has_alpha() {
            4
        } else {
            3
        }
    }
}

/// Per-pixel foreground opacity, same size as the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationMask {
    /// Mask data as grayscale values (0-255), row-major
    pub data: Vec<u8>,

    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self { data, dimensions }
    }

    /// Fully transparent mask
    #[must_use]
    pub fn empty(width: u32, height: u32) -> Self {
        Self::new(vec![0; width as usize * height as usize], (width, height))
    }

    #[must_use]
    pub fn from_image(image: &GrayImage) -> Self {
        Self::new(image.as_raw().clone(), image.dimensions())
    }

    /// Convert mask to a grayscale image
    pub fn to_image(&self) -> Result<GrayImage> {
        let (width, height) = self.dimensions;
        GrayImage::from_raw(width, height, self.data.clone())
            .ok_or_else(|| BgRemovalError::internal("Mask data does not match its dimensions"))
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.dimensions.0
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.dimensions.1
    }

    /// Mask value at (x, y), 0 outside bounds
    #[must_use]
    pub fn value_at(&self, x: u32, y: u32) -> u8 {
        if x >= self.dimensions.0 || y >= self.dimensions.1 {
            return 0;
        }
        let index = y as usize * self.dimensions.0 as usize + x as usize;
        self.data.get(index).copied().unwrap_or(0)
    }

    /// Resize the mask to new dimensions
    pub fn resize(&self, new_width: u32, new_height: u32) -> Result<Self> {
        let resized = image::imageops::resize(
            &self.to_image()?,
            new_width,
            new_height,
            image::imageops::FilterType::Lanczos3,
        );
        Ok(Self::from_image(&resized))
    }

    /// Combine source color channels with this mask as alpha
    ///
    /// # Errors
    /// - Mask dimensions differ from the image dimensions
    pub fn apply_to(&self, image: &DynamicImage) -> Result<RgbaImage> {
        let dimensions = (image.width(), image.height());
        if dimensions != self.dimensions {
            return Err(BgRemovalError::internal(format!(
                "Mask {}x{} does not match image {}x{}",
                self.dimensions.0, self.dimensions.1, dimensions.0, dimensions.1
            )));
        }

        let mut rgba = image.to_rgba8();
        for (pixel, alpha) in rgba.pixels_mut().zip(self.data.iter()) {
            pixel[3] = *alpha;
        }
        Ok(rgba)
    }

    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let total_pixels = self.data.len();
        let foreground_pixels = self.data.iter().filter(|&&x| x > 127).count();
        let nonzero_pixels = self.data.iter().filter(|&&x| x > 0).count();

        #[allow(clippy::cast_precision_loss)]
        let foreground_ratio = if total_pixels == 0 {
            0.0
        } else {
            foreground_pixels as f32 / total_pixels as f32
        };

        MaskStatistics {
            total_pixels,
            foreground_pixels,
            nonzero_pixels,
            foreground_ratio,
        }
    }

    /// Tight bounding box `(min_x, min_y, max_x, max_y)` of pixels above `threshold`
    #[must_use]
    pub fn bounding_box(&self, threshold: u8) -> Option<(u32, u32, u32, u32)> {
        let (width, height) = self.dimensions;
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for y in 0..height {
            for x in 0..width {
                if self.value_at(x, y) > threshold {
                    bounds = Some(match bounds {
                        None => (x, y, x, y),
                        Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                    });
                }
            }
        }
        bounds
    }
}

/// Statistics about a segmentation mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskStatistics {
    pub total_pixels: usize,
    pub foreground_pixels: usize,
    pub nonzero_pixels: usize,
    pub foreground_ratio: f32,
}

/// A tier that was tried and failed before the result was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedAttempt {
    pub capability: StrategyCapability,
    pub error: String,
}

/// Timing breakdown of one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Input optimization (0 when skipped)
    pub optimize_ms: u64,
    /// Reading and decoding the input
    pub decode_ms: u64,
    /// Time spent inside strategies, failed tiers included
    pub removal_ms: u64,
    /// Total end-to-end time
    pub total_ms: u64,
}

/// Diagnostics attached to a cutout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    pub timings: ProcessingTimings,
    pub source_dimensions: (u32, u32),
    pub source_format: Option<String>,
    pub failed_attempts: Vec<FailedAttempt>,
    pub processed_at: DateTime<Utc>,
}

impl ProcessingMetadata {
    #[must_use]
    pub fn new(source_dimensions: (u32, u32)) -> Self {
        Self {
            timings: ProcessingTimings::default(),
            source_dimensions,
            source_format: None,
            failed_attempts: Vec::new(),
            processed_at: Utc::now(),
        }
    }

    /// Whether a lower tier had to take over
    #[must_use]
    pub fn fell_back(&self) -> bool {
        !self.failed_attempts.is_empty()
    }
}

/// Transparent-background result of one strategy
#[derive(Debug, Clone)]
pub struct CutoutResult {
    /// RGBA image: source color channels with the mask as alpha
    pub image: RgbaImage,

    /// The mask driving the alpha channel
    pub mask: SegmentationMask,

    /// Tier that produced the mask
    pub capability: StrategyCapability,

    pub metadata: ProcessingMetadata,
}

impl CutoutResult {
    /// Build a cutout from a source image and a mask of the same size
    ///
    /// # Errors
    /// - Mask dimensions differ from the source dimensions
    pub fn from_mask(
        source: &DynamicImage,
        mask: SegmentationMask,
        capability: StrategyCapability,
    ) -> Result<Self> {
        let image = mask.apply_to(source)?;
        let metadata = ProcessingMetadata::new(mask.dimensions);
        Ok(Self {
            image,
            mask,
            capability,
            metadata,
        })
    }

    /// Wrap an RGBA image whose alpha is the mask
    #[must_use]
    pub fn from_rgba(image: RgbaImage, capability: StrategyCapability) -> Self {
        let mask = SegmentationMask::new(
            image.pixels().map(|p| p[3]).collect(),
            image.dimensions(),
        );
        let metadata = ProcessingMetadata::new(image.dimensions());
        Self {
            image,
            mask,
            capability,
            metadata,
        }
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Encode as PNG for transparent delivery
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        crate::services::OutputFormatHandler::encode_png(&DynamicImage::ImageRgba8(
            self.image.clone(),
        ))
    }

    /// Encoded PNG payload with the suggested delivery filename
    pub fn to_encoded(&self) -> Result<EncodedImage> {
        Ok(EncodedImage {
            bytes: self.to_png_bytes()?,
            filename: crate::services::format::TRANSPARENT_FILENAME.to_string(),
            format: OutputFormat::Png,
        })
    }

    /// Save the cutout as PNG
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.image.save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }
}

/// Cutout flattened over an opaque color
#[derive(Debug, Clone)]
pub struct CompositedResult {
    pub image: RgbImage,
    pub background: [u8; 3],
}

impl CompositedResult {
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Encode as JPEG at the given quality
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>> {
        crate::services::OutputFormatHandler::encode_jpeg(
            &DynamicImage::ImageRgb8(self.image.clone()),
            quality,
        )
    }
}

/// Encoded payload handed back to collaborators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    /// Suggested filename, e.g. `processed_image.png` or `background_white.jpg`
    pub filename: String,
    pub format: OutputFormat,
}

impl EncodedImage {
    /// MIME type matching the payload
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        crate::services::OutputFormatHandler::content_type(self.format)
    }

    /// Write the payload to disk
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, &self.bytes)
            .map_err(|e| BgRemovalError::file_io_error("write output", path, &e))
    }
}
