//! Delivery format handling service
//!
//! Keeps encoding decisions (which container, which quality, which filename)
//! out of the strategies and the compositor.

use crate::{
    config::OutputFormat,
    error::{BgRemovalError, Result},
};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, ImageFormat};
use std::io::Cursor;

/// Filename suggested for transparent deliveries
pub const TRANSPARENT_FILENAME: &str = "processed_image.png";

/// Service for encoding delivery payloads
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Encode an image as PNG, keeping alpha when present
    ///
    /// # Errors
    /// - Encoder failure
    pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }

    /// Encode an image as JPEG at `quality`, dropping alpha
    ///
    /// # Examples
    /// ```rust
    /// use bgcutout::services::OutputFormatHandler;
    /// use image::{DynamicImage, RgbaImage};
    ///
    /// let image = DynamicImage::ImageRgba8(RgbaImage::new(8, 8));
    /// let bytes = OutputFormatHandler::encode_jpeg(&image, 95).unwrap();
    /// assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    /// ```
    ///
    /// # Errors
    /// - Quality outside 1-100
    /// - Encoder failure
    pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        if quality == 0 || quality > 100 {
            return Err(BgRemovalError::config_value_error(
                "JPEG quality",
                quality,
                "1-100",
                Some(crate::config::DEFAULT_JPEG_QUALITY),
            ));
        }

        // JPEG cannot carry alpha
        let rgb = image.to_rgb8();
        let mut buffer = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
        encoder.encode_image(&rgb)?;
        Ok(buffer)
    }

    /// Encode into the requested delivery format
    pub fn encode(image: &DynamicImage, format: OutputFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
        match format {
            OutputFormat::Png => Self::encode_png(image),
            OutputFormat::Jpeg => Self::encode_jpeg(image, jpeg_quality),
        }
    }

    /// File extension (without the dot)
    ///
    /// ```rust
    /// use bgcutout::{services::OutputFormatHandler, OutputFormat};
    ///
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Png), "png");
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Jpeg), "jpg");
    /// ```
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }

    #[must_use]
    pub fn content_type(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }

    /// Check if a format supports transparency (alpha channel)
    #[must_use]
    pub fn supports_transparency(format: OutputFormat) -> bool {
        matches!(format, OutputFormat::Png)
    }

    /// Suggested delivery filename for a background request
    ///
    /// Transparent requests get `processed_image.png`; colors get
    /// `background_<request>.jpg` with `#` spelled as `hex_`.
    ///
    /// ```rust
    /// use bgcutout::services::OutputFormatHandler;
    ///
    /// assert_eq!(OutputFormatHandler::suggest_filename("transparent"), "processed_image.png");
    /// assert_eq!(OutputFormatHandler::suggest_filename("#FF0000"), "background_hex_FF0000.jpg");
    /// ```
    #[must_use]
    pub fn suggest_filename(background_request: &str) -> String {
        if background_request == "transparent" {
            TRANSPARENT_FILENAME.to_string()
        } else {
            format!(
                "background_{}.{}",
                background_request.replace('#', "hex_"),
                Self::get_extension(OutputFormat::Jpeg)
            )
        }
    }

    /// Delivery format for a background request
    #[must_use]
    pub fn format_for_request(background_request: &str) -> OutputFormat {
        if background_request == "transparent" {
            OutputFormat::Png
        } else {
            OutputFormat::Jpeg
        }
    }
}
