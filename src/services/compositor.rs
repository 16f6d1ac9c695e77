//! Solid-background compositing for delivery

use crate::{
    config::{OutputFormat, DEFAULT_JPEG_QUALITY},
    error::{BgRemovalError, Result},
    services::{format::TRANSPARENT_FILENAME, ImageIOService, OutputFormatHandler},
    spans,
    types::{CompositedResult, CutoutResult, EncodedImage},
};
use image::{DynamicImage, Rgb, RgbImage, RgbaImage};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

/// Requested delivery background
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundSpec {
    /// Keep the alpha channel
    Transparent,
    /// Flatten over an opaque RGB color
    Solid([u8; 3]),
}

impl BackgroundSpec {
    pub const WHITE: Self = Self::Solid([255, 255, 255]);
    pub const BLACK: Self = Self::Solid([0, 0, 0]);

    /// Parse a background request
    ///
    /// Accepts `transparent`, `white`, `black` and `#RRGGBB`, matched exactly.
    /// Leading `#` characters are all stripped before the digits. Any other
    /// value, including `BLACK` or a padded ` #RRGGBB`, means white.
    ///
    /// ```rust
    /// use bgcutout::BackgroundSpec;
    ///
    /// assert_eq!(BackgroundSpec::parse("#FF0000").unwrap(), BackgroundSpec::Solid([255, 0, 0]));
    /// assert_eq!(BackgroundSpec::parse("mauve").unwrap(), BackgroundSpec::WHITE);
    /// assert_eq!(BackgroundSpec::parse("BLACK").unwrap(), BackgroundSpec::WHITE);
    /// assert!(BackgroundSpec::parse("#12G456").is_err());
    /// ```
    ///
    /// # Errors
    /// - `Compositing` when a `#` request is not exactly six hex digits
    pub fn parse(request: &str) -> Result<Self> {
        if request.starts_with('#') {
            return parse_hex(request.trim_start_matches('#'))
                .map(Self::Solid)
                .ok_or_else(|| BgRemovalError::compositing(format!("Invalid hex color: {request}")));
        }

        Ok(match request {
            "transparent" => Self::Transparent,
            "black" => Self::BLACK,
            _ => Self::WHITE,
        })
    }

    /// Opaque color, `None` for transparent
    #[must_use]
    pub fn color(&self) -> Option<[u8; 3]> {
        match self {
            Self::Transparent => None,
            Self::Solid(rgb) => Some(*rgb),
        }
    }
}

impl FromStr for BackgroundSpec {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn parse_hex(hex: &str) -> Option<[u8; 3]> {
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

/// Flattens cutouts over solid colors and encodes delivery payloads
#[derive(Debug, Clone)]
pub struct BackgroundCompositor {
    jpeg_quality: u8,
}

impl Default for BackgroundCompositor {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl BackgroundCompositor {
    #[must_use]
    pub fn new(jpeg_quality: u8) -> Self {
        Self { jpeg_quality }
    }

    /// Alpha-blend `image` over `color`, rounding to nearest
    #[must_use]
    pub fn blend(image: &RgbaImage, color: [u8; 3]) -> RgbImage {
        let mut out = RgbImage::new(image.width(), image.height());
        for (dst, src) in out.pixels_mut().zip(image.pixels()) {
            let alpha = u32::from(src[3]);
            let mut rgb = [0u8; 3];
            for (channel, value) in rgb.iter_mut().enumerate() {
                let fg = u32::from(src[channel]);
                let bg = u32::from(color[channel]);
                // Max is (255*255 + 127) / 255 = 255
                #[allow(clippy::cast_possible_truncation)]
                {
                    *value = ((fg * alpha + bg * (255 - alpha) + 127) / 255) as u8;
                }
            }
            *dst = Rgb(rgb);
        }
        out
    }

    /// Flatten a cutout over `color`
    #[must_use]
    pub fn composite(&self, cutout: &CutoutResult, color: [u8; 3]) -> CompositedResult {
        CompositedResult {
            image: Self::blend(&cutout.image, color),
            background: color,
        }
    }

    /// Encode a cutout for delivery against a background request
    ///
    /// `transparent` yields the PNG cutout; anything else the flattened JPEG.
    ///
    /// # Errors
    /// - `Compositing` for a malformed hex request
    /// - Encoder failure
    pub fn deliver(&self, cutout: &CutoutResult, request: &str) -> Result<EncodedImage> {
        let _span = spans::delivery(request).entered();
        let spec = BackgroundSpec::parse(request)?;
        self.encode_rgba(&cutout.image, spec, request)
    }

    /// Load a stored cutout and flatten it over the requested color
    ///
    /// # Errors
    /// - `Io` / `Decode` when the cutout cannot be loaded
    /// - `Compositing` for a malformed hex request
    #[instrument(skip(self, path), fields(path = %path.as_ref().display(), request = %request))]
    pub fn add_solid_background<P: AsRef<Path>>(
        &self,
        path: P,
        request: &str,
    ) -> Result<EncodedImage> {
        let spec = BackgroundSpec::parse(request)?;
        let source = ImageIOService::load_source(path)?;
        if spec == BackgroundSpec::Transparent {
            log::debug!("Transparent background requested, delivering PNG");
        }
        self.encode_rgba(&source.image().to_rgba8(), spec, request)
    }

    fn encode_rgba(
        &self,
        image: &RgbaImage,
        spec: BackgroundSpec,
        request: &str,
    ) -> Result<EncodedImage> {
        match spec {
            BackgroundSpec::Transparent => Ok(EncodedImage {
                bytes: OutputFormatHandler::encode_png(&DynamicImage::ImageRgba8(image.clone()))?,
                filename: TRANSPARENT_FILENAME.to_string(),
                format: OutputFormat::Png,
            }),
            BackgroundSpec::Solid(color) => {
                let flattened = Self::blend(image, color);
                let bytes = OutputFormatHandler::encode_jpeg(
                    &DynamicImage::ImageRgb8(flattened),
                    self.jpeg_quality,
                )?;
                log::debug!(
                    "Composited {}x{} over #{:02X}{:02X}{:02X} ({} bytes)",
                    image.width(),
                    image.height(),
                    color[0],
                    color[1],
                    color[2],
                    bytes.len()
                );
                Ok(EncodedImage {
                    bytes,
                    filename: OutputFormatHandler::suggest_filename(request),
                    format: OutputFormat::Jpeg,
                })
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StrategyCapability;
    use image::Rgba;

    #[test]
    fn test_parse_keywords() {
        assert_eq!(BackgroundSpec::parse("white").unwrap(), BackgroundSpec::WHITE);
        assert_eq!(BackgroundSpec::parse("black").unwrap(), BackgroundSpec::BLACK);
        assert_eq!(
            BackgroundSpec::parse("transparent").unwrap(),
            BackgroundSpec::Transparent
        );
        assert_eq!(BackgroundSpec::parse("purple").unwrap(), BackgroundSpec::WHITE);
        assert_eq!(BackgroundSpec::parse("BLACK").unwrap(), BackgroundSpec::WHITE);
        assert_eq!(BackgroundSpec::parse("White").unwrap(), BackgroundSpec::WHITE);
        assert_eq!(BackgroundSpec::parse("Transparent").unwrap(), BackgroundSpec::WHITE);
        assert_eq!(BackgroundSpec::parse(" #ff0000").unwrap(), BackgroundSpec::WHITE);
        assert_eq!(BackgroundSpec::parse("black ").unwrap(), BackgroundSpec::WHITE);
        assert_eq!(
            "white".parse::<BackgroundSpec>().unwrap(),
            "#FFFFFF".parse::<BackgroundSpec>().unwrap()
        );
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(
            BackgroundSpec::parse("#1a2B3c").unwrap(),
            BackgroundSpec::Solid([0x1a, 0x2b, 0x3c])
        );
        assert_eq!(
            BackgroundSpec::parse("##ff0000").unwrap(),
            BackgroundSpec::Solid([255, 0, 0])
        );
        for bad in ["#12G456", "#12345", "#1234567", "#", "##", "#+1+2+3", "#ff0000 "] {
            let err = BackgroundSpec::parse(bad).unwrap_err();
            assert!(matches!(err, BgRemovalError::Compositing(_)), "{bad}");
        }
    }

    #[test]
    fn test_blend_math() {
        let mut image = RgbaImage::new(3, 1);
        image.put_pixel(0, 0, Rgba([200, 100, 50, 255]));
        image.put_pixel(1, 0, Rgba([200, 100, 50, 0]));
        image.put_pixel(2, 0, Rgba([255, 0, 0, 128]));

        let out = BackgroundCompositor::blend(&image, [0, 0, 255]);
        assert_eq!(*out.get_pixel(0, 0), Rgb([200, 100, 50]));
        assert_eq!(*out.get_pixel(1, 0), Rgb([0, 0, 255]));
        // (255*128 + 127) / 255 = 128; (255*127 + 127) / 255 = 127
        assert_eq!(*out.get_pixel(2, 0), Rgb([128, 0, 127]));
    }

    #[test]
    fn test_deliver_formats_and_names() {
        let cutout = CutoutResult::from_rgba(
            RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 0])),
            StrategyCapability::CornerHeuristic,
        );
        let compositor = BackgroundCompositor::default();

        let png = compositor.deliver(&cutout, "transparent").unwrap();
        assert_eq!(png.filename, "processed_image.png");
        assert_eq!(png.format, OutputFormat::Png);

        let jpeg = compositor.deliver(&cutout, "#00FF00").unwrap();
        assert_eq!(jpeg.filename, "background_hex_00FF00.jpg");
        assert_eq!(jpeg.format, OutputFormat::Jpeg);
        let decoded = image::load_from_memory(&jpeg.bytes).unwrap().to_rgb8();
        let center = decoded.get_pixel(4, 4);
        assert!(center[1] > 240 && center[0] < 15 && center[2] < 15);

        assert!(compositor.deliver(&cutout, "#XYZXYZ").is_err());
    }

    #[test]
    fn test_add_solid_background_reads_stored_cutout() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("processed_image.png");
        RgbaImage::from_pixel(6, 4, Rgba([0, 0, 0, 0]))
            .save(&path)
            .unwrap();
        let compositor = BackgroundCompositor::default();

        let red = compositor.add_solid_background(&path, "##FF0000").unwrap();
        assert_eq!(red.filename, "background_hex_hex_FF0000.jpg");
        let decoded = image::load_from_memory(&red.bytes).unwrap().to_rgb8();
        let pixel = decoded.get_pixel(3, 2);
        assert!(pixel[0] > 240 && pixel[1] < 15 && pixel[2] < 15, "{pixel:?}");

        let png = compositor.add_solid_background(&path, "transparent").unwrap();
        assert_eq!(png.format, OutputFormat::Png);

        // Malformed request fails before the file is read
        let err = compositor
            .add_solid_background(dir.path().join("missing.png"), "#nothex")
            .unwrap_err();
        assert!(matches!(err, BgRemovalError::Compositing(_)));
    }

    #[test]
    fn test_composite_keeps_dimensions() {
        let cutout = CutoutResult::from_rgba(
            RgbaImage::new(5, 3),
            StrategyCapability::Contour,
        );
        let result = BackgroundCompositor::default().composite(&cutout, [0, 0, 0]);
        assert_eq!(result.dimensions(), (5, 3));
        assert_eq!(result.background, [0, 0, 0]);
    }
}
