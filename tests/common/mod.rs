//! Synthetic image fixtures shared by the integration tests

#![allow(dead_code)]

use bgcutout::{
    BgRemovalError, CutoutResult, RemovalStrategy, Result, SourceImage, StrategyCapability,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Uniform backdrop with a filled ellipse in the middle
pub fn subject_on_backdrop(
    width: u32,
    height: u32,
    backdrop: [u8; 3],
    subject: [u8; 3],
) -> RgbImage {
    let mut image = RgbImage::from_pixel(width, height, Rgb(backdrop));
    let (cx, cy) = (f64::from(width) / 2.0, f64::from(height) / 2.0);
    let (rx, ry) = (f64::from(width) / 4.0, f64::from(height) / 4.0);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let dx = (f64::from(x) + 0.5 - cx) / rx;
        let dy = (f64::from(y) + 0.5 - cy) / ry;
        if dx * dx + dy * dy <= 1.0 {
            *pixel = Rgb(subject);
        }
    }
    image
}

/// Save `image` under `dir/name` in the given format
pub fn write_image(dir: &Path, name: &str, image: &RgbImage, format: ImageFormat) -> PathBuf {
    let path = dir.join(name);
    DynamicImage::ImageRgb8(image.clone())
        .save_with_format(&path, format)
        .expect("failed to write fixture image");
    path
}

/// Strategy that always fails and counts its calls
pub struct FailingStrategy {
    capability: StrategyCapability,
    message: String,
    calls: Arc<AtomicUsize>,
}

impl FailingStrategy {
    pub fn new(capability: StrategyCapability, message: &str) -> Self {
        Self {
            capability,
            message: message.to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl RemovalStrategy for FailingStrategy {
    fn capability(&self) -> StrategyCapability {
        self.capability
    }

    fn remove(&self, _source: &SourceImage) -> Result<CutoutResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(BgRemovalError::removal(self.message.clone()))
    }
}
