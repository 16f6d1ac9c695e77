//! Corner color heuristic, the always-available last tier

use crate::{
    config::DEFAULT_CORNER_SENSITIVITY,
    error::Result,
    strategy::RemovalStrategy,
    types::{CutoutResult, SegmentationMask, SourceImage, StrategyCapability},
};
use image::{GrayImage, Luma, RgbImage};
use tracing::instrument;

/// Treats the dominant corner color as background
///
/// Pixels farther than `sensitivity` (Euclidean RGB distance) from that
/// color are foreground. With the `vision` feature the binary mask is
/// cleaned with close/open and a light blur.
#[derive(Debug, Clone)]
pub struct CornerHeuristicStrategy {
    sensitivity: f32,
}

impl Default for CornerHeuristicStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_CORNER_SENSITIVITY)
    }
}

impl CornerHeuristicStrategy {
    #[must_use]
    pub fn new(sensitivity: f32) -> Self {
        Self { sensitivity }
    }

    #[must_use]
    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    /// Most frequent corner color (TL, TR, BL, BR); ties go to the earliest corner
    #[must_use]
    pub fn background_color(image: &RgbImage) -> [u8; 3] {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return [0, 0, 0];
        }
        let (right, bottom) = (width - 1, height - 1);
        let corners = [
            image.get_pixel(0, 0).0,
            image.get_pixel(right, 0).0,
            image.get_pixel(0, bottom).0,
            image.get_pixel(right, bottom).0,
        ];

        let mut best = corners[0];
        let mut best_count = 0;
        for candidate in corners {
            let count = corners.iter().filter(|&&c| c == candidate).count();
            if count > best_count {
                best = candidate;
                best_count = count;
            }
        }
        best
    }

    /// Binary foreground mask before any smoothing
    #[must_use]
    pub fn binary_mask(&self, image: &RgbImage) -> GrayImage {
        let background = Self::background_color(image);
        let threshold_sq = self.sensitivity * self.sensitivity;

        let mut mask = GrayImage::new(image.width(), image.height());
        for (x, y, pixel) in image.enumerate_pixels() {
            let distance_sq: f32 = pixel
                .0
                .iter()
                .zip(background.iter())
                .map(|(&p, &b)| {
                    let d = f32::from(p) - f32::from(b);
                    d * d
                })
                .sum();
            if distance_sq > threshold_sq {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        mask
    }

    /// Final mask for an image
    #[must_use]
    pub fn compute_mask(&self, image: &RgbImage) -> SegmentationMask {
        let mask = self.binary_mask(image);

        #[cfg(feature = "vision")]
        let mask = super::filters::smooth_binary_mask(&mask);

        SegmentationMask::from_image(&mask)
    }
}

impl RemovalStrategy for CornerHeuristicStrategy {
    fn capability(&self) -> StrategyCapability {
        StrategyCapability::CornerHeuristic
    }

    #[instrument(skip(self, source), fields(width = source.width(), height = source.height()))]
    fn remove(&self, source: &SourceImage) -> Result<CutoutResult> {
        let rgb = source.image().to_rgb8();
        let mask = self.compute_mask(&rgb);
        log::debug!(
            "Corner heuristic foreground ratio: {:.3}",
            mask.statistics().foreground_ratio
        );
        CutoutResult::from_mask(source.image(), mask, self.capability())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb};

    fn shape_on_backdrop() -> RgbImage {
        let mut image = RgbImage::from_pixel(60, 40, Rgb([240, 240, 240]));
        for y in 10..30 {
            for x in 20..40 {
                image.put_pixel(x, y, Rgb([200, 30, 30]));
            }
        }
        image
    }

    #[test]
    fn test_background_color_majority() {
        let mut image = RgbImage::from_pixel(4, 4, Rgb([1, 1, 1]));
        image.put_pixel(0, 0, Rgb([9, 9, 9]));
        assert_eq!(CornerHeuristicStrategy::background_color(&image), [1, 1, 1]);
    }

    #[test]
    fn test_background_color_tie_goes_to_first_corner() {
        let mut image = RgbImage::new(4, 4);
        image.put_pixel(0, 0, Rgb([10, 0, 0])); // TL
        image.put_pixel(3, 0, Rgb([20, 0, 0])); // TR
        image.put_pixel(0, 3, Rgb([20, 0, 0])); // BL
        image.put_pixel(3, 3, Rgb([10, 0, 0])); // BR
        assert_eq!(CornerHeuristicStrategy::background_color(&image), [10, 0, 0]);

        let mut image = RgbImage::new(4, 4);
        image.put_pixel(0, 0, Rgb([1, 0, 0]));
        image.put_pixel(3, 0, Rgb([2, 0, 0]));
        image.put_pixel(0, 3, Rgb([3, 0, 0]));
        image.put_pixel(3, 3, Rgb([4, 0, 0]));
        assert_eq!(CornerHeuristicStrategy::background_color(&image), [1, 0, 0]);
    }

    #[test]
    fn test_binary_mask_isolates_shape() {
        let strategy = CornerHeuristicStrategy::default();
        let mask = strategy.binary_mask(&shape_on_backdrop());
        assert_eq!(mask.get_pixel(30, 20)[0], 255);
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
        assert_eq!(mask.get_pixel(5, 35)[0], 0);
    }

    #[test]
    fn test_distance_at_threshold_is_background() {
        let mut image = RgbImage::from_pixel(3, 3, Rgb([0, 0, 0]));
        image.put_pixel(1, 1, Rgb([50, 0, 0]));
        let mask = CornerHeuristicStrategy::new(50.0).binary_mask(&image);
        assert_eq!(mask.get_pixel(1, 1)[0], 0);

        image.put_pixel(1, 1, Rgb([51, 0, 0]));
        let mask = CornerHeuristicStrategy::new(50.0).binary_mask(&image);
        assert_eq!(mask.get_pixel(1, 1)[0], 255);
    }

    #[test]
    fn test_remove_produces_matching_cutout() {
        let source = SourceImage::from_image(DynamicImage::ImageRgb8(shape_on_backdrop()));
        let cutout = CornerHeuristicStrategy::default().remove(&source).unwrap();

        assert_eq!(cutout.dimensions(), (60, 40));
        assert_eq!(cutout.mask.dimensions, (60, 40));
        assert_eq!(cutout.capability, StrategyCapability::CornerHeuristic);
        assert!(cutout.image.get_pixel(30, 20)[3] > 200);
        assert!(cutout.image.get_pixel(2, 2)[3] < 30);
    }
}
