//! Otsu threshold + largest outer contour strategy

use super::filters::{binary_threshold, bt601_luma, gaussian_blur};
use crate::{
    error::Result,
    strategy::RemovalStrategy,
    types::{CutoutResult, SegmentationMask, SourceImage, StrategyCapability},
};
use image::{GrayImage, Luma};
use imageproc::{
    contours::{BorderType, Contour},
    point::Point,
};
use tracing::instrument;

const BLUR_KERNEL_SIZE: usize = 5;

/// Keeps the largest bright region found by Otsu thresholding
///
/// Works well on product shots against a darker uniform backdrop.
/// An image with no contour at all yields a fully transparent cutout.
#[derive(Debug, Clone, Default)]
pub struct ContourStrategy;

impl ContourStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Final mask for a grayscale image
    #[must_use]
    pub fn compute_mask(gray: &GrayImage) -> SegmentationMask {
        let blurred = gaussian_blur(gray, BLUR_KERNEL_SIZE);
        let level = imageproc::contrast::otsu_level(&blurred);
        let binary = binary_threshold(&blurred, level);
        log::debug!("Otsu level {}", level);

        let contours = imageproc::contours::find_contours::<i32>(&binary);
        let Some(largest) = contours
            .iter()
            .filter(|c| c.border_type == BorderType::Outer)
            .max_by_key(|c| contour_area_x2(c))
        else {
            log::debug!("No outer contour found, returning empty mask");
            return SegmentationMask::empty(gray.width(), gray.height());
        };

        let mut mask = GrayImage::new(gray.width(), gray.height());
        fill_contour(&mut mask, &largest.points);
        SegmentationMask::from_image(&gaussian_blur(&mask, BLUR_KERNEL_SIZE))
    }
}

/// Twice the shoelace area of a closed contour
fn contour_area_x2(contour: &Contour<i32>) -> i64 {
    let points = &contour.points;
    if points.len() < 3 {
        return 0;
    }
    let mut sum = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        sum += i64::from(p.x) * i64::from(q.y) - i64::from(q.x) * i64::from(p.y);
    }
    sum.abs()
}

/// Fill the polygon and its boundary pixels with 255
fn fill_contour(mask: &mut GrayImage, points: &[Point<i32>]) {
    let mut polygon = points.to_vec();
    if polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }
    if polygon.len() >= 3 {
        imageproc::drawing::draw_polygon_mut(mask, &polygon, Luma([255]));
    }

    let (width, height) = mask.dimensions();
    for p in points {
        if let (Ok(x), Ok(y)) = (u32::try_from(p.x), u32::try_from(p.y)) {
            if x < width && y < height {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }
}

impl RemovalStrategy for ContourStrategy {
    fn capability(&self) -> StrategyCapability {
        StrategyCapability::Contour
    }

    #[instrument(skip(self, source), fields(width = source.width(), height = source.height()))]
    fn remove(&self, source: &SourceImage) -> Result<CutoutResult> {
        let gray = bt601_luma(source.image());
        let mask = Self::compute_mask(&gray);
        CutoutResult::from_mask(source.image(), mask, self.capability())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn bright_disc_on_dark(width: u32, height: u32) -> RgbImage {
        let mut image = RgbImage::from_pixel(width, height, Rgb([40, 40, 40]));
        let (cx, cy) = (i64::from(width / 2), i64::from(height / 2));
        let r = i64::from(width.min(height) / 4);
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            let (dx, dy) = (i64::from(x) - cx, i64::from(y) - cy);
            if dx * dx + dy * dy <= r * r {
                *pixel = Rgb([230, 230, 230]);
            }
        }
        image
    }

    #[test]
    fn test_shoelace_area() {
        let square = Contour {
            points: vec![
                Point::new(0, 0),
                Point::new(10, 0),
                Point::new(10, 10),
                Point::new(0, 10),
            ],
            border_type: BorderType::Outer,
            parent: None,
        };
        assert_eq!(contour_area_x2(&square), 200);
    }

    #[test]
    fn test_largest_region_wins() {
        let mut image = RgbImage::from_pixel(100, 80, Rgb([30, 30, 30]));
        for y in 5..10 {
            for x in 5..10 {
                image.put_pixel(x, y, Rgb([250, 250, 250]));
            }
        }
        for y in 30..70 {
            for x in 40..90 {
                image.put_pixel(x, y, Rgb([250, 250, 250]));
            }
        }

        let mask = ContourStrategy::compute_mask(&DynamicImage::ImageRgb8(image).to_luma8());
        assert_eq!(mask.value_at(65, 50), 255);
        assert_eq!(mask.value_at(7, 7), 0);
        assert_eq!(mask.value_at(0, 79), 0);
    }

    #[test]
    fn test_uniform_image_gives_empty_mask() {
        let gray = GrayImage::from_pixel(32, 32, Luma([0]));
        let mask = ContourStrategy::compute_mask(&gray);
        assert_eq!(mask.dimensions, (32, 32));
        assert!(mask.data.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_fill_handles_degenerate_polygons() {
        let mut mask = GrayImage::new(5, 5);
        fill_contour(&mut mask, &[Point::new(2, 2)]);
        assert_eq!(mask.get_pixel(2, 2)[0], 255);

        let mut mask = GrayImage::new(5, 5);
        fill_contour(
            &mut mask,
            &[Point::new(0, 0), Point::new(4, 0), Point::new(4, 4), Point::new(0, 0)],
        );
        assert_eq!(mask.get_pixel(4, 4)[0], 255);
        assert_eq!(mask.get_pixel(0, 4)[0], 0);
    }

    #[test]
    fn test_remove_dimensions_and_capability() {
        let source = SourceImage::from_image(DynamicImage::ImageRgb8(bright_disc_on_dark(120, 90)));
        let cutout = ContourStrategy::new().remove(&source).unwrap();

        assert_eq!(cutout.dimensions(), (120, 90));
        assert_eq!(cutout.mask.dimensions, (120, 90));
        assert_eq!(cutout.capability, StrategyCapability::Contour);
        assert_eq!(cutout.image.get_pixel(60, 45)[3], 255);
        assert_eq!(cutout.image.get_pixel(1, 1)[3], 0);
    }
}
