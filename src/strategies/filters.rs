//! Mask filtering primitives shared by the heuristic strategies

use image::{DynamicImage, GrayImage, Luma};
use imageproc::distance_transform::Norm;

/// BT.601 luma (0.299 R + 0.587 G + 0.114 B) in 14-bit fixed point
#[must_use]
pub fn bt601_luma(image: &DynamicImage) -> GrayImage {
    let rgb = image.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let luma = (u32::from(r) * 4899 + u32::from(g) * 9617 + u32::from(b) * 1868 + 8192) >> 14;
        // Weights sum to 1 << 14 so luma <= 255
        Luma([u8::try_from(luma).unwrap_or(u8::MAX)])
    })
}

/// Sigma used for a Gaussian of `kernel_size` taps when none is given
#[must_use]
pub fn default_sigma(kernel_size: usize) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let k = kernel_size as f32;
    0.3 * ((k - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1D Gaussian kernel with `kernel_size` taps
#[must_use]
pub fn gaussian_kernel(kernel_size: usize) -> Vec<f32> {
    let sigma = default_sigma(kernel_size);
    #[allow(clippy::cast_precision_loss)]
    let center = (kernel_size as f32 - 1.0) / 2.0;

    #[allow(clippy::cast_precision_loss)]
    let mut kernel: Vec<f32> = (0..kernel_size)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();

    let sum: f32 = kernel.iter().sum();
    if sum > 0.0 {
        kernel.iter_mut().for_each(|w| *w /= sum);
    }
    kernel
}

/// Separable Gaussian blur with a square `kernel_size` window
#[must_use]
pub fn gaussian_blur(image: &GrayImage, kernel_size: usize) -> GrayImage {
    imageproc::filter::separable_filter_equal(image, &gaussian_kernel(kernel_size))
}

/// Binary threshold: values strictly above `level` become 255, the rest 0
#[must_use]
pub fn binary_threshold(image: &GrayImage, level: u8) -> GrayImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        pixel[0] = if pixel[0] > level { 255 } else { 0 };
    }
    out
}

/// Morphological close then open with a 3x3 cross, then a 3x3 blur
#[must_use]
pub fn smooth_binary_mask(mask: &GrayImage) -> GrayImage {
    let closed = imageproc::morphology::close(mask, Norm::L1, 1);
    let opened = imageproc::morphology::open(&closed, Norm::L1, 1);
    gaussian_blur(&opened, 3)
}
