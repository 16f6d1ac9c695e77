//! Tensor preparation and mask recovery for the neural strategy

use crate::{
    error::{BgRemovalError, Result},
    models::PreprocessingConfig,
    types::SegmentationMask,
};
use image::{imageops::FilterType, DynamicImage, GrayImage, RgbImage};
use ndarray::{Array4, ArrayViewD, Axis, Ix4};

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Convert an image into a normalized NCHW tensor
    ///
    /// The image is resized (Lanczos3, aspect ratio not preserved) to the
    /// model input size, scaled by its brightest channel value, then
    /// normalized per channel.
    ///
    /// # Errors
    /// - Zero-sized input or target
    pub fn preprocess_for_inference(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<Array4<f32>> {
        let [target_width, target_height] = preprocessing_config.target_size;
        if image.width() == 0 || image.height() == 0 || target_width == 0 || target_height == 0 {
            return Err(BgRemovalError::processing_stage_error(
                "preprocessing",
                "image and target size must be non-zero",
                Some(&format!("{}x{}", image.width(), image.height())),
            ));
        }

        let resized = image::imageops::resize(
            &image.to_rgb8(),
            target_width,
            target_height,
            FilterType::Lanczos3,
        );

        Ok(Self::canvas_to_tensor(&resized, preprocessing_config))
    }

    /// Convert canvas to normalized tensor
    fn canvas_to_tensor(canvas: &RgbImage, preprocessing_config: &PreprocessingConfig) -> Array4<f32> {
        let (width, height) = canvas.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        let max_value = canvas
            .as_raw()
            .iter()
            .copied()
            .max()
            .map_or(1.0, |v| f32::from(v).max(1e-6));

        let mean = preprocessing_config.normalization_mean;
        let std = preprocessing_config.normalization_std;

        #[allow(clippy::indexing_slicing)]
        // Safe: tensor dimensions pre-allocated to match canvas size
        for (x, y, pixel) in canvas.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for channel in 0..3 {
                tensor[[0, channel, y, x]] =
                    (f32::from(pixel[channel]) / max_value - mean[channel]) / std[channel];
            }
        }

        tensor
    }

    /// Turn the first output channel into a mask of the source size
    ///
    /// Values are min-max normalized to 0-255 then resized with Lanczos3.
    ///
    /// # Errors
    /// - Output is not 4-dimensional or has no channel
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn output_to_mask(
        output: &ArrayViewD<'_, f32>,
        source_width: u32,
        source_height: u32,
    ) -> Result<SegmentationMask> {
        let output = output
            .view()
            .into_dimensionality::<Ix4>()
            .map_err(|e| {
                BgRemovalError::removal(format!(
                    "Expected NCHW model output, got shape {:?}: {}",
                    output.shape(),
                    e
                ))
            })?;
        let (_, channels, out_height, out_width) = output.dim();
        if channels == 0 {
            return Err(BgRemovalError::removal("Model output has no channels"));
        }

        let first = output.index_axis(Axis(1), 0);
        let (min, max) = first
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let range = if (max - min).abs() > f32::EPSILON {
            max - min
        } else {
            1.0
        };

        let raw: Vec<u8> = first
            .index_axis(Axis(0), 0)
            .iter()
            .map(|&v| (((v - min) / range) * 255.0).round().clamp(0.0, 255.0) as u8)
            .collect();

        let small = GrayImage::from_raw(out_width as u32, out_height as u32, raw)
            .ok_or_else(|| BgRemovalError::internal("Model output buffer size mismatch"))?;
        let full = image::imageops::resize(&small, source_width, source_height, FilterType::Lanczos3);
        Ok(SegmentationMask::from_image(&full))
    }
}
