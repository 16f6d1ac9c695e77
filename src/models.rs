//! Segmentation model description for the neural strategy

use crate::{
    config::PipelineConfig,
    error::{BgRemovalError, Result},
};
use std::path::{Path, PathBuf};

/// Input tensor preparation parameters of a segmentation model
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PreprocessingConfig {
    /// Model input size (width, height)
    pub target_size: [u32; 2],
    /// Per-channel mean subtracted after scaling to 0-1
    pub normalization_mean: [f32; 3],
    /// Per-channel standard deviation divided out after mean subtraction
    pub normalization_std: [f32; 3],
}

impl PreprocessingConfig {
    /// U2-Net salient object detection (ImageNet statistics, 320x320)
    pub const U2NET: Self = Self {
        target_size: [320, 320],
        normalization_mean: [0.485, 0.456, 0.406],
        normalization_std: [0.229, 0.224, 0.225],
    };
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self::U2NET
    }
}

/// Location and preprocessing of an ONNX segmentation model
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelSpec {
    pub path: PathBuf,
    pub preprocessing: PreprocessingConfig,
}

impl ModelSpec {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            preprocessing: PreprocessingConfig::U2NET,
        }
    }

    /// Model described by a pipeline configuration, if a location can be resolved
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Option<Self> {
        config.resolved_model_path().map(Self::new)
    }

    /// Short name for tracing and logging
    #[must_use]
    pub fn display_name(&self) -> String {
        format!(
            "external:{}",
            self.path.file_name().unwrap_or_default().to_string_lossy()
        )
    }

    /// Check that the model file exists and looks like an ONNX graph
    ///
    /// # Errors
    /// - Path missing or not a regular file
    /// - Wrong extension
    /// - Empty file
    pub fn validate(&self) -> Result<()> {
        validate_model_file(&self.path)
    }
}

fn validate_model_file(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(BgRemovalError::model(format!(
            "Model file not found: {}",
            path.display()
        )));
    }

    let is_onnx = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("onnx"));
    if !is_onnx {
        return Err(BgRemovalError::model(format!(
            "Model file must have .onnx extension: {}",
            path.display()
        )));
    }

    let metadata = std::fs::metadata(path)
        .map_err(|e| BgRemovalError::file_io_error("read model metadata", path, &e))?;
    if metadata.len() == 0 {
        return Err(BgRemovalError::model(format!(
            "Model file is empty: {}",
            path.display()
        )));
    }

    Ok(())
}
