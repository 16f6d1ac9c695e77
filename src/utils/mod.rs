//! Shared utilities: model-input preparation and upload validation

pub mod preprocessing;
pub mod validation;

pub use preprocessing::ImagePreprocessor;
pub use validation::{ImageInfo, InputValidator, UploadLimits};
