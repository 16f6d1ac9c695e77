//! Error types for the background removal pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, BgRemovalError>;

/// Error taxonomy for the background removal pipeline
#[derive(Error, Debug)]
pub enum BgRemovalError {
    /// Input bytes are not a parsable image; fatal to the invocation, never retried
    #[error("Decode error: {0}")]
    Decode(String),

    /// A removal strategy failed; triggers fallback until the last tier
    #[error("Removal error: {0}")]
    Removal(String),

    /// Malformed background color specification
    #[error("Compositing error: {0}")]
    Compositing(String),

    /// Input rejected by upload validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Model loading or initialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BgRemovalError {
    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new removal error
    pub fn removal<S: Into<String>>(msg: S) -> Self {
        Self::Removal(msg.into())
    }

    /// Create a new compositing error
    pub fn compositing<S: Into<String>>(msg: S) -> Self {
        Self::Compositing(msg.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error should make the selector try the next strategy tier
    #[must_use]
    pub fn is_fallback_eligible(&self) -> bool {
        !matches!(self, Self::Decode(_))
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create decode error with path context
    pub fn decode_error<P: AsRef<std::path::Path>>(path: P, error: &image::ImageError) -> Self {
        let path_display = path.as_ref().display();
        Self::Decode(format!(
            "Failed to decode image '{}': {}. Supported formats: JPEG, PNG, WebP",
            path_display, error
        ))
    }

    /// Create removal error tagged with the strategy that produced it
    pub fn strategy_error(strategy: &str, details: &str) -> Self {
        Self::Removal(format!("{} strategy failed: {}", strategy, details))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Create processing error with stage context
    pub fn processing_stage_error(stage: &str, details: &str, input_info: Option<&str>) -> Self {
        let input_context = match input_info {
            Some(info) => format!(" (input: {})", info),
            None => String::new(),
        };

        Self::Internal(format!(
            "Processing failed at stage '{}'{}: {}",
            stage, input_context, details
        ))
    }
}
