#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # bgcutout
//!
//! Background removal with layered strategies and automatic fallback.
//!
//! An uploaded image goes through three stages:
//!
//! - **Optimization**: inputs larger than the configured ceiling (2000×2000 by
//!   default) are downsized into a temporary copy that is released when the
//!   invocation ends.
//! - **Removal**: the best available strategy produces an alpha mask. The chain
//!   is neural (ONNX Runtime, feature `onnx`), then contour (imageproc, feature
//!   `vision`), then a corner-color heuristic that is always available. A
//!   failing tier hands over to the next one.
//! - **Delivery**: the transparent cutout is either returned as PNG or
//!   flattened over a solid color and encoded as JPEG.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bgcutout::{BackgroundRemover, PipelineConfig};
//!
//! # fn example() -> bgcutout::Result<()> {
//! let remover = BackgroundRemover::new(PipelineConfig::default())?;
//! let cutout = remover.process("upload.jpg")?;
//! println!("Removed with {} strategy", cutout.capability);
//!
//! let delivered = remover.deliver(&cutout, "#1E90FF")?;
//! delivered.save(&delivered.filename)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Batch processing
//!
//! ```rust,no_run
//! use bgcutout::{BackgroundRemover, BatchProcessor, PipelineConfig};
//! use std::sync::Arc;
//!
//! # async fn example(paths: Vec<std::path::PathBuf>) -> bgcutout::Result<()> {
//! let remover = Arc::new(BackgroundRemover::new(PipelineConfig::default())?);
//! let batch = BatchProcessor::from_remover(remover);
//! for item in batch.process_all(paths).await {
//!     println!("{}: {}", item.path.display(), item.is_success());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - `onnx` (default): neural strategy through ONNX Runtime
//! - `vision` (default): contour strategy and mask smoothing through imageproc
//! - `webp-support` (default): WebP decoding
//! - `tracing-init`: subscriber setup helpers for hosts without their own
//! - `tracing-json`: JSON trace output

pub mod batch;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod models;
pub mod processor;
pub mod services;
#[cfg(feature = "onnx")]
pub mod session_cache;
pub mod spans;
pub mod strategies;
pub mod strategy;
#[cfg(feature = "tracing-init")]
pub mod tracing_config;
pub mod types;
pub mod utils;

use std::path::Path;

pub use batch::{BatchItem, BatchProcessor};
pub use capabilities::CapabilityReport;
pub use config::{ExecutionProvider, OutputFormat, PipelineConfig, PipelineConfigBuilder};
pub use error::{BgRemovalError, Result};
pub use models::{ModelSpec, PreprocessingConfig};
pub use processor::BackgroundRemover;
pub use services::{
    BackgroundCompositor, BackgroundSpec, ImageIOService, ImageOptimizer, OptimizedImage,
    OutputFormatHandler,
};
pub use strategies::CornerHeuristicStrategy;
#[cfg(feature = "vision")]
pub use strategies::ContourStrategy;
#[cfg(feature = "onnx")]
pub use strategies::NeuralStrategy;
pub use strategy::RemovalStrategy;
pub use types::{
    CompositedResult, CutoutResult, EncodedImage, FailedAttempt, MaskStatistics,
    ProcessingMetadata, ProcessingTimings, SegmentationMask, SourceImage, StrategyCapability,
};
pub use utils::{ImageInfo, InputValidator, UploadLimits};

#[cfg(feature = "tracing-init")]
pub use tracing_config::{init_library_tracing, TracingConfig, TracingFormat};

/// Remove the background of the image at `path` and encode it as PNG
///
/// Uses [`PipelineConfig::from_env`], so the model location and optimizer
/// ceiling can be set through `BGCUTOUT_*` variables. Build a
/// [`BackgroundRemover`] directly to reuse one across many calls.
///
/// ```rust,no_run
/// # fn example() -> bgcutout::Result<()> {
/// let encoded = bgcutout::remove_background("upload.jpg")?;
/// assert_eq!(encoded.filename, "processed_image.png");
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// - `InvalidConfig` when an environment override is malformed
/// - `Io` / `Decode` when the input cannot be loaded
/// - `Removal` when every strategy fails
pub fn remove_background<P: AsRef<Path>>(path: P) -> Result<EncodedImage> {
    let remover = BackgroundRemover::new(PipelineConfig::from_env()?)?;
    remover.process(path)?.to_encoded()
}

/// Downsize the image at `path` so it fits within `max_dimensions`
///
/// The returned guard derefs to the path to process. When a resized copy was
/// written, dropping the guard deletes it. Never fails: problems are logged
/// and the original path is returned.
pub fn optimize_for_processing<P: AsRef<Path>>(
    path: P,
    max_dimensions: (u32, u32),
) -> OptimizedImage {
    ImageOptimizer::new(max_dimensions).optimize(path)
}

/// Flatten the stored cutout at `path` over a requested background
///
/// `request` is `transparent`, `white`, `black` or `#RRGGBB`.
///
/// # Errors
/// - `Io` / `Decode` when the cutout cannot be loaded
/// - `Compositing` for a malformed hex request
pub fn add_solid_background<P: AsRef<Path>>(path: P, request: &str) -> Result<EncodedImage> {
    BackgroundCompositor::default().add_solid_background(path, request)
}
