//! Configuration types for the background removal pipeline

use crate::error::{BgRemovalError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default optimizer ceiling (width, height)
pub const DEFAULT_MAX_DIMENSIONS: (u32, u32) = (2000, 2000);

/// Default RGB distance separating foreground from the corner background color
pub const DEFAULT_CORNER_SENSITIVITY: f32 = 50.0;

/// JPEG quality used for flattened deliveries and re-encoded optimized inputs
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Largest possible Euclidean distance between two RGB colors
const MAX_RGB_DISTANCE: f32 = 441.673;

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

impl std::str::FromStr for ExecutionProvider {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "coreml" => Ok(Self::CoreMl),
            other => Err(BgRemovalError::invalid_config(format!(
                "Unknown execution provider '{}' (expected auto, cpu, cuda or coreml)",
                other
            ))),
        }
    }
}

/// Delivery image format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    #[default]
    Png,
    /// JPEG (no transparency, flattened RGB output)
    Jpeg,
}

/// Configuration for a background removal pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct PipelineConfig {
    /// Optimizer ceiling (width, height)
    pub max_dimensions: (u32, u32),

    /// Downsize oversized inputs before removal
    pub optimize_inputs: bool,

    /// Corner heuristic RGB distance threshold
    pub corner_sensitivity: f32,

    /// JPEG quality for flattened output (1-100)
    pub jpeg_quality: u8,

    /// ONNX model path (None = `$U2NET_HOME/u2net.onnx` or `~/.u2net/u2net.onnx`)
    pub model_path: Option<PathBuf>,

    /// Execution provider for ONNX Runtime
    pub execution_provider: ExecutionProvider,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Allow the neural strategy when its runtime and model are present
    pub enable_neural: bool,

    /// Allow the contour strategy when the imaging toolkit is compiled in
    pub enable_contour: bool,

    /// Directory for optimized temporaries (None = next to the input)
    pub temp_dir: Option<PathBuf>,

    /// Batch worker count (0 = available parallelism)
    pub worker_threads: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_dimensions: DEFAULT_MAX_DIMENSIONS,
            optimize_inputs: true,
            corner_sensitivity: DEFAULT_CORNER_SENSITIVITY,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            model_path: None,
            execution_provider: ExecutionProvider::default(),
            intra_threads: 0,
            enable_neural: true,
            enable_contour: true,
            temp_dir: None,
            worker_threads: 0,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder
    ///
    /// ```rust
    /// use bgcutout::PipelineConfig;
    ///
    /// let config = PipelineConfig::builder()
    ///     .max_dimensions(1024, 1024)
    ///     .corner_sensitivity(40.0)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.max_dimensions, (1024, 1024));
    /// ```
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Zero optimizer ceiling
    /// - JPEG quality outside 1-100
    /// - Corner sensitivity negative, non-finite or above the RGB diagonal
    pub fn validate(&self) -> Result<()> {
        let (max_w, max_h) = self.max_dimensions;
        if max_w == 0 || max_h == 0 {
            return Err(BgRemovalError::config_value_error(
                "max dimensions",
                format!("{}x{}", max_w, max_h),
                ">= 1x1",
                Some("2000x2000".to_string()),
            ));
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(BgRemovalError::config_value_error(
                "JPEG quality",
                self.jpeg_quality,
                "1-100",
                Some(DEFAULT_JPEG_QUALITY),
            ));
        }

        if !self.corner_sensitivity.is_finite()
            || self.corner_sensitivity < 0.0
            || self.corner_sensitivity > MAX_RGB_DISTANCE
        {
            return Err(BgRemovalError::config_value_error(
                "corner sensitivity",
                self.corner_sensitivity,
                "0-441.67",
                Some(DEFAULT_CORNER_SENSITIVITY),
            ));
        }

        Ok(())
    }

    /// Build a configuration from defaults overridden by environment variables
    ///
    /// Recognized: `BGCUTOUT_MODEL_PATH`, `BGCUTOUT_MAX_DIMENSION`,
    /// `BGCUTOUT_SENSITIVITY`, `BGCUTOUT_EXECUTION_PROVIDER`.
    ///
    /// # Errors
    /// - A variable is set but cannot be parsed
    /// - The resulting configuration fails validation
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("BGCUTOUT_MODEL_PATH") {
            config.model_path = Some(PathBuf::from(path));
        }

        if let Ok(value) = std::env::var("BGCUTOUT_MAX_DIMENSION") {
            let side: u32 = value.trim().parse().map_err(|_| {
                BgRemovalError::invalid_config(format!(
                    "BGCUTOUT_MAX_DIMENSION must be a positive integer, got '{}'",
                    value
                ))
            })?;
            config.max_dimensions = (side, side);
        }

        if let Ok(value) = std::env::var("BGCUTOUT_SENSITIVITY") {
            config.corner_sensitivity = value.trim().parse().map_err(|_| {
                BgRemovalError::invalid_config(format!(
                    "BGCUTOUT_SENSITIVITY must be a number, got '{}'",
                    value
                ))
            })?;
        }

        if let Ok(value) = std::env::var("BGCUTOUT_EXECUTION_PROVIDER") {
            config.execution_provider = value.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load a JSON-serialized configuration; missing fields take their defaults
    ///
    /// # Errors
    /// - File cannot be read
    /// - JSON is malformed
    /// - The configuration fails validation
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| BgRemovalError::file_io_error("read config file", path, &e))?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            BgRemovalError::invalid_config(format!(
                "Failed to parse config '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Model path after applying the default location
    #[must_use]
    pub fn resolved_model_path(&self) -> Option<PathBuf> {
        self.model_path.clone().or_else(default_model_path)
    }

    /// Worker count after resolving auto-detection
    #[must_use]
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads > 0 {
            self.worker_threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(4)
        }
    }
}

/// Default U2-Net location: `$U2NET_HOME/u2net.onnx`, else `~/.u2net/u2net.onnx`
#[must_use]
pub fn default_model_path() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("U2NET_HOME") {
        return Some(PathBuf::from(home).join("u2net.onnx"));
    }
    dirs::home_dir().map(|home| home.join(".u2net").join("u2net.onnx"))
}

/// Builder for `PipelineConfig`
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Set optimizer ceiling
    #[must_use]
    pub fn max_dimensions(mut self, width: u32, height: u32) -> Self {
        self.config.max_dimensions = (width, height);
        self
    }

    /// Enable or disable input optimization
    #[must_use]
    pub fn optimize_inputs(mut self, optimize: bool) -> Self {
        self.config.optimize_inputs = optimize;
        self
    }

    /// Set corner heuristic threshold
    #[must_use]
    pub fn corner_sensitivity(mut self, sensitivity: f32) -> Self {
        self.config.corner_sensitivity = sensitivity;
        self
    }

    /// Set JPEG quality (clamped to 1-100)
    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Set ONNX model path
    #[must_use]
    pub fn model_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.model_path = Some(path.into());
        self
    }

    /// Set execution provider
    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    /// Set intra-op thread count
    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    /// Allow or forbid the neural strategy
    #[must_use]
    pub fn enable_neural(mut self, enable: bool) -> Self {
        self.config.enable_neural = enable;
        self
    }

    /// Allow or forbid the contour strategy
    #[must_use]
    pub fn enable_contour(mut self, enable: bool) -> Self {
        self.config.enable_contour = enable;
        self
    }

    /// Set temporary directory for optimized inputs
    #[must_use]
    pub fn temp_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    /// Set batch worker count
    #[must_use]
    pub fn worker_threads(mut self, workers: usize) -> Self {
        self.config.worker_threads = workers;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Any validation failure from [`PipelineConfig::validate`]
    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
