//! Removal strategy implementations
//!
//! - Neural: U2-Net segmentation through ONNX Runtime (`onnx` feature)
//! - Contour: Otsu threshold + largest outer contour (`vision` feature)
//! - Corner heuristic: corner color distance, always compiled in

pub mod corner;

#[cfg(feature = "vision")]
pub mod contour;

#[cfg(feature = "vision")]
pub mod filters;

#[cfg(feature = "onnx")]
pub mod neural;

// Test utilities for selector testing
#[cfg(test)]
pub mod test_utils;

pub use self::corner::CornerHeuristicStrategy;

#[cfg(feature = "vision")]
pub use self::contour::ContourStrategy;

#[cfg(feature = "onnx")]
pub use self::neural::NeuralStrategy;
