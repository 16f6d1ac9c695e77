//! Services that keep file access, encoding and image preparation out of
//! the strategies

pub mod compositor;
pub mod format;
pub mod io;
pub mod optimizer;

pub use compositor::{BackgroundCompositor, BackgroundSpec};
pub use format::OutputFormatHandler;
pub use io::ImageIOService;
pub use optimizer::{ImageOptimizer, OptimizedImage};
