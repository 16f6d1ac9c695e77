//! Build-capability report
//!
//! Which strategy tiers can run depends on the cargo features this build was
//! compiled with. The report is assembled once per process and every
//! selector reads the cached copy.

use crate::types::StrategyCapability;
use serde::Serialize;
use std::sync::OnceLock;

/// Strategy runtimes compiled into this build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilityReport {
    /// ONNX Runtime linked in (`onnx` feature)
    pub neural_runtime: bool,
    /// Imaging toolkit linked in (`vision` feature)
    pub vision_toolkit: bool,
}

impl CapabilityReport {
    /// Whether a tier's runtime requirements are met
    ///
    /// Model files are checked separately by the strategy itself.
    #[must_use]
    pub fn supports(&self, capability: StrategyCapability) -> bool {
        match capability {
            StrategyCapability::Neural => self.neural_runtime,
            StrategyCapability::Contour => self.vision_toolkit,
            StrategyCapability::CornerHeuristic => true,
        }
    }

    /// Best tier the runtime allows
    #[must_use]
    pub fn best(&self) -> StrategyCapability {
        StrategyCapability::ALL
            .into_iter()
            .find(|c| self.supports(*c))
            .unwrap_or(StrategyCapability::CornerHeuristic)
    }
}

static REPORT: OnceLock<CapabilityReport> = OnceLock::new();

/// Cached build-capability report, derived from enabled features
pub fn build_report() -> &'static CapabilityReport {
    REPORT.get_or_init(|| {
        let report = CapabilityReport {
            neural_runtime: cfg!(feature = "onnx"),
            vision_toolkit: cfg!(feature = "vision"),
        };
        log::info!(
            "Capabilities: neural runtime {}, vision toolkit {}",
            if report.neural_runtime { "available" } else { "missing" },
            if report.vision_toolkit { "available" } else { "missing" },
        );
        report
    })
}
