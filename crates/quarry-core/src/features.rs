//! Feature-enablement collaborator.
//!
//! Some façade behavior is gated on per-installation feature decisions
//! that live outside this core (hosting platform rollout state). The
//! façade only ever asks a yes/no question.

use async_trait::async_trait;

/// Features the façade consults before assembling arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Feature {
    /// Include engine diagnostics in interpreted SARIF output. Also
    /// activates the invalid-notifications workaround, since diagnostics
    /// are where the engine's writer defect shows up.
    ExportDiagnostics,
    /// Ask `database interpret-results` for the reworked analysis
    /// summary. Off, a new-enough engine is told to keep the old format.
    NewAnalysisSummary,
}

#[async_trait]
pub trait FeatureEnablement: Send + Sync {
    /// Whether `feature` is enabled for the bound engine installation.
    async fn is_enabled(&self, feature: Feature) -> bool;
}

/// A fixed feature set, decided up front. The default is everything off.
#[derive(Debug, Clone, Default)]
pub struct StaticFeatures {
    enabled: Vec<Feature>,
}

impl StaticFeatures {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(features: &[Feature]) -> Self {
        Self {
            enabled: features.to_vec(),
        }
    }
}

#[async_trait]
impl FeatureEnablement for StaticFeatures {
    async fn is_enabled(&self, feature: Feature) -> bool {
        self.enabled.contains(&feature)
    }
}
