use std::time::Duration;

use furrow_core_types::InteractionLimits;
use probe_actions::DispatchPacing;
use probe_locator::{LocatorBudget, SelectorSet};
use response_watch::{ExtractionPolicy, StabilityWindow};
use serde::{Deserialize, Serialize};

/// Delays between the engine's own steps, distinct from the poll and
/// settle timing inside dispatch and watch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowPacing {
    /// Wait after a successful dispatch before the first content poll;
    /// the assistant needs a moment to start rendering at all.
    pub response_grace_secs: u64,
    /// Wait after every exchange, success or not. The remote app paces
    /// its own turn-taking and gets no say in ours otherwise.
    pub exchange_pause_secs: u64,
}

impl Default for FlowPacing {
    fn default() -> Self {
        Self {
            response_grace_secs: 2,
            exchange_pause_secs: 2,
        }
    }
}

impl FlowPacing {
    pub fn immediate() -> Self {
        Self {
            response_grace_secs: 0,
            exchange_pause_secs: 0,
        }
    }

    pub fn response_grace(&self) -> Duration {
        Duration::from_secs(self.response_grace_secs)
    }

    pub fn exchange_pause(&self) -> Duration {
        Duration::from_secs(self.exchange_pause_secs)
    }
}

/// Everything the engine needs besides the plans themselves. Assembled
/// once from configuration and shared by every conversation in the run.
#[derive(Clone, Debug, Default)]
pub struct EngineSettings {
    pub selectors: SelectorSet,
    pub locator: LocatorBudget,
    pub dispatch: DispatchPacing,
    pub stability: StabilityWindow,
    pub extraction: ExtractionPolicy,
    pub pacing: FlowPacing,
    pub limits: InteractionLimits,
}
