//! Message dispatch: one user-visible send action against the resolved
//! chat elements. Mutates page state; never retries.

use std::time::Duration;

use chat_session::{ChatSurface, SurfaceError};
use probe_locator::{locate, locate_enabled, LocateError, LocatorBudget, LogicalRole, SelectorSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Pacing for one dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchPacing {
    /// Wait after the fill; the UI may enable the send control
    /// asynchronously once the input changes.
    pub input_settle_ms: u64,
}

impl Default for DispatchPacing {
    fn default() -> Self {
        Self {
            input_settle_ms: 500,
        }
    }
}

impl DispatchPacing {
    pub fn immediate() -> Self {
        Self { input_settle_ms: 0 }
    }

    pub fn input_settle(&self) -> Duration {
        Duration::from_millis(self.input_settle_ms)
    }
}

#[derive(Debug, Error, Clone)]
pub enum DispatchError {
    /// The locator gave up on a role.
    #[error(transparent)]
    Locate(#[from] LocateError),

    /// The page interaction itself failed.
    #[error("send interaction failed: {0}")]
    Interaction(#[from] SurfaceError),
}

/// Sends one question: locate the chat input, write the text, wait for the
/// UI to accept it, then activate an enabled send control. When no send
/// control resolves, fall back to the input's native confirm action,
/// the same Enter keystroke a person would use in that box.
pub async fn dispatch(
    surface: &dyn ChatSurface,
    selectors: &SelectorSet,
    budget: &LocatorBudget,
    pacing: &DispatchPacing,
    question: &str,
) -> Result<(), DispatchError> {
    let input = locate(surface, LogicalRole::ChatInput, selectors, budget).await?;
    surface.fill(&input.selector, question).await?;
    sleep(pacing.input_settle()).await;

    match locate_enabled(surface, LogicalRole::SendControl, selectors, budget).await {
        Ok(control) => {
            debug!(selector = %control.selector, "activating send control");
            surface.click(&control.selector).await?;
        }
        Err(LocateError::Surface { source, .. }) => {
            return Err(DispatchError::Interaction(source));
        }
        Err(err) => {
            warn!(error = %err, "no enabled send control, falling back to enter");
            surface.confirm(&input.selector).await?;
        }
    }

    Ok(())
}
