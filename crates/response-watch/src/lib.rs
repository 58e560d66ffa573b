//! Response-completion detection. The target app streams answers into the
//! page with no done event, so the only usable signal is rendered text
//! that has stopped changing: poll the content root, track a run of
//! consecutive identical reads, and treat a long enough run as completion.

mod extract;

use std::time::Duration;

use chat_session::{ChatSurface, SurfaceError};
use probe_locator::{LogicalRole, SelectorSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, trace, warn};

pub use extract::{answer_boundary, split_answer, ExtractionPolicy};

/// Parameters of the completion-detection algorithm.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilityWindow {
    pub poll_interval_ms: u64,
    pub required_stable_reads: usize,
    pub max_polls: usize,
}

impl Default for StabilityWindow {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            required_stable_reads: 3,
            max_polls: 60,
        }
    }
}

impl StabilityWindow {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Derive the poll cap from a per-response timeout, keeping the
    /// configured interval: a tighter interval buys more polls within
    /// the same wall-clock budget. The cap never drops below
    /// `required_stable_reads`, which is the minimum run that can ever
    /// declare stability.
    pub fn with_response_timeout(mut self, secs: u64) -> Self {
        self.max_polls = (secs.saturating_mul(1_000) / self.poll_interval_ms.max(1))
            .max(self.required_stable_reads as u64) as usize;
        self
    }
}

#[derive(Debug, Error, Clone)]
pub enum WatchError {
    /// Stability never arrived within the poll budget. Partial text does
    /// not escape through this path.
    #[error("response timeout after {polls} polls")]
    ResponseTimeout { polls: usize },

    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// A stable capture: the text plus the zero-based poll index at which the
/// required run of identical reads completed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StableRead {
    pub text: String,
    pub polls: usize,
}

/// Captured and extracted response for one exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedResponse {
    pub answer: String,
    /// Whole-text fallback: no question boundary was found.
    pub degraded: bool,
    pub polls: usize,
}

/// Poll the content root until its text stops changing. A run of
/// `required_stable_reads` identical reads declares completion and the
/// last read is returned. Reaching `max_polls` first fails with
/// `ResponseTimeout` instead of returning a possibly mid-stream read.
pub async fn await_stable(
    surface: &dyn ChatSurface,
    selectors: &SelectorSet,
    window: &StabilityWindow,
) -> Result<StableRead, WatchError> {
    let mut last: Option<String> = None;
    let mut streak = 0usize;

    for poll in 0..window.max_polls {
        match read_content(surface, selectors).await? {
            Some(text) => {
                if last.as_deref() == Some(text.as_str()) {
                    streak += 1;
                } else {
                    last = Some(text);
                    streak = 1;
                }
                if streak >= window.required_stable_reads {
                    debug!(poll, streak, "content stable");
                    return Ok(StableRead {
                        text: last.take().unwrap_or_default(),
                        polls: poll,
                    });
                }
            }
            None => {
                trace!(poll, "content root unresolved");
                last = None;
                streak = 0;
            }
        }
        if poll + 1 < window.max_polls {
            sleep(window.poll_interval()).await;
        }
    }

    warn!(
        max_polls = window.max_polls,
        "no stable read within the poll budget"
    );
    Err(WatchError::ResponseTimeout {
        polls: window.max_polls,
    })
}

/// Stability watch plus answer extraction in one step.
pub async fn capture_response(
    surface: &dyn ChatSurface,
    selectors: &SelectorSet,
    window: &StabilityWindow,
    policy: &ExtractionPolicy,
) -> Result<CapturedResponse, WatchError> {
    let stable = await_stable(surface, selectors, window).await?;
    let (answer, degraded) = split_answer(&stable.text, policy);
    if degraded {
        warn!("no question boundary found, keeping the whole capture");
    }
    Ok(CapturedResponse {
        answer,
        degraded,
        polls: stable.polls,
    })
}

/// First content candidate that yields text this tick. A late-mounting
/// container degrades to the next candidate instead of stalling the watch.
async fn read_content(
    surface: &dyn ChatSurface,
    selectors: &SelectorSet,
) -> Result<Option<String>, WatchError> {
    for candidate in selectors.candidates(LogicalRole::ContentRoot) {
        if let Some(text) = surface.read_text(candidate).await? {
            return Ok(Some(text));
        }
    }
    Ok(None)
}
