//! The candidate scan: strict list order, first match wins.

use std::time::Duration;

use chat_session::ChatSurface;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::errors::LocateError;
use crate::roles::{LogicalRole, SelectorSet};

/// Tuning for the candidate scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorBudget {
    /// Upper bound per candidate before the scan moves on.
    pub candidate_wait_ms: u64,
    /// Pause between probes of the same candidate.
    pub probe_interval_ms: u64,
}

impl Default for LocatorBudget {
    fn default() -> Self {
        Self {
            candidate_wait_ms: 5_000,
            probe_interval_ms: 100,
        }
    }
}

impl LocatorBudget {
    /// Each candidate probed exactly once, no waiting.
    pub fn single_pass() -> Self {
        Self {
            candidate_wait_ms: 0,
            probe_interval_ms: 0,
        }
    }

    pub fn candidate_wait(&self) -> Duration {
        Duration::from_millis(self.candidate_wait_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }
}

/// The winning candidate for a role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Located {
    pub role: LogicalRole,
    pub selector: String,
}

/// Resolve `role` to the first candidate selector that matches. Candidates
/// are tried in strict list order, each bounded by its slice of the
/// budget; the first that resolves wins regardless of later candidates'
/// validity. No heuristics, no randomness.
pub async fn locate(
    surface: &dyn ChatSurface,
    role: LogicalRole,
    selectors: &SelectorSet,
    budget: &LocatorBudget,
) -> Result<Located, LocateError> {
    scan(surface, role, selectors, budget, false).await
}

/// Same scan, but a candidate only resolves while it accepts input.
pub async fn locate_enabled(
    surface: &dyn ChatSurface,
    role: LogicalRole,
    selectors: &SelectorSet,
    budget: &LocatorBudget,
) -> Result<Located, LocateError> {
    scan(surface, role, selectors, budget, true).await
}

async fn scan(
    surface: &dyn ChatSurface,
    role: LogicalRole,
    selectors: &SelectorSet,
    budget: &LocatorBudget,
    require_enabled: bool,
) -> Result<Located, LocateError> {
    let candidates = selectors.candidates(role);
    if candidates.is_empty() {
        return Err(LocateError::EmptyRole(role));
    }

    for candidate in candidates {
        debug!(role = role.name(), selector = %candidate, "trying candidate");
        if probe_until(surface, role, candidate, budget, require_enabled).await? {
            debug!(role = role.name(), selector = %candidate, "candidate resolved");
            return Ok(Located {
                role,
                selector: candidate.clone(),
            });
        }
    }

    warn!(role = role.name(), "all candidates exhausted");
    Err(LocateError::ElementNotFound {
        role,
        tried: candidates.to_vec(),
    })
}

/// Probe one candidate until it resolves or its wait runs out.
async fn probe_until(
    surface: &dyn ChatSurface,
    role: LogicalRole,
    selector: &str,
    budget: &LocatorBudget,
    require_enabled: bool,
) -> Result<bool, LocateError> {
    let deadline = Instant::now() + budget.candidate_wait();
    loop {
        let probe = surface
            .probe(selector)
            .await
            .map_err(|source| LocateError::Surface { role, source })?;
        let hit = if require_enabled {
            probe.interactive()
        } else {
            probe.found
        };
        if hit {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        sleep(budget.probe_interval()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_session::{ScriptedSurface, SurfaceErrorKind};

    fn set_with(chat_input: &[&str], send_control: &[&str]) -> SelectorSet {
        SelectorSet {
            revision: "test".into(),
            chat_input: chat_input.iter().map(|s| s.to_string()).collect(),
            send_control: send_control.iter().map(|s| s.to_string()).collect(),
            content_root: vec!["main".into()],
        }
    }

    #[tokio::test]
    async fn first_resolving_candidate_wins_in_list_order() {
        let surface = ScriptedSurface::new()
            .with_element("textarea[a]")
            .with_element("textarea[b]");
        let set = set_with(&["textarea[a]", "textarea[b]"], &["button"]);

        let located = locate(
            &surface,
            LogicalRole::ChatInput,
            &set,
            &LocatorBudget::single_pass(),
        )
        .await
        .unwrap();

        assert_eq!(located.selector, "textarea[a]");
        // The scan stops at the first hit; the runner-up is never probed.
        assert_eq!(surface.probes("textarea[b]"), 0);
    }

    #[tokio::test]
    async fn scan_falls_through_to_later_candidates() {
        let surface = ScriptedSurface::new().with_element("input[type='text']");
        let set = set_with(&["textarea[missing]", "input[type='text']"], &["button"]);

        let located = locate(
            &surface,
            LogicalRole::ChatInput,
            &set,
            &LocatorBudget::single_pass(),
        )
        .await
        .unwrap();

        assert_eq!(located.selector, "input[type='text']");
    }

    #[tokio::test]
    async fn exhausted_candidates_report_element_not_found() {
        let surface = ScriptedSurface::new();
        let set = set_with(&["a", "b"], &["button"]);

        let err = locate(
            &surface,
            LogicalRole::ChatInput,
            &set,
            &LocatorBudget::single_pass(),
        )
        .await
        .unwrap_err();

        match err {
            LocateError::ElementNotFound { role, tried } => {
                assert_eq!(role, LogicalRole::ChatInput);
                assert_eq!(tried, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected ElementNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn enabled_scan_skips_disabled_candidates() {
        let surface = ScriptedSurface::new()
            .with_disabled_element("button[type='submit']")
            .with_element("button[aria-label='Send']");
        let set = set_with(
            &["textarea"],
            &["button[type='submit']", "button[aria-label='Send']"],
        );

        let enabled = locate_enabled(
            &surface,
            LogicalRole::SendControl,
            &set,
            &LocatorBudget::single_pass(),
        )
        .await
        .unwrap();
        assert_eq!(enabled.selector, "button[aria-label='Send']");

        // The plain scan is satisfied by mere presence.
        let present = locate(
            &surface,
            LogicalRole::SendControl,
            &set,
            &LocatorBudget::single_pass(),
        )
        .await
        .unwrap();
        assert_eq!(present.selector, "button[type='submit']");
    }

    #[tokio::test(start_paused = true)]
    async fn late_element_resolves_within_the_candidate_wait() {
        let surface = ScriptedSurface::new().with_late_element("textarea", 3);
        let set = set_with(&["textarea"], &["button"]);
        let budget = LocatorBudget {
            candidate_wait_ms: 1_000,
            probe_interval_ms: 100,
        };

        let located = locate(&surface, LogicalRole::ChatInput, &set, &budget)
            .await
            .unwrap();
        assert_eq!(located.selector, "textarea");
        assert_eq!(surface.probes("textarea"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn candidate_wait_bounds_the_scan() {
        let surface = ScriptedSurface::new().with_late_element("textarea", 50);
        let set = set_with(&["textarea"], &["button"]);
        let budget = LocatorBudget {
            candidate_wait_ms: 300,
            probe_interval_ms: 100,
        };

        let err = locate(&surface, LogicalRole::ChatInput, &set, &budget)
            .await
            .unwrap_err();
        assert!(matches!(err, LocateError::ElementNotFound { .. }));
    }

    #[tokio::test]
    async fn surface_failures_abort_the_scan() {
        let surface = ScriptedSurface::new()
            .with_element("a")
            .with_probe_error(SurfaceErrorKind::CdpIo);
        let set = set_with(&["a", "b"], &["button"]);

        let err = locate(
            &surface,
            LogicalRole::ChatInput,
            &set,
            &LocatorBudget::single_pass(),
        )
        .await
        .unwrap_err();

        match err {
            LocateError::Surface { role, source } => {
                assert_eq!(role, LogicalRole::ChatInput);
                assert_eq!(source.kind, SurfaceErrorKind::CdpIo);
            }
            other => panic!("expected Surface, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_role_fails_before_any_probe() {
        let surface = ScriptedSurface::new();
        let set = SelectorSet {
            chat_input: vec![],
            ..set_with(&["a"], &["button"])
        };

        let err = locate(
            &surface,
            LogicalRole::ChatInput,
            &set,
            &LocatorBudget::single_pass(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LocateError::EmptyRole(LogicalRole::ChatInput)));
    }
}
