use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// High-level error categories surfaced by a chat surface.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceErrorKind {
    #[error("browser launch failed")]
    LaunchFailed,
    #[error("navigation timed out")]
    NavTimeout,
    #[error("cdp i/o failure")]
    CdpIo,
    #[error("target element not found")]
    TargetNotFound,
    #[error("script evaluation failed")]
    ScriptFailed,
    #[error("internal error")]
    Internal,
}

/// Error with optional context passed back to higher layers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SurfaceError {
    pub kind: SurfaceErrorKind,
    pub hint: Option<String>,
}

impl fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, ": {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for SurfaceError {}

impl SurfaceError {
    pub fn new(kind: SurfaceErrorKind) -> Self {
        Self { kind, hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Failures that mean the session never became usable at all.
    pub fn is_open_failure(&self) -> bool {
        matches!(
            self.kind,
            SurfaceErrorKind::LaunchFailed | SurfaceErrorKind::NavTimeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_hint_when_present() {
        let bare = SurfaceError::new(SurfaceErrorKind::NavTimeout);
        assert_eq!(bare.to_string(), "navigation timed out");

        let hinted = SurfaceError::new(SurfaceErrorKind::CdpIo).with_hint("socket closed");
        assert_eq!(hinted.to_string(), "cdp i/o failure: socket closed");
    }

    #[test]
    fn open_failures_are_launch_and_navigation() {
        assert!(SurfaceError::new(SurfaceErrorKind::LaunchFailed).is_open_failure());
        assert!(SurfaceError::new(SurfaceErrorKind::NavTimeout).is_open_failure());
        assert!(!SurfaceError::new(SurfaceErrorKind::TargetNotFound).is_open_failure());
    }
}
