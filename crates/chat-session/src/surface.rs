use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SurfaceError;

/// Presence and interactability of a selector's first match.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ElementProbe {
    pub found: bool,
    pub enabled: bool,
}

impl ElementProbe {
    pub fn missing() -> Self {
        Self {
            found: false,
            enabled: false,
        }
    }

    pub fn interactive(&self) -> bool {
        self.found && self.enabled
    }
}

/// Trait capturing the minimal page capability surface required by upper
/// layers. Everything above the session speaks to this, never to the
/// browser library directly.
#[async_trait]
pub trait ChatSurface: Send + Sync {
    /// Whether the selector's first match exists and accepts input.
    async fn probe(&self, selector: &str) -> Result<ElementProbe, SurfaceError>;

    /// Replace the element's value with `text`, firing the input events the
    /// page's own scripts listen for.
    async fn fill(&self, selector: &str, text: &str) -> Result<(), SurfaceError>;

    async fn click(&self, selector: &str) -> Result<(), SurfaceError>;

    /// The element's native confirm action (Enter keystroke).
    async fn confirm(&self, selector: &str) -> Result<(), SurfaceError>;

    /// Rendered text of the first match; `None` when the selector misses.
    async fn read_text(&self, selector: &str) -> Result<Option<String>, SurfaceError>;

    /// Releases the underlying browser resources. Calling it is optional on
    /// paths that drop the session instead.
    async fn close(&mut self) -> Result<(), SurfaceError>;
}
