use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{SurfaceError, SurfaceErrorKind};
use crate::surface::{ChatSurface, ElementProbe};

/// Recorded interaction, for assertions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SurfaceCall {
    Fill { selector: String, text: String },
    Click { selector: String },
    Confirm { selector: String },
    Close,
}

#[derive(Clone, Debug)]
struct ScriptedElement {
    probe: ElementProbe,
    visible_after: usize,
    probes_seen: usize,
}

#[derive(Default)]
struct ScriptedState {
    elements: HashMap<String, ScriptedElement>,
    snapshots: HashMap<String, Vec<String>>,
    cursors: HashMap<String, usize>,
    calls: Vec<SurfaceCall>,
    probe_error: Option<SurfaceErrorKind>,
    fill_error: Option<SurfaceErrorKind>,
    click_error: Option<SurfaceErrorKind>,
    confirm_error: Option<SurfaceErrorKind>,
    read_error: Option<SurfaceErrorKind>,
    closed: bool,
}

/// In-memory `ChatSurface` driven by scripted element states and snapshot
/// sequences. Clones share state, so a test can keep one handle for
/// assertions while the engine consumes another. Suitable for unit tests
/// and engine runs without a browser.
#[derive(Clone, Default)]
pub struct ScriptedSurface {
    inner: Arc<Mutex<ScriptedState>>,
}

impl ScriptedSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ScriptedState> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Selector resolves immediately, enabled.
    pub fn with_element(self, selector: impl Into<String>) -> Self {
        self.insert_element(
            selector.into(),
            ElementProbe {
                found: true,
                enabled: true,
            },
            0,
        );
        self
    }

    /// Selector resolves immediately but never accepts input.
    pub fn with_disabled_element(self, selector: impl Into<String>) -> Self {
        self.insert_element(
            selector.into(),
            ElementProbe {
                found: true,
                enabled: false,
            },
            0,
        );
        self
    }

    /// Selector stays missing for `after` probes, then resolves enabled.
    pub fn with_late_element(self, selector: impl Into<String>, after: usize) -> Self {
        self.insert_element(
            selector.into(),
            ElementProbe {
                found: true,
                enabled: true,
            },
            after,
        );
        self
    }

    /// Successive `read_text` results for the selector; the last entry
    /// repeats once the script runs out.
    pub fn with_snapshots<I, S>(self, selector: impl Into<String>, snapshots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let collected: Vec<String> = snapshots.into_iter().map(Into::into).collect();
        self.state().snapshots.insert(selector.into(), collected);
        self
    }

    pub fn with_probe_error(self, kind: SurfaceErrorKind) -> Self {
        self.state().probe_error = Some(kind);
        self
    }

    pub fn with_fill_error(self, kind: SurfaceErrorKind) -> Self {
        self.state().fill_error = Some(kind);
        self
    }

    pub fn with_click_error(self, kind: SurfaceErrorKind) -> Self {
        self.state().click_error = Some(kind);
        self
    }

    pub fn with_confirm_error(self, kind: SurfaceErrorKind) -> Self {
        self.state().confirm_error = Some(kind);
        self
    }

    pub fn with_read_error(self, kind: SurfaceErrorKind) -> Self {
        self.state().read_error = Some(kind);
        self
    }

    fn insert_element(&self, selector: String, probe: ElementProbe, visible_after: usize) {
        self.state().elements.insert(
            selector,
            ScriptedElement {
                probe,
                visible_after,
                probes_seen: 0,
            },
        );
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.state().calls.clone()
    }

    /// How many times `read_text` ran against the selector.
    pub fn reads(&self, selector: &str) -> usize {
        self.state().cursors.get(selector).copied().unwrap_or(0)
    }

    /// How many times `probe` ran against the selector.
    pub fn probes(&self, selector: &str) -> usize {
        self.state()
            .elements
            .get(selector)
            .map(|element| element.probes_seen)
            .unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}

#[async_trait]
impl ChatSurface for ScriptedSurface {
    async fn probe(&self, selector: &str) -> Result<ElementProbe, SurfaceError> {
        let mut state = self.state();
        if let Some(kind) = state.probe_error {
            return Err(SurfaceError::new(kind).with_hint("scripted probe failure"));
        }
        match state.elements.get_mut(selector) {
            Some(element) => {
                element.probes_seen += 1;
                if element.probes_seen > element.visible_after {
                    Ok(element.probe)
                } else {
                    Ok(ElementProbe::missing())
                }
            }
            None => Ok(ElementProbe::missing()),
        }
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<(), SurfaceError> {
        let mut state = self.state();
        if let Some(kind) = state.fill_error {
            return Err(SurfaceError::new(kind).with_hint("scripted fill failure"));
        }
        state.calls.push(SurfaceCall::Fill {
            selector: selector.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), SurfaceError> {
        let mut state = self.state();
        if let Some(kind) = state.click_error {
            return Err(SurfaceError::new(kind).with_hint("scripted click failure"));
        }
        state.calls.push(SurfaceCall::Click {
            selector: selector.to_string(),
        });
        Ok(())
    }

    async fn confirm(&self, selector: &str) -> Result<(), SurfaceError> {
        let mut state = self.state();
        if let Some(kind) = state.confirm_error {
            return Err(SurfaceError::new(kind).with_hint("scripted confirm failure"));
        }
        state.calls.push(SurfaceCall::Confirm {
            selector: selector.to_string(),
        });
        Ok(())
    }

    async fn read_text(&self, selector: &str) -> Result<Option<String>, SurfaceError> {
        let mut state = self.state();
        if let Some(kind) = state.read_error {
            return Err(SurfaceError::new(kind).with_hint("scripted read failure"));
        }
        if let Some(sequence) = state.snapshots.get(selector).cloned() {
            if sequence.is_empty() {
                return Ok(None);
            }
            let cursor = state.cursors.entry(selector.to_string()).or_insert(0);
            let index = (*cursor).min(sequence.len() - 1);
            *cursor += 1;
            return Ok(Some(sequence[index].clone()));
        }
        if state.elements.contains_key(selector) {
            return Ok(Some(String::new()));
        }
        Ok(None)
    }

    async fn close(&mut self) -> Result<(), SurfaceError> {
        let mut state = self.state();
        state.closed = true;
        state.calls.push(SurfaceCall::Close);
        Ok(())
    }
}
