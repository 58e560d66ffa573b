use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chat_session::{
    ChatSurface, ChromiumSession, ScriptedSurface, SessionConfig, SurfaceError, SurfaceErrorKind,
};
use tracing::info;

/// Opens one fresh session per conversation. The index is the position in
/// the capped plan list, available for logging and for scripted doubles.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, conversation_index: usize) -> Result<Box<dyn ChatSurface>, SurfaceError>;
}

/// Production factory: every conversation gets its own Chromium launch
/// against the configured assistant URL.
pub struct BrowserSessionFactory {
    config: SessionConfig,
}

impl BrowserSessionFactory {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for BrowserSessionFactory {
    async fn open(&self, conversation_index: usize) -> Result<Box<dyn ChatSurface>, SurfaceError> {
        info!(conversation_index, url = %self.config.url, "opening browser session");
        let session = ChromiumSession::open(&self.config).await?;
        Ok(Box::new(session))
    }
}

enum Planned {
    Session(ScriptedSurface),
    Failure(SurfaceErrorKind),
}

/// Factory over scripted surfaces, one planned outcome per conversation
/// index. Handed-out surfaces share state with the surfaces kept here, so
/// a test can assert on calls after the run.
#[derive(Default)]
pub struct ScriptedFactory {
    planned: Vec<Planned>,
    open_calls: AtomicUsize,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, surface: ScriptedSurface) -> Self {
        self.planned.push(Planned::Session(surface));
        self
    }

    pub fn with_open_failure(mut self, kind: SurfaceErrorKind) -> Self {
        self.planned.push(Planned::Failure(kind));
        self
    }

    /// Shared handle to the surface planned for `index`, if any.
    pub fn surface(&self, index: usize) -> Option<ScriptedSurface> {
        match self.planned.get(index) {
            Some(Planned::Session(surface)) => Some(surface.clone()),
            _ => None,
        }
    }

    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for ScriptedFactory {
    async fn open(&self, conversation_index: usize) -> Result<Box<dyn ChatSurface>, SurfaceError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        match self.planned.get(conversation_index) {
            Some(Planned::Session(surface)) => Ok(Box::new(surface.clone())),
            Some(Planned::Failure(kind)) => {
                Err(SurfaceError::new(*kind).with_hint("scripted open failure"))
            }
            None => Err(SurfaceError::new(SurfaceErrorKind::LaunchFailed)
                .with_hint(format!("no session planned for conversation {conversation_index}"))),
        }
    }
}
