//! Browser session layer: the `ChatSurface` seam upper layers speak to,
//! the Chromium-backed production session, and a scripted in-memory double
//! for tests.

pub mod config;
pub mod error;
pub mod scripted;
pub mod surface;

mod chromium;

pub use chromium::ChromiumSession;
pub use config::SessionConfig;
pub use error::{SurfaceError, SurfaceErrorKind};
pub use scripted::{ScriptedSurface, SurfaceCall};
pub use surface::{ChatSurface, ElementProbe};
