//! Error types for the locator.

use chat_session::SurfaceError;
use thiserror::Error;

use crate::roles::LogicalRole;

#[derive(Debug, Error, Clone)]
pub enum LocateError {
    /// No candidate resolved within the role budget.
    #[error("element not found for {role}: tried {tried:?}")]
    ElementNotFound {
        role: LogicalRole,
        tried: Vec<String>,
    },

    /// The role has no candidates configured at all.
    #[error("no candidates configured for {0}")]
    EmptyRole(LogicalRole),

    /// The surface itself failed while probing; further candidates would
    /// fail the same way.
    #[error("surface failure while locating {role}: {source}")]
    Surface {
        role: LogicalRole,
        source: SurfaceError,
    },
}
