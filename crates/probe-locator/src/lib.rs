//! Ordered-fallback element location: logical roles resolved to concrete
//! selectors, in strict candidate order, against an unowned page whose
//! markup vocabulary may shift between deployments.

mod errors;
mod locate;
mod roles;

pub use errors::LocateError;
pub use locate::{locate, locate_enabled, Located, LocatorBudget};
pub use roles::{LogicalRole, SelectorSet};
