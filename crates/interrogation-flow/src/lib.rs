//! Conversation sequencing. A run takes a capped list of conversation
//! plans, opens one browser session per conversation, drives the bounded
//! exchanges in order and freezes each outcome into a transcript.
//! Failures stay local: a bad exchange marks itself with an error marker,
//! a session that never opens marks its conversation as a failed stub,
//! and the batch keeps going either way.

mod conversation;
mod engine;
mod exchange;
mod factory;
mod settings;

pub use conversation::{run_conversation, PhaseTracker};
pub use engine::InterrogationEngine;
pub use exchange::run_exchange;
pub use factory::{BrowserSessionFactory, ScriptedFactory, SessionFactory};
pub use settings::{EngineSettings, FlowPacing};
