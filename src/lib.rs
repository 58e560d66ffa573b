//! Furrow library
//!
//! Exposes modules for integration testing

pub mod config;
pub mod output;
pub mod plans;
pub mod telemetry;

// Re-export commonly used types for external use
pub use config::{load_config, AppConfig, LoadedConfig};
pub use output::write_transcripts;
pub use plans::load_plans;
pub use telemetry::LogFormat;
