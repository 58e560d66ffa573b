//! Application configuration: one YAML file covering the assistant
//! endpoint, run limits, browser session options and every tuning knob
//! the engine exposes. A missing file means defaults; a partial file
//! overrides per field.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use chat_session::SessionConfig;
use furrow_core_types::InteractionLimits;
use interrogation_flow::{EngineSettings, FlowPacing};
use probe_actions::DispatchPacing;
use probe_locator::{LocatorBudget, SelectorSet};
use response_watch::{ExtractionPolicy, StabilityWindow};

/// Config file consulted when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "furrow.yaml";

/// Root configuration tree. Every section falls back to its defaults,
/// so any subset of the file is a valid file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub assistant: AssistantConfig,
    pub limits: InteractionLimits,
    pub session: SessionOptions,
    pub stability: StabilityOptions,
    pub pacing: PacingOptions,
    pub locator: LocatorOptions,
    pub extraction: ExtractionPolicy,
    pub selectors: SelectorSet,
}

/// Where the assistant lives and how long one answer may take.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub url: String,
    pub response_timeout_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            url: "https://assistant.demeterdata.ag".to_string(),
            response_timeout_secs: 120,
        }
    }
}

/// Browser-facing options, mirrored into [`SessionConfig`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    pub headless: bool,
    pub navigation_timeout_secs: u64,
    pub page_settle_secs: u64,
    pub chrome_executable: Option<PathBuf>,
    pub user_data_dir: Option<PathBuf>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            headless: true,
            navigation_timeout_secs: 30,
            page_settle_secs: 3,
            chrome_executable: None,
            user_data_dir: None,
        }
    }
}

/// Rendered-text stability detection knobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityOptions {
    pub poll_interval_secs: u64,
    pub required_stable_reads: usize,
}

impl Default for StabilityOptions {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
            required_stable_reads: 3,
        }
    }
}

/// Delays between interaction steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingOptions {
    pub input_settle_ms: u64,
    pub response_grace_secs: u64,
    pub exchange_pause_secs: u64,
}

impl Default for PacingOptions {
    fn default() -> Self {
        Self {
            input_settle_ms: 500,
            response_grace_secs: 2,
            exchange_pause_secs: 2,
        }
    }
}

/// Element lookup budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorOptions {
    pub candidate_wait_ms: u64,
}

impl Default for LocatorOptions {
    fn default() -> Self {
        Self {
            candidate_wait_ms: 5_000,
        }
    }
}

impl AppConfig {
    /// Applies `FURROW_ASSISTANT_URL` and `FURROW_HEADLESS` on top of
    /// whatever the file said. CLI flags are applied after this, so the
    /// precedence is flags over environment over file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = env::var("FURROW_ASSISTANT_URL") {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                info!(url = %trimmed, "assistant url taken from FURROW_ASSISTANT_URL");
                self.assistant.url = trimmed.to_string();
            }
        }
        if let Ok(value) = env::var("FURROW_HEADLESS") {
            self.session.headless = !matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            );
        }
    }

    /// Semantic checks beyond what serde enforces.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.assistant.url)
            .with_context(|| format!("invalid assistant url {:?}", self.assistant.url))?;
        if self.assistant.response_timeout_secs == 0 {
            bail!("assistant.response_timeout_secs must be at least 1");
        }
        if self.limits.max_conversations_per_run == 0 {
            bail!("limits.max_conversations_per_run must be at least 1");
        }
        if self.limits.max_exchanges_per_conversation == 0 {
            bail!("limits.max_exchanges_per_conversation must be at least 1");
        }
        if self.stability.poll_interval_secs == 0 {
            bail!("stability.poll_interval_secs must be at least 1");
        }
        if self.stability.required_stable_reads == 0 {
            bail!("stability.required_stable_reads must be at least 1");
        }
        self.selectors
            .validate()
            .context("selectors section is unusable")?;
        Ok(())
    }

    /// The poll cap comes from the response timeout and the configured
    /// interval, never from a fixed count.
    pub fn stability_window(&self) -> StabilityWindow {
        StabilityWindow {
            poll_interval_ms: self.stability.poll_interval_secs.saturating_mul(1_000),
            required_stable_reads: self.stability.required_stable_reads,
            ..StabilityWindow::default()
        }
        .with_response_timeout(self.assistant.response_timeout_secs)
    }

    /// Everything the engine needs, in its own terms.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            selectors: self.selectors.clone(),
            locator: LocatorBudget {
                candidate_wait_ms: self.locator.candidate_wait_ms,
                ..LocatorBudget::default()
            },
            dispatch: DispatchPacing {
                input_settle_ms: self.pacing.input_settle_ms,
            },
            stability: self.stability_window(),
            extraction: self.extraction,
            pacing: FlowPacing {
                response_grace_secs: self.pacing.response_grace_secs,
                exchange_pause_secs: self.pacing.exchange_pause_secs,
            },
            limits: self.limits,
        }
    }

    /// Browser session options for the factory.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            url: self.assistant.url.clone(),
            headless: self.session.headless,
            navigation_timeout_ms: self.session.navigation_timeout_secs.saturating_mul(1_000),
            page_settle_ms: self.session.page_settle_secs.saturating_mul(1_000),
            chrome_executable: self.session.chrome_executable.clone(),
            user_data_dir: self.session.user_data_dir.clone(),
        }
    }
}

/// A parsed configuration plus where it came from, for log and error
/// messages.
#[derive(Clone, Debug)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub path: PathBuf,
}

/// Loads the configuration file, falling back to defaults when the
/// file does not exist. A file that exists but fails to parse is an
/// error, not a silent fallback.
pub async fn load_config(cli_path: Option<&Path>) -> Result<LoadedConfig> {
    let path = cli_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => {
            let config: AppConfig = serde_yaml::from_str(&raw)
                .with_context(|| format!("failed to parse config file {}", path.display()))?;
            info!(path = %path.display(), "configuration loaded");
            config
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "config file not found, using defaults");
            AppConfig::default()
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file {}", path.display()));
        }
    };

    Ok(LoadedConfig { config, path })
}
