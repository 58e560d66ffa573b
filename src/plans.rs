//! Conversation plan loading. Plans arrive as a YAML or JSON list;
//! the format is picked by file extension, with YAML as the default.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;

use furrow_core_types::ConversationPlan;

/// Reads and checks a plan file. An empty list or a plan with a blank
/// topic or opening question is rejected up front, before any browser
/// is launched.
pub async fn load_plans(path: &Path) -> Result<Vec<ConversationPlan>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read plan file {}", path.display()))?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let plans: Vec<ConversationPlan> = match extension.as_deref() {
        Some("json") => serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse plan file {} as JSON", path.display()))?,
        _ => serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse plan file {} as YAML", path.display()))?,
    };

    if plans.is_empty() {
        bail!("plan file {} contains no conversations", path.display());
    }
    for (index, plan) in plans.iter().enumerate() {
        if plan.topic.trim().is_empty() {
            bail!("plan {index} has an empty topic");
        }
        if plan.opening_question.trim().is_empty() {
            bail!("plan {index} ({:?}) has an empty opening question", plan.topic);
        }
        if let Some(position) = plan.follow_ups.iter().position(|q| q.trim().is_empty()) {
            bail!(
                "plan {index} ({:?}) has an empty follow-up at position {position}",
                plan.topic
            );
        }
    }

    info!(path = %path.display(), count = plans.len(), "conversation plans loaded");
    Ok(plans)
}
