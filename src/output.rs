//! Transcript output. One run produces one JSON document, either on
//! stdout or in the file named by `--output`.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use furrow_core_types::Transcript;

/// Serializes the transcripts as pretty JSON. With no destination the
/// document goes to stdout, so logs must stay on stderr.
pub async fn write_transcripts(transcripts: &[Transcript], destination: Option<&Path>) -> Result<()> {
    let rendered =
        serde_json::to_string_pretty(transcripts).context("failed to serialize transcripts")?;

    match destination {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await.with_context(|| {
                        format!("failed to create output directory {}", parent.display())
                    })?;
                }
            }
            tokio::fs::write(path, rendered.as_bytes())
                .await
                .with_context(|| format!("failed to write transcripts to {}", path.display()))?;
            info!(path = %path.display(), count = transcripts.len(), "transcripts written");
        }
        None => println!("{rendered}"),
    }

    Ok(())
}
