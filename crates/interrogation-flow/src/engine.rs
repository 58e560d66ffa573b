use std::sync::Arc;

use furrow_core_types::{ConversationPlan, RunId, Transcript};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::conversation::run_conversation;
use crate::factory::SessionFactory;
use crate::settings::EngineSettings;

/// Batch coordinator: runs the capped plan list one conversation at a
/// time, each over its own session. Sequential on purpose; the remote
/// app's tolerance for concurrent sessions is unknown, and transcript
/// order must match plan order anyway.
pub struct InterrogationEngine {
    factory: Arc<dyn SessionFactory>,
    settings: EngineSettings,
    cancel: CancellationToken,
}

impl InterrogationEngine {
    pub fn new(factory: Arc<dyn SessionFactory>, settings: EngineSettings) -> Self {
        Self {
            factory,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// One transcript per executed conversation, in plan order. Failures
    /// come back as data inside the transcripts, never as an error from
    /// this method.
    pub async fn run(&self, plans: &[ConversationPlan]) -> Vec<Transcript> {
        let run_id = RunId::new();
        let started = Instant::now();
        let selected = self.settings.limits.capped_plans(plans);
        info!(
            run = %run_id,
            planned = plans.len(),
            selected = selected.len(),
            "interrogation run starting"
        );

        let mut transcripts = Vec::with_capacity(selected.len());
        for (index, plan) in selected.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(
                    run = %run_id,
                    finished = transcripts.len(),
                    "run cancelled, not starting further conversations"
                );
                break;
            }
            let transcript =
                run_conversation(self.factory.as_ref(), &self.settings, &self.cancel, index, plan)
                    .await;
            transcripts.push(transcript);
        }

        let failed = transcripts.iter().filter(|t| t.is_failed()).count();
        let exchanges: usize = transcripts.iter().map(|t| t.exchanges.len()).sum();
        info!(
            run = %run_id,
            transcripts = transcripts.len(),
            failed,
            exchanges,
            elapsed_secs = started.elapsed().as_secs(),
            "interrogation run finished"
        );
        transcripts
    }
}
