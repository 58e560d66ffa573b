use chrono::Utc;
use furrow_core_types::{
    ConversationId, ConversationPhase, ConversationPlan, ErrorMarker, FailureKind, Transcript,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::exchange::run_exchange;
use crate::factory::SessionFactory;
use crate::settings::EngineSettings;

/// Traced per-conversation lifecycle. Transitions outside the expected
/// state machine are logged loudly but not blocked; the tracker observes,
/// it does not enforce.
pub struct PhaseTracker {
    conversation: ConversationId,
    phase: ConversationPhase,
}

impl PhaseTracker {
    pub fn new(conversation: ConversationId) -> Self {
        Self {
            conversation,
            phase: ConversationPhase::Idle,
        }
    }

    pub fn advance(&mut self, next: ConversationPhase) {
        if self.phase.can_advance_to(next) {
            debug!(conversation = %self.conversation, from = %self.phase, to = %next, "phase advanced");
        } else {
            warn!(
                conversation = %self.conversation,
                from = %self.phase,
                to = %next,
                "phase advanced outside the expected lifecycle"
            );
        }
        self.phase = next;
    }

    pub fn current(&self) -> ConversationPhase {
        self.phase
    }
}

/// Runs one planned conversation over a single session. The session is
/// opened once, shared by every exchange (the assistant keeps the
/// conversational context on its side) and released on every path out.
/// When the session cannot be opened at all, the returned transcript is a
/// failed stub so the topic still shows up in the run's output.
pub async fn run_conversation(
    factory: &dyn SessionFactory,
    settings: &EngineSettings,
    cancel: &CancellationToken,
    index: usize,
    plan: &ConversationPlan,
) -> Transcript {
    let conversation_id = ConversationId::derive(Utc::now(), index);
    let mut phases = PhaseTracker::new(conversation_id.clone());
    info!(conversation = %conversation_id, topic = %plan.topic, "conversation starting");

    let mut surface = match factory.open(index).await {
        Ok(surface) => {
            phases.advance(ConversationPhase::SessionOpen);
            surface
        }
        Err(err) => {
            phases.advance(ConversationPhase::Failed);
            error!(
                conversation = %conversation_id,
                error = %err,
                "session open failed, abandoning the conversation"
            );
            let marker = ErrorMarker::new(FailureKind::SessionOpenFailed, err.to_string());
            return Transcript::failed_stub(
                conversation_id,
                &plan.topic,
                &plan.opening_question,
                marker,
            );
        }
    };

    let questions = plan.bounded_questions(settings.limits.max_exchanges_per_conversation);
    let mut exchanges = Vec::with_capacity(questions.len());
    for question in &questions {
        if cancel.is_cancelled() {
            info!(
                conversation = %conversation_id,
                asked = exchanges.len(),
                "cancelled, skipping the remaining questions"
            );
            break;
        }
        exchanges.push(run_exchange(surface.as_ref(), settings, cancel, &mut phases, question).await);
    }

    phases.advance(ConversationPhase::SessionClosed);
    if let Err(err) = surface.close().await {
        warn!(conversation = %conversation_id, error = %err, "session close failed");
    }
    info!(
        conversation = %conversation_id,
        exchanges = exchanges.len(),
        "conversation finished"
    );
    Transcript::completed(conversation_id, &plan.topic, exchanges)
}
