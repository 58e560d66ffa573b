//! Shared data model for the interrogation engine: plans, exchanges,
//! transcripts, run limits, and the per-conversation lifecycle.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        let stamp = Utc::now().format("%Y-%m-%d-%H%M");
        let tail = Uuid::new_v4().simple().to_string();
        Self(format!("{}-{}", stamp, &tail[..8]))
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    /// Id derived from the conversation's start time plus its plan index,
    /// unique within one run.
    pub fn derive(started_at: DateTime<Utc>, index: usize) -> Self {
        Self(format!(
            "conv_{}_{}",
            started_at.format("%Y%m%d_%H%M%S"),
            index
        ))
    }

    pub fn into_failed(self) -> Self {
        Self(format!("{}_FAILED", self.0))
    }

    pub fn is_failed(&self) -> bool {
        self.0.ends_with("_FAILED")
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One planned conversation: an opening question plus optional follow-ups.
/// Produced by an external collaborator; read-only here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationPlan {
    pub topic: String,
    pub opening_question: String,
    #[serde(default)]
    pub follow_ups: Vec<String>,
}

impl ConversationPlan {
    /// Questions this conversation will actually ask: the opener plus at
    /// most `max_exchanges - 1` follow-ups. Extras are dropped, not
    /// deferred.
    pub fn bounded_questions(&self, max_exchanges: usize) -> Vec<String> {
        let follow_up_budget = max_exchanges.saturating_sub(1);
        let mut questions = Vec::with_capacity(1 + follow_up_budget.min(self.follow_ups.len()));
        questions.push(self.opening_question.clone());
        questions.extend(self.follow_ups.iter().take(follow_up_budget).cloned());
        questions
    }
}

/// Failure categories surfaced inside transcripts.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    #[error("session open failed")]
    SessionOpenFailed,
    #[error("element not found")]
    ElementNotFound,
    #[error("dispatch failed")]
    DispatchFailed,
    #[error("response timeout")]
    ResponseTimeout,
    #[error("interrupted")]
    Interrupted,
    #[error("unexpected failure")]
    Unexpected,
}

impl FailureKind {
    pub fn fatal_to_conversation(self) -> bool {
        matches!(self, Self::SessionOpenFailed)
    }
}

/// Structured stand-in for a missing answer.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ErrorMarker {
    pub kind: FailureKind,
    pub detail: String,
}

impl ErrorMarker {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ErrorMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ERROR {}: {}]", self.kind, self.detail)
    }
}

/// Either captured answer text or a failure marker. Untagged so successful
/// exchanges serialize as plain strings in the hand-off record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExchangeReply {
    Answer(String),
    Failed(ErrorMarker),
}

impl ExchangeReply {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn as_answer(&self) -> Option<&str> {
        match self {
            Self::Answer(text) => Some(text),
            Self::Failed(_) => None,
        }
    }
}

/// One question/answer pair, immutable once captured.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub question: String,
    pub response: ExchangeReply,
}

impl Exchange {
    pub fn answered(question: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            response: ExchangeReply::Answer(response.into()),
        }
    }

    pub fn failed(question: impl Into<String>, marker: ErrorMarker) -> Self {
        Self {
            question: question.into(),
            response: ExchangeReply::Failed(marker),
        }
    }
}

/// The frozen record of one conversation, handed back to the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub conversation_id: ConversationId,
    pub topic: String,
    pub exchanges: Vec<Exchange>,
    #[serde(rename = "timestamp")]
    pub completed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl Transcript {
    pub fn completed(
        conversation_id: ConversationId,
        topic: impl Into<String>,
        exchanges: Vec<Exchange>,
    ) -> Self {
        Self {
            conversation_id,
            topic: topic.into(),
            exchanges,
            completed_at: Utc::now(),
            error: None,
        }
    }

    /// Stub emitted when the session never opened: the topic stays visible
    /// in the run's output instead of silently disappearing.
    pub fn failed_stub(
        conversation_id: ConversationId,
        topic: impl Into<String>,
        opening_question: impl Into<String>,
        marker: ErrorMarker,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into_failed(),
            topic: topic.into(),
            exchanges: vec![Exchange::failed(opening_question, marker.clone())],
            completed_at: Utc::now(),
            error: Some(marker.detail),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Run-level caps applied before any session opens.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionLimits {
    pub max_conversations_per_run: usize,
    pub max_exchanges_per_conversation: usize,
}

impl Default for InteractionLimits {
    fn default() -> Self {
        Self {
            max_conversations_per_run: 3,
            max_exchanges_per_conversation: 4,
        }
    }
}

impl InteractionLimits {
    /// The slice of the plan list this run will actually execute.
    pub fn capped_plans<'a>(&self, plans: &'a [ConversationPlan]) -> &'a [ConversationPlan] {
        let cap = self.max_conversations_per_run.min(plans.len());
        &plans[..cap]
    }
}

/// Per-conversation lifecycle, traced as the run progresses.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    Idle,
    SessionOpen,
    Sending,
    AwaitingResponse,
    Captured,
    TimedOut,
    ExchangeErrored,
    SessionClosed,
    Failed,
}

impl ConversationPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::SessionOpen => "session_open",
            Self::Sending => "sending",
            Self::AwaitingResponse => "awaiting_response",
            Self::Captured => "captured",
            Self::TimedOut => "timed_out",
            Self::ExchangeErrored => "exchange_errored",
            Self::SessionClosed => "session_closed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::SessionClosed | Self::Failed)
    }

    pub fn can_advance_to(self, next: ConversationPhase) -> bool {
        use ConversationPhase::*;
        matches!(
            (self, next),
            (Idle, SessionOpen)
                | (Idle, Failed)
                | (SessionOpen, Sending)
                | (SessionOpen, SessionClosed)
                | (Sending, AwaitingResponse)
                | (Sending, ExchangeErrored)
                | (AwaitingResponse, Captured)
                | (AwaitingResponse, TimedOut)
                | (AwaitingResponse, ExchangeErrored)
                | (Captured, Sending)
                | (Captured, SessionClosed)
                | (TimedOut, Sending)
                | (TimedOut, SessionClosed)
                | (ExchangeErrored, Sending)
                | (ExchangeErrored, SessionClosed)
        )
    }
}

impl fmt::Display for ConversationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
