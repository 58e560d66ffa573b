use chat_session::ChatSurface;
use furrow_core_types::{ConversationPhase, ErrorMarker, Exchange, ExchangeReply, FailureKind};
use probe_actions::{dispatch, DispatchError};
use probe_locator::LocateError;
use response_watch::{capture_response, CapturedResponse, WatchError};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::conversation::PhaseTracker;
use crate::settings::EngineSettings;

/// Runs one question through dispatch and response capture. Every failure
/// along the way ends up inside the returned `Exchange` as an error
/// marker; nothing propagates to the conversation loop. The configured
/// pause follows the exchange whatever its outcome, skipped only when the
/// run is being torn down.
pub async fn run_exchange(
    surface: &dyn ChatSurface,
    settings: &EngineSettings,
    cancel: &CancellationToken,
    phases: &mut PhaseTracker,
    question: &str,
) -> Exchange {
    phases.advance(ConversationPhase::Sending);
    let response = exchange_reply(surface, settings, cancel, phases, question).await;
    if !cancel.is_cancelled() {
        sleep(settings.pacing.exchange_pause()).await;
    }
    Exchange {
        question: question.to_owned(),
        response,
    }
}

async fn exchange_reply(
    surface: &dyn ChatSurface,
    settings: &EngineSettings,
    cancel: &CancellationToken,
    phases: &mut PhaseTracker,
    question: &str,
) -> ExchangeReply {
    let dispatched = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = dispatch(
            surface,
            &settings.selectors,
            &settings.locator,
            &settings.dispatch,
            question,
        ) => Some(result),
    };
    match dispatched {
        None => {
            phases.advance(ConversationPhase::ExchangeErrored);
            warn!("dispatch interrupted by cancellation");
            return ExchangeReply::Failed(ErrorMarker::new(
                FailureKind::Interrupted,
                "run cancelled during dispatch",
            ));
        }
        Some(Err(err)) => {
            let kind = dispatch_failure_kind(&err);
            phases.advance(ConversationPhase::ExchangeErrored);
            warn!(%kind, error = %err, "dispatch failed");
            return ExchangeReply::Failed(ErrorMarker::new(kind, err.to_string()));
        }
        Some(Ok(())) => {}
    }
    phases.advance(ConversationPhase::AwaitingResponse);

    let captured = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = watch_after_grace(surface, settings) => Some(result),
    };
    match captured {
        None => {
            phases.advance(ConversationPhase::ExchangeErrored);
            warn!("response wait interrupted by cancellation");
            ExchangeReply::Failed(ErrorMarker::new(
                FailureKind::Interrupted,
                "run cancelled while awaiting the response",
            ))
        }
        Some(Ok(response)) => {
            phases.advance(ConversationPhase::Captured);
            debug!(
                polls = response.polls,
                degraded = response.degraded,
                "response captured"
            );
            ExchangeReply::Answer(response.answer)
        }
        Some(Err(err)) => {
            let kind = watch_failure_kind(&err);
            phases.advance(match kind {
                FailureKind::ResponseTimeout => ConversationPhase::TimedOut,
                _ => ConversationPhase::ExchangeErrored,
            });
            warn!(%kind, error = %err, "response capture failed");
            ExchangeReply::Failed(ErrorMarker::new(kind, err.to_string()))
        }
    }
}

/// The assistant may not have started rendering yet right after the send
/// lands, so the first poll waits out a short grace period.
async fn watch_after_grace(
    surface: &dyn ChatSurface,
    settings: &EngineSettings,
) -> Result<CapturedResponse, WatchError> {
    sleep(settings.pacing.response_grace()).await;
    capture_response(
        surface,
        &settings.selectors,
        &settings.stability,
        &settings.extraction,
    )
    .await
}

fn dispatch_failure_kind(err: &DispatchError) -> FailureKind {
    match err {
        DispatchError::Locate(LocateError::ElementNotFound { .. }) => FailureKind::ElementNotFound,
        DispatchError::Locate(_) | DispatchError::Interaction(_) => FailureKind::DispatchFailed,
    }
}

fn watch_failure_kind(err: &WatchError) -> FailureKind {
    match err {
        WatchError::ResponseTimeout { .. } => FailureKind::ResponseTimeout,
        WatchError::Surface(_) => FailureKind::Unexpected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::FlowPacing;
    use chat_session::{ScriptedSurface, SurfaceCall, SurfaceError, SurfaceErrorKind};
    use chrono::Utc;
    use furrow_core_types::{ConversationId, InteractionLimits};
    use probe_actions::DispatchPacing;
    use probe_locator::{LocatorBudget, LogicalRole, SelectorSet};
    use response_watch::{ExtractionPolicy, StabilityWindow};
    use std::time::Duration;
    use tokio::time::Instant;

    const QUESTION: &str = "How deep should winter wheat be drilled into loam soils?";

    fn settings() -> EngineSettings {
        EngineSettings {
            selectors: SelectorSet {
                revision: "test".into(),
                chat_input: vec!["#ask".into()],
                send_control: vec!["#send".into()],
                content_root: vec!["#chat".into()],
            },
            locator: LocatorBudget::single_pass(),
            dispatch: DispatchPacing::immediate(),
            stability: StabilityWindow {
                poll_interval_ms: 10,
                required_stable_reads: 2,
                max_polls: 6,
            },
            extraction: ExtractionPolicy {
                question_line_min_len: 20,
            },
            pacing: FlowPacing::immediate(),
            limits: InteractionLimits {
                max_conversations_per_run: 3,
                max_exchanges_per_conversation: 3,
            },
        }
    }

    fn tracker() -> PhaseTracker {
        PhaseTracker::new(ConversationId::derive(Utc::now(), 0))
    }

    fn marker_kind(exchange: &Exchange) -> FailureKind {
        match &exchange.response {
            ExchangeReply::Failed(marker) => marker.kind,
            ExchangeReply::Answer(text) => panic!("expected a marker, got answer {text:?}"),
        }
    }

    #[tokio::test]
    async fn successful_exchange_carries_the_extracted_answer() {
        let page = format!("{QUESTION}\nAbout three centimetres, into firm moist tilth.");
        let surface = ScriptedSurface::new()
            .with_element("#ask")
            .with_element("#send")
            .with_snapshots("#chat", [page]);
        let mut phases = tracker();

        let exchange = run_exchange(
            &surface,
            &settings(),
            &CancellationToken::new(),
            &mut phases,
            QUESTION,
        )
        .await;

        assert_eq!(
            exchange.response.as_answer(),
            Some("About three centimetres, into firm moist tilth.")
        );
        let calls = surface.calls();
        assert_eq!(
            calls[0],
            SurfaceCall::Fill {
                selector: "#ask".into(),
                text: QUESTION.into()
            }
        );
        assert_eq!(
            calls[1],
            SurfaceCall::Click {
                selector: "#send".into()
            }
        );
        assert_eq!(phases.current(), ConversationPhase::Captured);
    }

    #[tokio::test]
    async fn missing_input_marks_the_exchange_without_polling() {
        let surface = ScriptedSurface::new().with_snapshots("#chat", ["unreached"]);
        let mut phases = tracker();

        let exchange = run_exchange(
            &surface,
            &settings(),
            &CancellationToken::new(),
            &mut phases,
            QUESTION,
        )
        .await;

        assert_eq!(marker_kind(&exchange), FailureKind::ElementNotFound);
        assert_eq!(surface.reads("#chat"), 0);
        assert_eq!(phases.current(), ConversationPhase::ExchangeErrored);
    }

    #[tokio::test]
    async fn fill_failure_marks_the_exchange_as_dispatch_failed() {
        let surface = ScriptedSurface::new()
            .with_element("#ask")
            .with_element("#send")
            .with_fill_error(SurfaceErrorKind::CdpIo);
        let mut phases = tracker();

        let exchange = run_exchange(
            &surface,
            &settings(),
            &CancellationToken::new(),
            &mut phases,
            QUESTION,
        )
        .await;

        assert_eq!(marker_kind(&exchange), FailureKind::DispatchFailed);
    }

    #[tokio::test(start_paused = true)]
    async fn unstable_content_marks_the_exchange_as_timed_out() {
        let drafts: Vec<String> = (0..20).map(|i| format!("draft {i}")).collect();
        let surface = ScriptedSurface::new()
            .with_element("#ask")
            .with_element("#send")
            .with_snapshots("#chat", drafts);
        let mut phases = tracker();

        let exchange = run_exchange(
            &surface,
            &settings(),
            &CancellationToken::new(),
            &mut phases,
            QUESTION,
        )
        .await;

        assert_eq!(marker_kind(&exchange), FailureKind::ResponseTimeout);
        assert_eq!(surface.reads("#chat"), 6);
        assert_eq!(phases.current(), ConversationPhase::TimedOut);
    }

    #[tokio::test]
    async fn read_failure_marks_the_exchange_as_unexpected() {
        let surface = ScriptedSurface::new()
            .with_element("#ask")
            .with_element("#send")
            .with_read_error(SurfaceErrorKind::CdpIo);
        let mut phases = tracker();

        let exchange = run_exchange(
            &surface,
            &settings(),
            &CancellationToken::new(),
            &mut phases,
            QUESTION,
        )
        .await;

        assert_eq!(marker_kind(&exchange), FailureKind::Unexpected);
        assert_eq!(phases.current(), ConversationPhase::ExchangeErrored);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_exchange_and_skips_the_pause() {
        let drafts: Vec<String> = (0..50).map(|i| format!("draft {i}")).collect();
        let surface = ScriptedSurface::new()
            .with_element("#ask")
            .with_element("#send")
            .with_snapshots("#chat", drafts);
        let mut phases = tracker();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut paced = settings();
        paced.pacing = FlowPacing {
            response_grace_secs: 0,
            exchange_pause_secs: 5,
        };

        let started = Instant::now();
        let exchange = run_exchange(&surface, &paced, &cancel, &mut phases, QUESTION).await;

        assert_eq!(marker_kind(&exchange), FailureKind::Interrupted);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert!(surface.calls().is_empty());
    }

    #[test]
    fn locate_misses_map_to_element_not_found() {
        let missing = DispatchError::Locate(LocateError::ElementNotFound {
            role: LogicalRole::ChatInput,
            tried: vec!["#ask".into()],
        });
        assert_eq!(dispatch_failure_kind(&missing), FailureKind::ElementNotFound);

        let empty = DispatchError::Locate(LocateError::EmptyRole(LogicalRole::SendControl));
        assert_eq!(dispatch_failure_kind(&empty), FailureKind::DispatchFailed);
    }

    #[test]
    fn interaction_failures_map_to_dispatch_failed() {
        let err = DispatchError::Interaction(SurfaceError::new(SurfaceErrorKind::CdpIo));
        assert_eq!(dispatch_failure_kind(&err), FailureKind::DispatchFailed);
    }

    #[test]
    fn watch_failures_split_into_timeout_and_unexpected() {
        assert_eq!(
            watch_failure_kind(&WatchError::ResponseTimeout { polls: 30 }),
            FailureKind::ResponseTimeout
        );
        assert_eq!(
            watch_failure_kind(&WatchError::Surface(SurfaceError::new(
                SurfaceErrorKind::ScriptFailed
            ))),
            FailureKind::Unexpected
        );
    }
}
