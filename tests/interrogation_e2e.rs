use std::sync::Arc;

use serde_json::Value;

use chat_session::{ScriptedSurface, SurfaceErrorKind};
use furrow_core_types::{
    ConversationPlan, ExchangeReply, FailureKind, InteractionLimits, Transcript,
};
use interrogation_flow::{EngineSettings, FlowPacing, InterrogationEngine, ScriptedFactory};
use probe_actions::DispatchPacing;
use probe_locator::{LocatorBudget, SelectorSet};
use response_watch::{ExtractionPolicy, StabilityWindow};

const FIRST_REPLY: &str =
    "What row spacing suits maize on sandy loam?\nThirty inches keeps the canopy open.";
const SECOND_REPLY: &str =
    "Does that change under irrigation?\nNarrow to twenty-two inches when water is assured.";

fn quick_settings() -> EngineSettings {
    EngineSettings {
        selectors: SelectorSet {
            revision: "e2e".to_string(),
            chat_input: vec!["#ask".to_string()],
            send_control: vec!["#send".to_string()],
            content_root: vec!["#chat".to_string()],
        },
        locator: LocatorBudget::single_pass(),
        dispatch: DispatchPacing::immediate(),
        stability: StabilityWindow {
            poll_interval_ms: 10,
            required_stable_reads: 2,
            max_polls: 8,
        },
        extraction: ExtractionPolicy {
            question_line_min_len: 25,
        },
        pacing: FlowPacing::immediate(),
        limits: InteractionLimits {
            max_conversations_per_run: 4,
            max_exchanges_per_conversation: 3,
        },
    }
}

fn plans() -> Vec<ConversationPlan> {
    vec![
        ConversationPlan {
            topic: "row spacing".to_string(),
            opening_question: "What row spacing suits maize on sandy loam?".to_string(),
            follow_ups: vec!["Does that change under irrigation?".to_string()],
        },
        ConversationPlan {
            topic: "field drains".to_string(),
            opening_question: "How deep should a collector drain run?".to_string(),
            follow_ups: Vec::new(),
        },
        ConversationPlan {
            topic: "slurry timing".to_string(),
            opening_question: "When can slurry go onto frozen ground?".to_string(),
            follow_ups: vec![
                "What about snow cover?".to_string(),
                "And on a slope?".to_string(),
            ],
        },
        ConversationPlan {
            topic: "seed rates".to_string(),
            opening_question: "What seed rate suits late-drilled winter wheat?".to_string(),
            follow_ups: Vec::new(),
        },
    ]
}

fn answering_surface() -> ScriptedSurface {
    // Two exchanges share one read cursor: three reads each, landing on
    // a stable snapshot both times.
    ScriptedSurface::new()
        .with_element("#ask")
        .with_element("#send")
        .with_snapshots(
            "#chat",
            [
                "Thinking...",
                FIRST_REPLY,
                FIRST_REPLY,
                "Thinking again...",
                SECOND_REPLY,
                SECOND_REPLY,
            ],
        )
}

fn inputless_surface() -> ScriptedSurface {
    ScriptedSurface::new()
        .with_element("#send")
        .with_snapshots("#chat", ["never consulted"])
}

fn restless_surface() -> ScriptedSurface {
    let drafts: Vec<String> = (0..20).map(|i| format!("draft {i}")).collect();
    ScriptedSurface::new()
        .with_element("#ask")
        .with_element("#send")
        .with_snapshots("#chat", drafts)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn mixed_batch_produces_isolated_transcripts() {
    let factory = Arc::new(
        ScriptedFactory::new()
            .with_session(answering_surface())
            .with_open_failure(SurfaceErrorKind::NavTimeout)
            .with_session(inputless_surface())
            .with_session(restless_surface()),
    );
    let engine = InterrogationEngine::new(factory.clone(), quick_settings());

    let transcripts = engine.run(&plans()).await;

    assert_eq!(transcripts.len(), 4);
    assert_eq!(factory.open_calls(), 4);

    // Conversation 0: both questions answered.
    let clean = &transcripts[0];
    assert!(!clean.is_failed());
    assert_eq!(clean.topic, "row spacing");
    assert_eq!(clean.exchanges.len(), 2);
    assert_eq!(
        clean.exchanges[0].response.as_answer(),
        Some("Thirty inches keeps the canopy open.")
    );
    assert_eq!(
        clean.exchanges[1].response.as_answer(),
        Some("Narrow to twenty-two inches when water is assured.")
    );
    assert!(factory.surface(0).unwrap().is_closed());

    // Conversation 1: the session never opened.
    let stub = &transcripts[1];
    assert!(stub.is_failed());
    assert!(stub.conversation_id.is_failed());
    assert_eq!(stub.topic, "field drains");
    assert!(stub.error.is_some());
    assert_eq!(stub.exchanges.len(), 1);
    match &stub.exchanges[0].response {
        ExchangeReply::Failed(marker) => {
            assert_eq!(marker.kind, FailureKind::SessionOpenFailed)
        }
        other => panic!("expected a failure marker, got {other:?}"),
    }

    // Conversation 2: every exchange errors, the conversation keeps going.
    let inputless = &transcripts[2];
    assert!(!inputless.is_failed());
    assert_eq!(inputless.exchanges.len(), 3);
    for exchange in &inputless.exchanges {
        match &exchange.response {
            ExchangeReply::Failed(marker) => {
                assert_eq!(marker.kind, FailureKind::ElementNotFound)
            }
            other => panic!("expected a failure marker, got {other:?}"),
        }
    }
    let surface = factory.surface(2).unwrap();
    assert_eq!(surface.reads("#chat"), 0);
    assert!(surface.is_closed());

    // Conversation 3: content never settles within the poll budget.
    let restless = &transcripts[3];
    assert_eq!(restless.exchanges.len(), 1);
    match &restless.exchanges[0].response {
        ExchangeReply::Failed(marker) => {
            assert_eq!(marker.kind, FailureKind::ResponseTimeout)
        }
        other => panic!("expected a failure marker, got {other:?}"),
    }
    assert_eq!(factory.surface(3).unwrap().reads("#chat"), 8);
    assert!(factory.surface(3).unwrap().is_closed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn transcript_documents_mix_answers_and_markers() {
    let factory = Arc::new(
        ScriptedFactory::new()
            .with_session(answering_surface())
            .with_open_failure(SurfaceErrorKind::LaunchFailed),
    );
    let engine = InterrogationEngine::new(factory, quick_settings());

    let transcripts = engine.run(&plans()[..2]).await;
    let rendered = serde_json::to_string_pretty(&transcripts).unwrap();
    let value: Value = serde_json::from_str(&rendered).unwrap();

    assert!(value[0]["exchanges"][0]["response"].is_string());
    assert!(value[0]["timestamp"].is_string());
    assert!(value[0].get("error").is_none());

    assert!(value[1]["conversation_id"]
        .as_str()
        .unwrap()
        .ends_with("_FAILED"));
    assert_eq!(
        value[1]["exchanges"][0]["response"]["kind"],
        Value::String("session_open_failed".to_string())
    );
    assert!(value[1]["error"].is_string());

    let reparsed: Vec<Transcript> = serde_json::from_str(&rendered).unwrap();
    assert_eq!(reparsed, transcripts);
}
