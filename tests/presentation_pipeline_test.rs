//! End-to-end happy-path test (scenario S1): drives the full built-in
//! `presentation_pipeline()` through in-process worker stand-ins and
//! checks the shape spec §8/S1 requires of the final state.

use std::sync::Arc;

use deckforge::config::BudgetConfig;
use deckforge::ids::{PresentationId, TraceId};
use deckforge::model::WorkflowState;
use deckforge::session::{BudgetTracker, CancellationSignal};
use deckforge::telemetry::InMemoryTelemetrySink;
use deckforge::worker::{InProcessWorkerClient, WorkerClient, WorkerResponse};
use deckforge::workflow::{presentation_pipeline, RunContext, WorkflowEngine};
use serde_json::json;

fn worker_client() -> InProcessWorkerClient {
    let mut client = InProcessWorkerClient::new();

    client.register(
        "clarify",
        Arc::new(|_req| {
            Ok(WorkerResponse {
                result: json!({"response": "Microservices let teams ship independently.", "finished": true}),
                usage: deckforge::worker::Usage::default(),
                telemetry: None,
            })
        }),
    );

    client.register(
        "outline",
        Arc::new(|_req| {
            let sections = (0..6)
                .map(|i| {
                    json!({
                        "title": format!("Section {i}"),
                        "bullets": ["point a", "point b"],
                    })
                })
                .collect::<Vec<_>>();
            Ok(WorkerResponse {
                result: json!({"sections": sections}),
                usage: deckforge::worker::Usage::default(),
                telemetry: None,
            })
        }),
    );

    client.register(
        "research",
        Arc::new(|_req| {
            Ok(WorkerResponse {
                result: json!({"findings": ["microservices scale independently"]}),
                usage: deckforge::worker::Usage::default(),
                telemetry: None,
            })
        }),
    );

    client.register(
        "write-slide",
        Arc::new(|req| {
            let section = &req.input["section"];
            Ok(WorkerResponse {
                result: json!({
                    "id": section["id"],
                    "title": section["title"],
                    "content": ["point a", "point b"],
                    "speakerNotes": "Say this out loud.",
                }),
                usage: deckforge::worker::Usage::default(),
                telemetry: None,
            })
        }),
    );

    client.register(
        "design",
        Arc::new(|req| {
            let mut slide = req.input["slide"].clone();
            slide["design"] = json!({"colors": ["#ffffff", "#000000"]});
            Ok(WorkerResponse {
                result: slide,
                usage: deckforge::worker::Usage::default(),
                telemetry: None,
            })
        }),
    );

    client.register(
        "critique",
        Arc::new(|req| {
            Ok(WorkerResponse {
                result: json!({
                    "slide_id": req.input["slide"]["id"],
                    "issues_found": [],
                    "fixes_applied": [],
                }),
                usage: deckforge::worker::Usage::default(),
                telemetry: None,
            })
        }),
    );

    client.register(
        "script",
        Arc::new(|_req| {
            Ok(WorkerResponse {
                result: json!({"script": "Welcome, everyone. Let's talk microservices."}),
                usage: deckforge::worker::Usage::default(),
                telemetry: None,
            })
        }),
    );

    client.register(
        "polish-notes",
        Arc::new(|_req| {
            Ok(WorkerResponse {
                result: json!({"deck_ready": true}),
                usage: deckforge::worker::Usage::default(),
                telemetry: None,
            })
        }),
    );

    client
}

#[tokio::test]
async fn happy_path_produces_a_complete_deck() {
    let worker_client: Arc<dyn WorkerClient> = Arc::new(worker_client());
    let telemetry: Arc<dyn deckforge::telemetry::TelemetrySink> = Arc::new(InMemoryTelemetrySink::default());
    let cancellation = CancellationSignal::default();
    let budget = BudgetTracker::new(&BudgetConfig::default());

    let mut state = WorkflowState::new(PresentationId::new("p1"));
    state.audience = Some("CTOs".to_string());
    state.tone = Some("professional".to_string());

    let ctx = RunContext {
        worker_client,
        telemetry,
        trace_id: TraceId::generate(),
        presentation_id: PresentationId::new("p1"),
        cancellation: &cancellation,
        budget: &budget,
    };

    let engine = WorkflowEngine::new();
    let definition = presentation_pipeline();
    let outcome = engine.run(&definition, state, &ctx).await.unwrap();

    assert!(outcome.error.is_none(), "happy path must not error: {:?}", outcome.error.map(|e| e.to_string()));
    assert_eq!(outcome.state.outline.sections.len(), 6);
    assert_eq!(outcome.state.slides.len(), 6);
    for slide in &outcome.state.slides {
        assert!(!slide.title.is_empty());
        assert!(!slide.content.is_empty());
        assert!(slide.speaker_notes.is_some());
        assert_eq!(slide.design.get("colors").and_then(|v| v.as_array()).map(|a| a.len()), Some(2));
    }
    assert!(outcome.state.script.as_deref().unwrap_or_default().len() > 0);
    assert!(outcome.state.final_response.is_some());
    assert!(outcome.state.version > 0);
}
