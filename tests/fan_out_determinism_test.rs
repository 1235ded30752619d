//! Integration test: fan-out commit determinism and state monotonicity
//! across a full `WorkflowEngine::run`, independent of the order in
//! which concurrent `foreach` children actually complete.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deckforge::config::BudgetConfig;
use deckforge::error::{WorkflowError, WorkflowResult};
use deckforge::ids::{PresentationId, SectionId, StepId, TraceId};
use deckforge::model::{OutlineSection, WorkflowState};
use deckforge::session::{BudgetTracker, CancellationSignal};
use deckforge::telemetry::InMemoryTelemetrySink;
use deckforge::worker::{WorkerClient, WorkerRequest, WorkerResponse};
use deckforge::workflow::{
    ForeachStep, InputMapping, MutationId, OnFailure, RunContext, Step, WorkerStep, WorkflowDefinition, WorkflowEngine,
};
use proptest::prelude::*;
use serde_json::json;

/// A worker whose response delay is inversely correlated with the item
/// index, so the first-declared item is guaranteed to finish last.
struct ReorderingClient {
    calls: AtomicU32,
}

#[async_trait]
impl WorkerClient for ReorderingClient {
    async fn invoke(&self, _worker_name: &str, request: WorkerRequest) -> WorkflowResult<WorkerResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let index: u64 = request.input["id"].as_str().unwrap().parse().unwrap();
        // Item 0 sleeps longest, item 3 returns almost immediately.
        tokio::time::sleep(Duration::from_millis((3 - index) * 15)).await;
        Ok(WorkerResponse {
            result: json!({
                "id": request.input["id"],
                "title": format!("Title {index}"),
                "content": [],
            }),
            usage: deckforge::worker::Usage::default(),
            telemetry: None,
        })
    }
}

fn seeded_state() -> WorkflowState {
    let mut state = WorkflowState::new(PresentationId::new("p1"));
    state.outline.sections = (0..4)
        .map(|i| OutlineSection {
            id: SectionId::new(i.to_string()),
            title: format!("Section {i}"),
            description: None,
            bullets: vec![],
        })
        .collect();
    state
}

fn write_slides_definition() -> WorkflowDefinition {
    WorkflowDefinition {
        name: "fan_out".to_string(),
        version: "1".to_string(),
        steps: vec![Step::Foreach(ForeachStep {
            id: StepId::new("write_slides"),
            items_path: "outline.sections".to_string(),
            concurrency: 4,
            body: WorkerStep {
                id: StepId::new("write_slides.body"),
                worker: "write-slide".to_string(),
                input: InputMapping::object(vec![("id", InputMapping::item("id"))]),
                mutation: MutationId::UpsertSlide,
                on_failure: OnFailure::Fail,
            },
        })],
    }
}

#[tokio::test]
async fn fan_out_commit_order_is_independent_of_completion_order() {
    let worker_client: Arc<dyn WorkerClient> = Arc::new(ReorderingClient { calls: AtomicU32::new(0) });
    let telemetry: Arc<dyn deckforge::telemetry::TelemetrySink> = Arc::new(InMemoryTelemetrySink::default());
    let cancellation = CancellationSignal::default();
    let budget = BudgetTracker::new(&BudgetConfig::default());

    let ctx = RunContext {
        worker_client,
        telemetry,
        trace_id: TraceId::generate(),
        presentation_id: PresentationId::new("p1"),
        cancellation: &cancellation,
        budget: &budget,
    };

    let engine = WorkflowEngine::new();
    let definition = write_slides_definition();
    let outcome = engine.run(&definition, seeded_state(), &ctx).await.unwrap();

    assert!(outcome.error.is_none());
    // Even though item 0 finishes last, its slide must still land first
    // in the committed state: declaration order, not completion order.
    let ids: Vec<&str> = outcome.state.slides.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["0", "1", "2", "3"]);
    assert_eq!(outcome.state.version, 1, "one foreach barrier commits as a single version bump");
}

#[tokio::test]
async fn failed_step_does_not_bump_version() {
    struct AlwaysFails;
    #[async_trait]
    impl WorkerClient for AlwaysFails {
        async fn invoke(&self, _worker_name: &str, _request: WorkerRequest) -> WorkflowResult<WorkerResponse> {
            Err(WorkflowError::Validation("bad".into()))
        }
    }

    let worker_client: Arc<dyn WorkerClient> = Arc::new(AlwaysFails);
    let telemetry: Arc<dyn deckforge::telemetry::TelemetrySink> = Arc::new(InMemoryTelemetrySink::default());
    let cancellation = CancellationSignal::default();
    let budget = BudgetTracker::new(&BudgetConfig::default());
    let ctx = RunContext {
        worker_client,
        telemetry,
        trace_id: TraceId::generate(),
        presentation_id: PresentationId::new("p1"),
        cancellation: &cancellation,
        budget: &budget,
    };

    let definition = WorkflowDefinition {
        name: "single_worker".to_string(),
        version: "1".to_string(),
        steps: vec![Step::Worker(WorkerStep {
            id: StepId::new("clarify"),
            worker: "clarify".to_string(),
            input: InputMapping::literal(json!({})),
            mutation: MutationId::StoreClarifyResult,
            on_failure: OnFailure::Fail,
        })],
    };

    let engine = WorkflowEngine::new();
    let outcome = engine.run(&definition, WorkflowState::new(PresentationId::new("p1")), &ctx).await.unwrap();
    assert!(outcome.error.is_some());
    assert_eq!(outcome.state.version, 0);
}

fn parallel_write_slides_definition() -> WorkflowDefinition {
    let steps = (0..4u64)
        .map(|i| WorkerStep {
            id: StepId::new(format!("write_slides.{i}")),
            worker: "write-slide".to_string(),
            input: InputMapping::object(vec![("id", InputMapping::literal(json!(i.to_string())))]),
            mutation: MutationId::UpsertSlide,
            on_failure: OnFailure::Fail,
        })
        .collect();
    WorkflowDefinition {
        name: "parallel_fan_out".to_string(),
        version: "1".to_string(),
        steps: vec![Step::Parallel {
            id: StepId::new("write_slides"),
            steps,
        }],
    }
}

#[tokio::test]
async fn parallel_step_commits_in_declaration_order_regardless_of_completion_order() {
    let worker_client: Arc<dyn WorkerClient> = Arc::new(ReorderingClient { calls: AtomicU32::new(0) });
    let telemetry: Arc<dyn deckforge::telemetry::TelemetrySink> = Arc::new(InMemoryTelemetrySink::default());
    let cancellation = CancellationSignal::default();
    let budget = BudgetTracker::new(&BudgetConfig::default());

    let ctx = RunContext {
        worker_client,
        telemetry,
        trace_id: TraceId::generate(),
        presentation_id: PresentationId::new("p1"),
        cancellation: &cancellation,
        budget: &budget,
    };

    let engine = WorkflowEngine::new();
    let definition = parallel_write_slides_definition();
    let outcome = engine.run(&definition, WorkflowState::new(PresentationId::new("p1")), &ctx).await.unwrap();

    assert!(outcome.error.is_none());
    // Step 0 (index 0) sleeps longest, step 3 returns almost immediately,
    // yet the committed slides must still land in declaration order.
    let ids: Vec<&str> = outcome.state.slides.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["0", "1", "2", "3"]);
    assert_eq!(outcome.state.version, 1, "one parallel barrier commits as a single version bump");
}

/// A worker whose per-item delay is supplied directly, so a property
/// test can throw arbitrary completion orders at the fan-out barrier.
struct ArbitraryDelayClient {
    delays_ms: Vec<u64>,
}

#[async_trait]
impl WorkerClient for ArbitraryDelayClient {
    async fn invoke(&self, _worker_name: &str, request: WorkerRequest) -> WorkflowResult<WorkerResponse> {
        let index: usize = request.input["id"].as_str().unwrap().parse().unwrap();
        tokio::time::sleep(Duration::from_millis(self.delays_ms[index])).await;
        Ok(WorkerResponse {
            result: json!({"id": request.input["id"], "title": format!("Title {index}"), "content": []}),
            usage: deckforge::worker::Usage::default(),
            telemetry: None,
        })
    }
}

fn state_with_sections(n: usize) -> WorkflowState {
    let mut state = WorkflowState::new(PresentationId::new("p1"));
    state.outline.sections = (0..n)
        .map(|i| OutlineSection {
            id: SectionId::new(i.to_string()),
            title: format!("Section {i}"),
            description: None,
            bullets: vec![],
        })
        .collect();
    state
}

fn write_slides_definition_with_concurrency(concurrency: usize) -> WorkflowDefinition {
    WorkflowDefinition {
        name: "fan_out_prop".to_string(),
        version: "1".to_string(),
        steps: vec![Step::Foreach(ForeachStep {
            id: StepId::new("write_slides"),
            items_path: "outline.sections".to_string(),
            concurrency,
            body: WorkerStep {
                id: StepId::new("write_slides.body"),
                worker: "write-slide".to_string(),
                input: InputMapping::object(vec![("id", InputMapping::item("id"))]),
                mutation: MutationId::UpsertSlide,
                on_failure: OnFailure::Fail,
            },
        })],
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// However the per-item completion order shuffles under an
    /// arbitrary set of delays, the committed slide order must still
    /// match declaration order.
    #[test]
    fn fan_out_commits_in_declaration_order_for_any_completion_order(
        delays in prop::collection::vec(0u64..20, 2..6),
    ) {
        let n = delays.len();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let worker_client: Arc<dyn WorkerClient> = Arc::new(ArbitraryDelayClient { delays_ms: delays });
            let telemetry: Arc<dyn deckforge::telemetry::TelemetrySink> = Arc::new(InMemoryTelemetrySink::default());
            let cancellation = CancellationSignal::default();
            let budget = BudgetTracker::new(&BudgetConfig::default());
            let ctx = RunContext {
                worker_client,
                telemetry,
                trace_id: TraceId::generate(),
                presentation_id: PresentationId::new("p1"),
                cancellation: &cancellation,
                budget: &budget,
            };

            let engine = WorkflowEngine::new();
            let definition = write_slides_definition_with_concurrency(n);
            let outcome = engine.run(&definition, state_with_sections(n), &ctx).await.unwrap();

            prop_assert!(outcome.error.is_none());
            let ids: Vec<String> = outcome.state.slides.iter().map(|s| s.id.as_str().to_string()).collect();
            let expected: Vec<String> = (0..n).map(|i| i.to_string()).collect();
            prop_assert_eq!(ids, expected);
            Ok(())
        })?;
    }
}
