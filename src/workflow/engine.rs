//! Executes a declarative [`WorkflowDefinition`] against a
//! `WorkflowState`, producing the post-run state and a trace of step
//! events.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{instrument, warn};

use crate::error::{WorkflowError, WorkflowResult};
use crate::ids::{PresentationId, StepId, TraceId};
use crate::model::WorkflowState;
use crate::session::{BudgetTracker, CancellationSignal};
use crate::telemetry::{StepRecord, StepStatus, TelemetrySink};
use crate::worker::{RequestMetadata, WorkerClient, WorkerRequest};
use crate::workflow::definition::{ConditionalStep, FailureFallback, ForeachStep, OnFailure, Step, WorkerStep, WorkflowDefinition};
use crate::workflow::predicates::PredicateId;
use crate::workflow::trace::{EventKind, StepEvent, Trace};

/// Everything a run needs beyond the workflow definition and state:
/// the worker transport, telemetry sink, and the session's shared
/// budget/cancellation signal.
pub struct RunContext<'a> {
    pub worker_client: Arc<dyn WorkerClient>,
    pub telemetry: Arc<dyn TelemetrySink>,
    pub trace_id: TraceId,
    pub presentation_id: PresentationId,
    pub cancellation: &'a CancellationSignal,
    pub budget: &'a BudgetTracker,
}

/// Result of a full engine run. `error` is set when the run stopped
/// early; `state` is always the last successfully committed barrier,
/// never a half-applied one.
pub struct RunOutcome {
    pub state: WorkflowState,
    pub trace: Trace,
    pub error: Option<WorkflowError>,
}

#[derive(Default)]
pub struct WorkflowEngine;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

impl WorkflowEngine {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip(self, definition, initial_state, ctx))]
    pub async fn run(
        &self,
        definition: &WorkflowDefinition,
        initial_state: WorkflowState,
        ctx: &RunContext<'_>,
    ) -> WorkflowResult<RunOutcome> {
        definition.validate()?;

        let mut state = initial_state;
        let mut trace = Trace::default();

        for step in &definition.steps {
            let (next_state, error) = self.execute_step(step, state, ctx, &mut trace).await;
            state = next_state;
            if let Some(error) = error {
                return Ok(RunOutcome {
                    state,
                    trace,
                    error: Some(error),
                });
            }
        }

        Ok(RunOutcome { state, trace, error: None })
    }

    fn execute_step<'a>(
        &'a self,
        step: &'a Step,
        state: WorkflowState,
        ctx: &'a RunContext<'a>,
        trace: &'a mut Trace,
    ) -> BoxFuture<'a, (WorkflowState, Option<WorkflowError>)> {
        Box::pin(async move {
            match step {
                Step::Worker(worker_step) => self.execute_worker_step(worker_step, state, ctx, trace, None).await,
                Step::Parallel { id, steps } => self.execute_parallel(id, steps, state, ctx, trace).await,
                Step::Foreach(foreach_step) => self.execute_foreach(foreach_step, state, ctx, trace).await,
                Step::Conditional(conditional) => self.execute_conditional(conditional, state, ctx, trace).await,
                Step::Noop { id } => {
                    trace.push(skipped_event(id.clone(), None, "noop"));
                    (state, None)
                }
            }
        })
    }

    async fn execute_conditional<'a>(
        &'a self,
        conditional: &'a ConditionalStep,
        state: WorkflowState,
        ctx: &'a RunContext<'a>,
        trace: &'a mut Trace,
    ) -> (WorkflowState, Option<WorkflowError>) {
        if PredicateId::evaluate(conditional.predicate, &state) {
            self.execute_step(&conditional.then_branch, state, ctx, trace).await
        } else if let Some(else_branch) = &conditional.else_branch {
            self.execute_step(else_branch, state, ctx, trace).await
        } else {
            trace.push(skipped_event(conditional.id.clone(), None, "condition false, no else branch"));
            (state, None)
        }
    }

    async fn execute_parallel<'a>(
        &'a self,
        _id: &'a StepId,
        steps: &'a [WorkerStep],
        state: WorkflowState,
        ctx: &'a RunContext<'a>,
        trace: &'a mut Trace,
    ) -> (WorkflowState, Option<WorkflowError>) {
        if ctx.cancellation.is_cancelled() {
            for step in steps {
                trace.push(skipped_event(step.id.clone(), Some(step.worker.clone()), "cancelled"));
            }
            return (state, Some(WorkflowError::Cancelled));
        }

        let state_ref = &state;
        let mut futures = FuturesUnordered::new();
        for (index, step) in steps.iter().enumerate() {
            futures.push(async move {
                let outcome = self.invoke_and_score(step, state_ref, ctx, None).await;
                (index, outcome)
            });
        }

        let mut outcomes: Vec<Option<StepOutcome>> = (0..steps.len()).map(|_| None).collect();
        while let Some((index, outcome)) = futures.next().await {
            outcomes[index] = Some(outcome);
        }
        drop(futures);

        let triples = steps
            .iter()
            .zip(outcomes)
            .map(|(step, outcome)| (step, None::<Value>, outcome));
        self.apply_in_order(triples, state, trace)
    }

    async fn execute_foreach<'a>(
        &'a self,
        foreach: &'a ForeachStep,
        state: WorkflowState,
        ctx: &'a RunContext<'a>,
        trace: &'a mut Trace,
    ) -> (WorkflowState, Option<WorkflowError>) {
        let items = match crate::workflow::input::InputMapping::resolve_items(&state, &foreach.items_path) {
            Ok(items) => items,
            Err(err) => return (state, Some(err)),
        };

        if items.is_empty() {
            trace.push(skipped_event(foreach.id.clone(), None, "empty items_path"));
            return (state, None);
        }

        let semaphore = Arc::new(Semaphore::new(foreach.concurrency.max(1)));
        let state_ref = &state;
        let mut futures = FuturesUnordered::new();

        for (index, item) in items.iter().enumerate() {
            if ctx.cancellation.is_cancelled() {
                break;
            }
            let semaphore = semaphore.clone();
            let item = item.clone();
            futures.push(async move {
                let _permit = semaphore.acquire().await.expect("semaphore never closed");
                let outcome = self.invoke_and_score(&foreach.body, state_ref, ctx, Some(&item)).await;
                (index, outcome)
            });
        }

        let started = futures.len();
        let mut outcomes: Vec<Option<StepOutcome>> = (0..started).map(|_| None).collect();
        while let Some((index, outcome)) = futures.next().await {
            outcomes[index] = Some(outcome);
        }
        drop(futures);

        let total_items = items.len();
        if started < total_items {
            warn!(started, total = total_items, "foreach cancelled before all items were started");
        }

        let triples = items
            .into_iter()
            .take(started)
            .zip(outcomes)
            .map(|(item, outcome)| (&foreach.body, Some(item), outcome));
        let (next_state, mut error) = self.apply_in_order(triples, state, trace);

        if started < total_items && error.is_none() {
            error = Some(WorkflowError::Cancelled);
        }

        (next_state, error)
    }

    /// Invokes one worker step's transport + scores the result without
    /// touching `state` — used by `parallel`/`foreach` where mutation
    /// application is deferred to a declaration-order barrier.
    async fn invoke_and_score(
        &self,
        step: &WorkerStep,
        state: &WorkflowState,
        ctx: &RunContext<'_>,
        item: Option<&Value>,
    ) -> StepOutcome {
        if let Err(err) = ctx.cancellation.check() {
            return StepOutcome::Failed(err);
        }

        let input = match step.input.evaluate(state, item) {
            Ok(input) => input,
            Err(err) => return StepOutcome::Failed(err),
        };

        let projected_tokens = estimate_projected_tokens(&input);
        if let Err(err) = ctx.budget.reserve(projected_tokens) {
            return StepOutcome::Failed(err);
        }

        let request = WorkerRequest {
            input,
            model: None,
            temperature: None,
            metadata: RequestMetadata {
                trace_id: ctx.trace_id.clone(),
                step_id: step.id.clone(),
                presentation_id: ctx.presentation_id.clone(),
            },
        };

        let started_at = Instant::now();
        match ctx.worker_client.invoke(&step.worker, request).await {
            Ok(response) => StepOutcome::Succeeded {
                result: response.result,
                usage: response.usage,
                duration_ms: started_at.elapsed().as_millis() as u64,
            },
            Err(err) => StepOutcome::Failed(err),
        }
    }

    /// Applies each step's mutation (if it succeeded) in the fixed
    /// declaration/item order given by the iterator, regardless of the
    /// order the calls actually completed in. `item` is the `foreach`
    /// item the call ran against, if any, and is forwarded to the
    /// mutation unchanged.
    fn apply_in_order<'a, I>(&self, pairs: I, mut state: WorkflowState, trace: &mut Trace) -> (WorkflowState, Option<WorkflowError>)
    where
        I: Iterator<Item = (&'a WorkerStep, Option<Value>, Option<StepOutcome>)>,
    {
        for (step, item, outcome) in pairs {
            match outcome {
                None => trace.push(skipped_event(step.id.clone(), Some(step.worker.clone()), "not started")),
                Some(StepOutcome::Succeeded { result, usage, duration_ms }) => {
                    match step.mutation.apply(&state, &result, item.as_ref()) {
                        Ok(next) => {
                            trace.push(StepEvent {
                                step_id: step.id.clone(),
                                worker: Some(step.worker.clone()),
                                kind: EventKind::StepSucceeded,
                                timestamp: Utc::now(),
                                duration_ms,
                                usage: Some(usage),
                                error: None,
                            });
                            state = next;
                        }
                        Err(err) => {
                            trace.push(failed_event(step.id.clone(), Some(step.worker.clone()), &err));
                            return (state, Some(err));
                        }
                    }
                }
                Some(StepOutcome::Failed(err)) => {
                    trace.push(failed_event(step.id.clone(), Some(step.worker.clone()), &err));
                    match &step.on_failure {
                        OnFailure::Continue => continue,
                        OnFailure::Retry {
                            fallback: FailureFallback::Continue,
                        } => continue,
                        _ => return (state, Some(err)),
                    }
                }
            }
        }
        (state, None)
    }

    async fn execute_worker_step<'a>(
        &'a self,
        step: &'a WorkerStep,
        state: WorkflowState,
        ctx: &'a RunContext<'a>,
        trace: &'a mut Trace,
        item: Option<&'a Value>,
    ) -> (WorkflowState, Option<WorkflowError>) {
        trace.push(StepEvent {
            step_id: step.id.clone(),
            worker: Some(step.worker.clone()),
            kind: EventKind::StepStarted,
            timestamp: Utc::now(),
            duration_ms: 0,
            usage: None,
            error: None,
        });

        let outcome = self.invoke_and_score(step, &state, ctx, item).await;
        let (next_state, error) =
            self.apply_in_order(std::iter::once((step, item.cloned(), Some(outcome))), state, trace);

        if let Some(err) = &error {
            ctx.telemetry.record(StepRecord::from_usage(
                ctx.trace_id.clone(),
                step.id.clone(),
                Some(step.worker.clone()),
                Utc::now(),
                0,
                None,
                StepStatus::Failed,
                Some(err.to_string()),
            ));
        } else {
            ctx.telemetry.record(StepRecord::from_usage(
                ctx.trace_id.clone(),
                step.id.clone(),
                Some(step.worker.clone()),
                Utc::now(),
                0,
                None,
                StepStatus::Succeeded,
                None,
            ));
        }

        (next_state, error)
    }
}

enum StepOutcome {
    Succeeded {
        result: Value,
        usage: crate::worker::Usage,
        duration_ms: u64,
    },
    Failed(WorkflowError),
}

fn estimate_projected_tokens(input: &Value) -> u64 {
    let text = input.to_string();
    crate::worker::Usage::estimate_from_text(&text, "").prompt_tokens * 2
}

fn skipped_event(step_id: StepId, worker: Option<String>, reason: &str) -> StepEvent {
    StepEvent {
        step_id,
        worker,
        kind: EventKind::StepSkipped,
        timestamp: Utc::now(),
        duration_ms: 0,
        usage: None,
        error: Some(reason.to_string()),
    }
}

fn failed_event(step_id: StepId, worker: Option<String>, err: &WorkflowError) -> StepEvent {
    StepEvent {
        step_id,
        worker,
        kind: EventKind::StepFailed,
        timestamp: Utc::now(),
        duration_ms: 0,
        usage: None,
        error: Some(err.to_string()),
    }
}
