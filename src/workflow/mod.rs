//! The declarative workflow engine: definitions, the executor, the
//! named mutation/predicate registries, and the per-run trace.

pub mod definition;
pub mod engine;
pub mod input;
pub mod mutations;
pub mod predicates;
pub mod trace;

pub use definition::{
    presentation_pipeline, ConditionalStep, FailureFallback, ForeachStep, OnFailure, Step, WorkerStep,
    WorkflowDefinition,
};
pub use engine::{RunContext, RunOutcome, WorkflowEngine};
pub use input::InputMapping;
pub use mutations::MutationId;
pub use predicates::PredicateId;
pub use trace::{EventKind, StepEvent, Trace};
