//! Declarative workflow definitions.
//!
//! Loaded from a config file (TOML/JSON via `serde`); an unknown
//! `mutation` or `predicate` name fails to deserialize at load time
//! rather than surfacing as a runtime surprise, because both are closed
//! Rust enums rather than strings looked up in a registry.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{WorkflowError, WorkflowResult};
use crate::ids::StepId;
use crate::workflow::input::InputMapping;
use crate::workflow::mutations::MutationId;
use crate::workflow::predicates::PredicateId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureFallback {
    Fail,
    Continue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "on_failure", rename_all = "snake_case")]
pub enum OnFailure {
    /// Abort the run; the last successful barrier-commit state is returned.
    Fail,
    /// Log and advance to the next step with state unchanged.
    Continue,
    /// Delegate to the worker client's retry policy; on exhaustion fall
    /// through to `fallback`.
    Retry { fallback: FailureFallback },
}

impl Default for OnFailure {
    fn default() -> Self {
        OnFailure::Fail
    }
}

/// A single worker invocation: resolve `input`, call `worker`, apply
/// `mutation` to the result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStep {
    pub id: StepId,
    pub worker: String,
    pub input: InputMapping,
    pub mutation: MutationId,
    #[serde(default)]
    pub on_failure: OnFailure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalStep {
    pub id: StepId,
    pub predicate: PredicateId,
    pub then_branch: Box<Step>,
    #[serde(default)]
    pub else_branch: Option<Box<Step>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeachStep {
    pub id: StepId,
    pub items_path: String,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    pub body: WorkerStep,
}

fn default_concurrency() -> usize {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    Worker(WorkerStep),
    Parallel { id: StepId, steps: Vec<WorkerStep> },
    Foreach(ForeachStep),
    Conditional(ConditionalStep),
    Noop { id: StepId },
}

impl Step {
    pub fn id(&self) -> &StepId {
        match self {
            Step::Worker(s) => &s.id,
            Step::Parallel { id, .. } => id,
            Step::Foreach(s) => &s.id,
            Step::Conditional(s) => &s.id,
            Step::Noop { id } => id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    pub version: String,
    pub steps: Vec<Step>,
}

impl WorkflowDefinition {
    pub fn validate(&self) -> WorkflowResult<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        for step in &self.steps {
            validate_step(step, &mut seen)?;
        }
        Ok(())
    }
}

/// The built-in presentation pipeline: clarify the brief, outline
/// sections, ground each section against ingested evidence, research,
/// write and design each slide, critique, then script and polish.
///
/// This is the one workflow the server exposes at
/// `POST /v1/workflow/presentation`; a deployment that needs a
/// different shape loads its own definition instead of this one.
pub fn presentation_pipeline() -> WorkflowDefinition {
    let clarify = Step::Worker(WorkerStep {
        id: StepId::new("clarify"),
        worker: "clarify".to_string(),
        input: InputMapping::object(vec![
            ("history", InputMapping::state("history")),
            ("audience", InputMapping::state("audience")),
            ("tone", InputMapping::state("tone")),
            ("length", InputMapping::state("length")),
        ]),
        mutation: MutationId::StoreClarifyResult,
        on_failure: OnFailure::Fail,
    });

    let outline = Step::Worker(WorkerStep {
        id: StepId::new("outline"),
        worker: "outline".to_string(),
        input: InputMapping::object(vec![
            ("clarify_response", InputMapping::state("clarify.response")),
            ("audience", InputMapping::state("audience")),
            ("tone", InputMapping::state("tone")),
            ("length", InputMapping::state("length")),
        ]),
        mutation: MutationId::StoreOutlineResult,
        on_failure: OnFailure::Fail,
    });

    let ground_sections = Step::Conditional(ConditionalStep {
        id: StepId::new("ground_sections"),
        predicate: PredicateId::HasIngestedFiles,
        then_branch: Box::new(Step::Foreach(ForeachStep {
            id: StepId::new("ground_sections.foreach"),
            items_path: "outline.sections".to_string(),
            concurrency: 4,
            body: WorkerStep {
                id: StepId::new("ground_sections.foreach.body"),
                worker: "retrieve".to_string(),
                input: InputMapping::object(vec![
                    ("id", InputMapping::item("id")),
                    ("title", InputMapping::item("title")),
                    ("bullets", InputMapping::item("bullets")),
                ]),
                mutation: MutationId::CacheSectionRag,
                on_failure: OnFailure::Retry {
                    fallback: FailureFallback::Continue,
                },
            },
        })),
        else_branch: Some(Box::new(Step::Noop {
            id: StepId::new("ground_sections.skip"),
        })),
    });

    let research = Step::Worker(WorkerStep {
        id: StepId::new("research"),
        worker: "research".to_string(),
        input: InputMapping::object(vec![
            ("sections", InputMapping::state("outline.sections")),
            ("audience", InputMapping::state("audience")),
        ]),
        mutation: MutationId::StoreResearchFindings,
        on_failure: OnFailure::Retry {
            fallback: FailureFallback::Continue,
        },
    });

    let write_slides = Step::Foreach(ForeachStep {
        id: StepId::new("write_slides"),
        items_path: "outline.sections".to_string(),
        concurrency: 4,
        body: WorkerStep {
            id: StepId::new("write_slides.body"),
            worker: "write-slide".to_string(),
            input: InputMapping::object(vec![
                ("section", InputMapping::item("")),
                ("tone", InputMapping::state("tone")),
                ("research", InputMapping::state("research.findings")),
            ]),
            mutation: MutationId::UpsertSlide,
            on_failure: OnFailure::Fail,
        },
    });

    let design_slides = Step::Foreach(ForeachStep {
        id: StepId::new("design_slides"),
        items_path: "slides".to_string(),
        concurrency: 3,
        body: WorkerStep {
            id: StepId::new("design_slides.body"),
            worker: "design".to_string(),
            input: InputMapping::object(vec![("slide", InputMapping::item(""))]),
            mutation: MutationId::UpsertSlide,
            on_failure: OnFailure::Retry {
                fallback: FailureFallback::Continue,
            },
        },
    });

    let critique_slides = Step::Foreach(ForeachStep {
        id: StepId::new("critique_slides"),
        items_path: "slides".to_string(),
        concurrency: 4,
        body: WorkerStep {
            id: StepId::new("critique_slides.body"),
            worker: "critique".to_string(),
            input: InputMapping::object(vec![("slide", InputMapping::item(""))]),
            mutation: MutationId::MergeCriticFeedback,
            on_failure: OnFailure::Continue,
        },
    });

    let script = Step::Worker(WorkerStep {
        id: StepId::new("script"),
        worker: "script".to_string(),
        input: InputMapping::object(vec![
            ("slides", InputMapping::state("slides")),
            ("tone", InputMapping::state("tone")),
        ]),
        mutation: MutationId::StoreScript,
        on_failure: OnFailure::Continue,
    });

    let polish = Step::Worker(WorkerStep {
        id: StepId::new("polish"),
        worker: "polish-notes".to_string(),
        input: InputMapping::object(vec![
            ("slides", InputMapping::state("slides")),
            ("script", InputMapping::state("script")),
        ]),
        mutation: MutationId::StoreFinalResponse,
        on_failure: OnFailure::Continue,
    });

    WorkflowDefinition {
        name: "presentation".to_string(),
        version: "1".to_string(),
        steps: vec![
            clarify,
            outline,
            ground_sections,
            research,
            write_slides,
            design_slides,
            critique_slides,
            script,
            polish,
        ],
    }
}

fn validate_step<'a>(step: &'a Step, seen: &mut HashSet<&'a str>) -> WorkflowResult<()> {
    if !seen.insert(step.id().as_str()) {
        return Err(WorkflowError::Validation(format!(
            "duplicate step id: {}",
            step.id()
        )));
    }
    match step {
        Step::Foreach(f) => {
            if f.concurrency == 0 {
                return Err(WorkflowError::Validation(format!(
                    "foreach step {} has concurrency 0, minimum is 1",
                    f.id
                )));
            }
        }
        Step::Conditional(c) => {
            validate_step(&c.then_branch, seen)?;
            if let Some(else_branch) = &c.else_branch {
                validate_step(else_branch, seen)?;
            }
        }
        Step::Parallel { steps, .. } => {
            for child in steps {
                if !seen.insert(child.id.as_str()) {
                    return Err(WorkflowError::Validation(format!(
                        "duplicate step id: {}",
                        child.id
                    )));
                }
            }
        }
        Step::Worker(_) | Step::Noop { .. } => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn foreach_with_zero_concurrency_is_rejected() {
        let def = WorkflowDefinition {
            name: "t".into(),
            version: "1".into(),
            steps: vec![Step::Foreach(ForeachStep {
                id: StepId::new("fe"),
                items_path: "slides".into(),
                concurrency: 0,
                body: WorkerStep {
                    id: StepId::new("fe.body"),
                    worker: "critique".into(),
                    input: InputMapping::literal(json!(null)),
                    mutation: MutationId::MergeCriticFeedback,
                    on_failure: OnFailure::Fail,
                },
            })],
        };
        assert!(def.validate().is_err());
    }

    #[test]
    fn duplicate_step_ids_are_rejected() {
        let def = WorkflowDefinition {
            name: "t".into(),
            version: "1".into(),
            steps: vec![Step::Noop { id: StepId::new("a") }, Step::Noop { id: StepId::new("a") }],
        };
        assert!(def.validate().is_err());
    }
}
