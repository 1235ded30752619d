//! The mutation registry: a closed, statically enumerated set of named
//! state-transition functions. An unknown mutation id is rejected when
//! the workflow definition is loaded, not when it runs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{WorkflowError, WorkflowResult};
use crate::ids::SectionId;
use crate::model::{OutlineSection, SectionRagContext, Slide, WorkflowState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationId {
    StoreClarifyResult,
    StoreOutlineResult,
    SetSlides,
    UpsertSlide,
    MergeCriticFeedback,
    CacheSectionRag,
    StoreQualitySummary,
    StoreScript,
    StoreResearchFindings,
    StoreIngestSummary,
    StoreFinalResponse,
}

impl MutationId {
    /// Applies this mutation to a clone of `state`, bumping `version`.
    /// `result` is the worker's JSON result (or, for steps with no
    /// worker, an arbitrary payload produced upstream); `item` is the
    /// current `foreach` item, if any.
    pub fn apply(
        self,
        state: &WorkflowState,
        result: &Value,
        item: Option<&Value>,
    ) -> WorkflowResult<WorkflowState> {
        let mut next = state.clone();
        match self {
            MutationId::StoreClarifyResult => {
                next.clarify.response = result
                    .get("response")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                next.clarify.finished = result
                    .get("finished")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if let Some(telemetry) = result.get("telemetry").and_then(Value::as_object) {
                    next.clarify.telemetry = telemetry.clone().into_iter().collect();
                }
            }
            MutationId::StoreOutlineResult => {
                let sections = result
                    .get("sections")
                    .and_then(Value::as_array)
                    .ok_or_else(|| {
                        WorkflowError::Validation("outline result missing sections".into())
                    })?;
                // Stable ids: reuse an existing section's id when the
                // title matches a prior rerun, per the id-stability
                // invariant; otherwise assign a fresh one.
                let mut next_sections = Vec::with_capacity(sections.len());
                for (idx, raw) in sections.iter().enumerate() {
                    let title = raw
                        .get("title")
                        .and_then(Value::as_str)
                        .unwrap_or("Untitled")
                        .to_string();
                    let existing = state.outline.sections.get(idx).filter(|s| s.title == title);
                    let id = existing
                        .map(|s| s.id.clone())
                        .unwrap_or_else(SectionId::generate);
                    let bullets = raw
                        .get("bullets")
                        .and_then(Value::as_array)
                        .map(|arr| {
                            arr.iter()
                                .filter_map(Value::as_str)
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default();
                    next_sections.push(OutlineSection {
                        id,
                        title,
                        description: raw
                            .get("description")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        bullets,
                    });
                }
                next.outline.sections = next_sections;
                if let Some(raw) = result.get("raw").and_then(Value::as_object) {
                    next.outline.raw = raw.clone().into_iter().collect();
                }
            }
            MutationId::SetSlides => {
                let slides = result.get("slides").and_then(Value::as_array).ok_or_else(|| {
                    WorkflowError::Validation("set_slides result missing slides".into())
                })?;
                next.slides = slides
                    .iter()
                    .map(|raw| serde_json::from_value(raw.clone()))
                    .collect::<Result<Vec<Slide>, _>>()
                    .map_err(|e| WorkflowError::Validation(format!("invalid slide: {e}")))?;
            }
            MutationId::UpsertSlide => {
                let slide: Slide = serde_json::from_value(result.clone())
                    .map_err(|e| WorkflowError::Validation(format!("invalid slide: {e}")))?;
                match next.slides.iter_mut().find(|s| s.id == slide.id) {
                    Some(existing) => *existing = slide,
                    None => next.slides.push(slide),
                }
            }
            MutationId::MergeCriticFeedback => {
                let slide_id = result
                    .get("slide_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        WorkflowError::Validation("critic feedback missing slide_id".into())
                    })?;
                if let Some(slide) = next.slides.iter_mut().find(|s| s.id.as_str() == slide_id) {
                    if let Some(issues) = result.get("issues_found").and_then(Value::as_array) {
                        slide
                            .quality_metrics
                            .issues_found
                            .extend(issues.iter().filter_map(Value::as_str).map(str::to_string));
                    }
                    if let Some(fixes) = result.get("fixes_applied").and_then(Value::as_array) {
                        slide
                            .quality_metrics
                            .fixes_applied
                            .extend(fixes.iter().filter_map(Value::as_str).map(str::to_string));
                    }
                }
            }
            MutationId::CacheSectionRag => {
                let section_id = item
                    .and_then(|i| i.get("id"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        WorkflowError::Internal("cache_section_rag requires a section item".into())
                    })?;
                let title = item
                    .and_then(|i| i.get("title"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let chunks = result
                    .get("chunks")
                    .cloned()
                    .map(|v| serde_json::from_value(v))
                    .transpose()
                    .map_err(|e| WorkflowError::Validation(format!("invalid rag chunks: {e}")))?
                    .unwrap_or_default();
                next.rag.sections.insert(
                    SectionId::new(section_id),
                    SectionRagContext { title, chunks },
                );
            }
            MutationId::StoreQualitySummary => {
                next.quality_state = serde_json::from_value(result.clone())
                    .map_err(|e| WorkflowError::Validation(format!("invalid quality summary: {e}")))?;
            }
            MutationId::StoreScript => {
                next.script = result.get("script").and_then(Value::as_str).map(str::to_string);
            }
            MutationId::StoreResearchFindings => {
                next.research.findings = result
                    .get("findings")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
            }
            MutationId::StoreIngestSummary => {
                if let Some(obj) = result.as_object() {
                    next.ingest_summary = obj.clone().into_iter().collect();
                }
            }
            MutationId::StoreFinalResponse => {
                next.final_response = Some(result.clone());
            }
        }
        next.version = state.version + 1;
        Ok(next)
    }
}
