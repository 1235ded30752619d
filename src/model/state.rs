use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::outline::OutlineSection;
use super::quality::WorkflowQualityState;
use super::rag::PresentationRagState;
use super::slide::Slide;
use crate::ids::PresentationId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClarifyState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub telemetry: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutlineState {
    #[serde(default)]
    pub sections: Vec<OutlineSection>,
    #[serde(default)]
    pub raw: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchState {
    #[serde(default)]
    pub findings: Vec<serde_json::Value>,
}

/// The durable object that threads through every workflow step.
///
/// `version` monotonically increases on every successful mutation
/// (testable property: state monotonicity). A failed step never bumps
/// it; the state store enforces this by only persisting the post-step
/// value on success (see `crate::state_store`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    #[serde(rename = "presentationId")]
    pub presentation_id: PresentationId,
    pub version: u64,

    #[serde(default)]
    pub history: Vec<HistoryTurn>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<String>,

    #[serde(default)]
    pub clarify: ClarifyState,
    #[serde(default)]
    pub outline: OutlineState,
    #[serde(default)]
    pub slides: Vec<Slide>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default)]
    pub rag: PresentationRagState,
    #[serde(default)]
    pub research: ResearchState,
    #[serde(default)]
    pub ingest_summary: HashMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_response: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub quality_state: WorkflowQualityState,
}

impl WorkflowState {
    pub fn new(presentation_id: PresentationId) -> Self {
        Self {
            presentation_id,
            version: 0,
            history: Vec::new(),
            audience: None,
            tone: None,
            length: None,
            clarify: ClarifyState::default(),
            outline: OutlineState::default(),
            slides: Vec::new(),
            script: None,
            rag: PresentationRagState::default(),
            research: ResearchState::default(),
            ingest_summary: HashMap::new(),
            final_response: None,
            metadata: HashMap::new(),
            quality_state: WorkflowQualityState::default(),
        }
    }

    /// Checks the slide↔citation closure invariant: every slide's
    /// citations resolve to a chunk known to the presentation or to
    /// that slide's own section.
    pub fn citations_are_closed(&self) -> bool {
        self.slides.iter().all(|slide| {
            let known = match &slide.section_id {
                Some(section_id) => self.rag.known_chunk_keys_for_section(section_id),
                None => self.rag.known_chunk_keys(),
            };
            slide.citations.iter().all(|c| known.contains(c))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_has_no_citations_to_violate() {
        let state = WorkflowState::new(PresentationId::new("p1"));
        assert!(state.citations_are_closed());
        assert_eq!(state.version, 0);
    }
}
