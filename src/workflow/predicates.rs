//! Named predicates for `conditional` steps: a closed set, each a pure
//! function of `WorkflowState`.

use serde::{Deserialize, Serialize};

use crate::model::WorkflowState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateId {
    ClarifyFinished,
    HasOutlineSections,
    HasIngestedFiles,
    QualityGateBlocked,
}

impl PredicateId {
    pub fn evaluate(self, state: &WorkflowState) -> bool {
        match self {
            PredicateId::ClarifyFinished => state.clarify.finished,
            PredicateId::HasOutlineSections => !state.outline.sections.is_empty(),
            PredicateId::HasIngestedFiles => !state.ingest_summary.is_empty(),
            PredicateId::QualityGateBlocked => state.quality_state.manual_review_required,
        }
    }
}
