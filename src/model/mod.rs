//! The durable `WorkflowState` object and the record types that thread
//! through every workflow step.

mod outline;
mod quality;
mod rag;
mod slide;
mod state;

pub use outline::OutlineSection;
pub use quality::{QualityLevel, QualityMetrics, WorkflowQualityState};
pub use rag::{RagChunk, SectionRagContext};
pub use slide::Slide;
pub use state::{ClarifyState, HistoryTurn, OutlineState, ResearchState, WorkflowState};
