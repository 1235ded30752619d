use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::quality::QualityMetrics;
use crate::ids::{ChunkKey, SectionId, SlideId};

/// One authored slide. `id` is unique within a `WorkflowState`.
///
/// `section_id` records which outline section a slide was written
/// from, so the quality gate and citation-closure check can resolve a
/// slide's citation scope to that section's retrieved chunks rather
/// than the whole presentation's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slide {
    pub id: SlideId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_id: Option<SectionId>,
    pub title: String,
    #[serde(default)]
    pub content: Vec<String>,
    #[serde(rename = "speakerNotes", skip_serializing_if = "Option::is_none")]
    pub speaker_notes: Option<String>,
    #[serde(default)]
    pub citations: Vec<ChunkKey>,
    #[serde(default)]
    pub design: HashMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub quality_metrics: QualityMetrics,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Slide {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: SlideId::generate(),
            section_id: None,
            title: title.into(),
            content: Vec::new(),
            speaker_notes: None,
            citations: Vec::new(),
            design: HashMap::new(),
            image_prompt: None,
            image_url: None,
            quality_metrics: QualityMetrics::default(),
            metadata: HashMap::new(),
        }
    }
}
