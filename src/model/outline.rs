use serde::{Deserialize, Serialize};

use crate::ids::SectionId;

/// One section of the presentation outline. `id` is assigned once and
/// stable across reruns of the workflow for the same presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineSection {
    pub id: SectionId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub bullets: Vec<String>,
}

impl OutlineSection {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: SectionId::generate(),
            title: title.into(),
            description: None,
            bullets: Vec::new(),
        }
    }
}
