use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ids::{ChunkKey, SectionId};

/// A chunk of evidence as returned from a retrieval call, carrying the
/// query-time relevance score. Distinct from the `Chunk` entity stored
/// in the evidence store, which has no score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagChunk {
    #[serde(rename = "chunkKey")]
    pub chunk_key: ChunkKey,
    pub name: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub score: f64,
}

/// Retrieved evidence scoped to one outline section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionRagContext {
    pub title: String,
    #[serde(default)]
    pub chunks: Vec<RagChunk>,
}

/// Presentation-wide retrieval state: a seed set of chunks plus one
/// retrieval context per outline section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PresentationRagState {
    #[serde(default)]
    pub presentation: Vec<RagChunk>,
    #[serde(default)]
    pub sections: HashMap<SectionId, SectionRagContext>,
}

impl PresentationRagState {
    /// All chunk keys visible to citation validation: the presentation-wide
    /// seed set plus every section's retrieved chunks.
    pub fn known_chunk_keys(&self) -> std::collections::HashSet<&ChunkKey> {
        let mut keys: std::collections::HashSet<&ChunkKey> =
            self.presentation.iter().map(|c| &c.chunk_key).collect();
        for section in self.sections.values() {
            keys.extend(section.chunks.iter().map(|c| &c.chunk_key));
        }
        keys
    }

    /// Chunk keys visible to a specific slide's citations: the
    /// presentation-wide seed set plus that slide's own section context.
    pub fn known_chunk_keys_for_section(
        &self,
        section_id: &SectionId,
    ) -> std::collections::HashSet<&ChunkKey> {
        let mut keys: std::collections::HashSet<&ChunkKey> =
            self.presentation.iter().map(|c| &c.chunk_key).collect();
        if let Some(section) = self.sections.get(section_id) {
            keys.extend(section.chunks.iter().map(|c| &c.chunk_key));
        }
        keys
    }
}
