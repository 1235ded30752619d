//! Graph-RAG evidence store: ingests documents/images into searchable
//! chunks and serves per-query retrieval, scoped to a `presentation_id`.

mod index;
mod ingest;
mod sled_store;

pub use index::cosine_similarity;
pub use sled_store::SledEvidenceStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WorkflowResult;
use crate::ids::{ChunkKey, DocKey, PresentationId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Image,
    Document,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub key: DocKey,
    pub presentation_id: PresentationId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub kind: DocumentKind,
    /// Hash of the ingested content, used to make re-ingestion idempotent.
    pub content_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub key: ChunkKey,
    pub doc_key: DocKey,
    pub presentation_id: PresentationId,
    pub name: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk_key: ChunkKey,
    pub name: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RetrievalFilter {
    pub document_kind: Option<DocumentKind>,
}

#[derive(Debug, Clone)]
pub struct IngestFile {
    pub name: String,
    pub content: Vec<u8>,
    pub kind: DocumentKind,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct IngestSummary {
    pub doc_count: u64,
    pub chunk_count: u64,
}

/// Sanitizes a user-supplied file name: characters outside
/// `[A-Za-z0-9._-]` become `_`, capped at 255 characters.
pub fn sanitize_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    sanitized.chars().take(255).collect()
}

/// Optional embedder. When configured, retrieval ranks by cosine
/// similarity instead of the full-text fallback.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Vec<f32>;
}

#[async_trait]
pub trait EvidenceStore: Send + Sync {
    async fn ingest(&self, presentation_id: &PresentationId, files: Vec<IngestFile>) -> WorkflowResult<IngestSummary>;

    async fn retrieve(
        &self,
        presentation_id: &PresentationId,
        query: &str,
        limit: usize,
        filter: RetrievalFilter,
    ) -> WorkflowResult<Vec<RetrievedChunk>>;
}
