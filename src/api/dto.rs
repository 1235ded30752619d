//! Request/response shapes for the thin HTTP translator. These are
//! deliberately distinct from the domain types in `model`/`evidence` —
//! the wire format is allowed to drift from the internal representation
//! without forcing a breaking change on either side.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::evidence::{DocumentKind, IngestFile, RetrievalFilter, RetrievedChunk};
use crate::model::{HistoryTurn, WorkflowState};
use crate::workflow::Trace;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestKindDto {
    Image,
    #[default]
    Document,
    Other,
}

impl From<IngestKindDto> for DocumentKind {
    fn from(kind: IngestKindDto) -> Self {
        match kind {
            IngestKindDto::Image => DocumentKind::Image,
            IngestKindDto::Document => DocumentKind::Document,
            IngestKindDto::Other => DocumentKind::Other,
        }
    }
}

/// A file to ingest, carried as UTF-8 text rather than base64-encoded
/// bytes: every document the pipeline ingests (notes, transcripts,
/// research text) is text, and this keeps the request body plain JSON
/// with no binary transport layer to maintain.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestFileDto {
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub kind: IngestKindDto,
    #[serde(default)]
    pub url: Option<String>,
}

impl From<IngestFileDto> for IngestFile {
    fn from(dto: IngestFileDto) -> Self {
        IngestFile {
            name: dto.name,
            content: dto.content.into_bytes(),
            kind: dto.kind.into(),
            url: dto.url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PresentationRequest {
    #[serde(default)]
    pub presentation_id: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
    pub initial_input: Value,
    #[serde(default)]
    pub new_files: Vec<IngestFileDto>,
    #[serde(default)]
    pub assets: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct PresentationResponse {
    pub trace: Trace,
    pub state: WorkflowState,
    #[serde(rename = "final")]
    pub final_: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<super::error::ApiErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RetrievalFilterDto {
    #[serde(default)]
    pub document_kind: Option<IngestKindDto>,
}

impl From<RetrievalFilterDto> for RetrievalFilter {
    fn from(dto: RetrievalFilterDto) -> Self {
        RetrievalFilter {
            document_kind: dto.document_kind.map(Into::into),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RetrieveRequest {
    pub presentation_id: String,
    pub query: String,
    #[serde(default = "default_retrieve_limit")]
    pub limit: usize,
    #[serde(default)]
    pub filter: Option<RetrievalFilterDto>,
}

fn default_retrieve_limit() -> usize {
    8
}

#[derive(Debug, Serialize)]
pub struct RetrieveResponse {
    pub chunks: Vec<RetrievedChunk>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub workers: std::collections::HashMap<String, String>,
}
