use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{WorkflowError, WorkflowResult};
use crate::evidence::index::{cosine_similarity, text_score};
use crate::evidence::ingest::{chunk_text, content_hash};
use crate::evidence::{
    sanitize_name, Chunk, Document, DocumentKind, Embedder, EvidenceStore, IngestFile, IngestSummary,
    RetrievalFilter, RetrievedChunk,
};
use crate::ids::{ChunkKey, DocKey, PresentationId};

/// `sled`-backed graph-RAG store: one tree for documents, one for
/// chunks, keyed so that every lookup is scoped to a `presentation_id`.
pub struct SledEvidenceStore {
    documents: sled::Tree,
    chunks: sled::Tree,
    embedder: Option<Arc<dyn Embedder>>,
}

impl SledEvidenceStore {
    pub fn open(db: &sled::Db, embedder: Option<Arc<dyn Embedder>>) -> WorkflowResult<Self> {
        let documents = db
            .open_tree("evidence_documents")
            .map_err(|err| WorkflowError::Internal(format!("failed to open documents tree: {err}")))?;
        let chunks = db
            .open_tree("evidence_chunks")
            .map_err(|err| WorkflowError::Internal(format!("failed to open chunks tree: {err}")))?;
        Ok(Self { documents, chunks, embedder })
    }

    fn document_key(presentation_id: &PresentationId, doc_key: &DocKey) -> String {
        format!("{}/{}", presentation_id.as_str(), doc_key.as_str())
    }

    fn chunk_key(presentation_id: &PresentationId, chunk_key: &ChunkKey) -> String {
        format!("{}/{}", presentation_id.as_str(), chunk_key.as_str())
    }

    fn find_document_by_name(
        &self,
        presentation_id: &PresentationId,
        name: &str,
    ) -> WorkflowResult<Option<Document>> {
        let prefix = format!("{}/", presentation_id.as_str());
        for entry in self.documents.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = entry.map_err(|err| WorkflowError::Internal(err.to_string()))?;
            let doc: Document = serde_json::from_slice(&bytes)
                .map_err(|err| WorkflowError::Internal(format!("corrupt document record: {err}")))?;
            if doc.name == name {
                return Ok(Some(doc));
            }
        }
        Ok(None)
    }

    fn put_document(&self, document: &Document) -> WorkflowResult<()> {
        let key = Self::document_key(&document.presentation_id, &document.key);
        let encoded = serde_json::to_vec(document)
            .map_err(|err| WorkflowError::Internal(format!("document encode failed: {err}")))?;
        self.documents
            .insert(key, encoded)
            .map_err(|err| WorkflowError::Internal(format!("document write failed: {err}")))?;
        Ok(())
    }

    fn put_chunk(&self, chunk: &Chunk) -> WorkflowResult<()> {
        let key = Self::chunk_key(&chunk.presentation_id, &chunk.key);
        let encoded = serde_json::to_vec(chunk)
            .map_err(|err| WorkflowError::Internal(format!("chunk encode failed: {err}")))?;
        self.chunks
            .insert(key, encoded)
            .map_err(|err| WorkflowError::Internal(format!("chunk write failed: {err}")))?;
        Ok(())
    }

    fn chunks_for_presentation(&self, presentation_id: &PresentationId) -> WorkflowResult<Vec<Chunk>> {
        let prefix = format!("{}/", presentation_id.as_str());
        let mut chunks = Vec::new();
        for entry in self.chunks.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = entry.map_err(|err| WorkflowError::Internal(err.to_string()))?;
            let chunk: Chunk = serde_json::from_slice(&bytes)
                .map_err(|err| WorkflowError::Internal(format!("corrupt chunk record: {err}")))?;
            chunks.push(chunk);
        }
        Ok(chunks)
    }

    fn document_exists(&self, presentation_id: &PresentationId, doc_key: &DocKey) -> WorkflowResult<bool> {
        let key = Self::document_key(presentation_id, doc_key);
        self.documents
            .contains_key(key)
            .map_err(|err| WorkflowError::Internal(err.to_string()))
    }
}

#[async_trait]
impl EvidenceStore for SledEvidenceStore {
    async fn ingest(&self, presentation_id: &PresentationId, files: Vec<IngestFile>) -> WorkflowResult<IngestSummary> {
        let mut doc_count = 0u64;
        let mut chunk_count = 0u64;

        for file in files {
            let name = sanitize_name(&file.name);
            let hash = content_hash(&file.content);

            let doc_key = match self.find_document_by_name(presentation_id, &name)? {
                Some(existing) if existing.content_hash == hash => existing.key,
                Some(existing) => existing.key,
                None => DocKey::generate(),
            };

            let document = Document {
                key: doc_key.clone(),
                presentation_id: presentation_id.clone(),
                name: name.clone(),
                url: file.url.clone(),
                kind: file.kind,
                content_hash: hash,
            };
            self.put_document(&document)?;
            doc_count += 1;

            let text = String::from_utf8_lossy(&file.content).to_string();
            for (index, piece) in chunk_text(&text).into_iter().enumerate() {
                let chunk_key = ChunkKey::new(format!("{}:{}", doc_key.as_str(), index));
                let embedding = self.embedder.as_ref().map(|embedder| embedder.embed(&piece));
                let chunk = Chunk {
                    key: chunk_key,
                    doc_key: doc_key.clone(),
                    presentation_id: presentation_id.clone(),
                    name: name.clone(),
                    text: piece,
                    url: file.url.clone(),
                    embedding,
                };
                self.put_chunk(&chunk)?;
                chunk_count += 1;
            }
        }

        Ok(IngestSummary { doc_count, chunk_count })
    }

    async fn retrieve(
        &self,
        presentation_id: &PresentationId,
        query: &str,
        limit: usize,
        filter: RetrievalFilter,
    ) -> WorkflowResult<Vec<RetrievedChunk>> {
        let chunks = self.chunks_for_presentation(presentation_id)?;

        let mut scored: Vec<(f64, Chunk)> = Vec::new();
        for chunk in chunks {
            if !self.document_exists(presentation_id, &chunk.doc_key)? {
                continue;
            }
            if let Some(kind) = filter.document_kind {
                let owning_doc = Self::document_key(presentation_id, &chunk.doc_key);
                let Some(bytes) = self
                    .documents
                    .get(owning_doc)
                    .map_err(|err| WorkflowError::Internal(err.to_string()))?
                else {
                    continue;
                };
                let doc: Document = serde_json::from_slice(&bytes)
                    .map_err(|err| WorkflowError::Internal(format!("corrupt document record: {err}")))?;
                if doc.kind != kind {
                    continue;
                }
            }

            let score = match (&self.embedder, &chunk.embedding) {
                (Some(embedder), Some(embedding)) => cosine_similarity(&embedder.embed(query), embedding),
                _ => text_score(query, &chunk.name, &chunk.text),
            };
            scored.push((score, chunk));
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(score, chunk)| RetrievedChunk {
                chunk_key: chunk.key,
                name: chunk.name,
                text: chunk.text,
                url: chunk.url,
                score,
            })
            .collect())
    }
}
