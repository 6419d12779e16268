use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use common::{
    error::AppError,
    storage::vector_store::VectorStore,
    utils::embedding::EmbeddingProvider,
};

use crate::{
    chunker::{chunk_text, ChunkConfig},
    extract::extract_text_from_pdf,
};

/// What a successful ingestion run produced.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub document_id: String,
    pub chunk_count: usize,
}

/// Orchestrates chunking, embedding and storage for one document per call.
///
/// Runs are independent end to end; the only shared state is the injected
/// provider and store, both safe for concurrent callers. Chunk order is
/// carried through to storage as each record's `chunk_index`.
pub struct IngestionPipeline {
    embedder: Arc<EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    chunking: ChunkConfig,
}

impl IngestionPipeline {
    pub fn new(
        embedder: Arc<EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        chunking: ChunkConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            chunking,
        }
    }

    /// Ingests a PDF document from its raw bytes.
    pub async fn ingest_pdf(&self, bytes: Vec<u8>) -> Result<IngestOutcome, AppError> {
        let text = extract_text_from_pdf(bytes).await?;
        self.ingest_text(&text).await
    }

    /// Ingests already-extracted text: mints a document id, chunks, embeds
    /// the chunks in one batch and stores them.
    ///
    /// The stages are not transactional. A failure after embedding leaves
    /// nothing usable behind under the new document id and is surfaced to
    /// the caller; retrying ingests the document again under a fresh id.
    #[instrument(skip_all, fields(document_id))]
    pub async fn ingest_text(&self, text: &str) -> Result<IngestOutcome, AppError> {
        if text.trim().is_empty() {
            return Err(AppError::Validation(
                "no extractable content in document".into(),
            ));
        }

        let document_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("document_id", document_id.as_str());

        let chunks = chunk_text(text, &self.chunking)?;
        if chunks.is_empty() {
            return Ok(IngestOutcome {
                document_id,
                chunk_count: 0,
            });
        }

        let vectors = self.embedder.embed_batch(&chunks).await?;
        let chunk_count = chunks.len();
        let point_ids = self.store.upsert(&document_id, vectors, chunks).await?;

        info!(chunk_count, points = point_ids.len(), "document ingested");

        Ok(IngestOutcome {
            document_id,
            chunk_count,
        })
    }
}
