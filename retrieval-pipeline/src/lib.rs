#![allow(clippy::missing_docs_in_private_items)]

use std::sync::Arc;

use tracing::{error, info, instrument};

use common::{
    error::AppError,
    storage::vector_store::VectorStore,
    utils::embedding::EmbeddingProvider,
};

/// Number of nearest chunks fetched per query.
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone, Copy)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// Answers a free-text query with the most relevant stored chunks,
/// reassembled in their original document order.
///
/// The contract is total for valid input: after the query passes
/// validation, dependency failures degrade to an empty context rather than
/// surfacing to the caller. Only [`AppError::Validation`] is ever returned.
pub struct RetrievalPipeline {
    embedder: Arc<EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    config: RetrievalConfig,
}

impl RetrievalPipeline {
    pub fn new(
        embedder: Arc<EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            config,
        }
    }

    #[instrument(skip_all)]
    pub async fn retrieve(&self, query: &str) -> Result<String, AppError> {
        if query.trim().is_empty() {
            return Err(AppError::Validation("query cannot be empty".into()));
        }

        let preview: String = query.chars().take(100).collect();
        info!(
            query_chars = query.chars().count(),
            preview = %preview.replace('\n', " "),
            "starting retrieval"
        );

        match self.assemble_context(query).await {
            Ok(context) => {
                info!(context_chars = context.chars().count(), "retrieval finished");
                Ok(context)
            }
            Err(err) => {
                error!(error = %err, "retrieval failed; returning empty context");
                Ok(String::new())
            }
        }
    }

    async fn assemble_context(&self, query: &str) -> Result<String, AppError> {
        let vectors = self.embedder.embed_batch(&[query.to_string()]).await?;
        let query_vector = vectors.into_iter().next().ok_or_else(|| {
            AppError::Processing("embedding provider returned no vector for the query".into())
        })?;

        let mut hits = self.store.search(query_vector, self.config.top_k).await?;
        if hits.is_empty() {
            return Ok(String::new());
        }

        // Reassemble in document order. This sorts only within the top-K
        // set; matches from several documents may interleave.
        hits.sort_by_key(|hit| hit.record.chunk_index);

        let context = hits
            .iter()
            .map(|hit| hit.record.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(context.trim_end().to_string())
    }
}
