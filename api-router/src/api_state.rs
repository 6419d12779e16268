use std::sync::Arc;

use common::{storage::db::SurrealDbClient, utils::config::AppConfig};
use ingestion_pipeline::IngestionPipeline;
use retrieval_pipeline::RetrievalPipeline;

/// Shared state for the API routes. The pipelines are constructed once at
/// startup and reused by every request.
#[derive(Clone)]
pub struct ApiState {
    pub config: AppConfig,
    pub db: Arc<SurrealDbClient>,
    pub ingestion: Arc<IngestionPipeline>,
    pub retrieval: Arc<RetrievalPipeline>,
}

impl ApiState {
    pub fn new(
        config: AppConfig,
        db: Arc<SurrealDbClient>,
        ingestion: Arc<IngestionPipeline>,
        retrieval: Arc<RetrievalPipeline>,
    ) -> Self {
        Self {
            config,
            db,
            ingestion,
            retrieval,
        }
    }
}
