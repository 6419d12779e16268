use std::sync::Arc;

use api_router::{api_routes_v1, api_state::ApiState};
use axum::Router;
use common::{
    storage::{db::SurrealDbClient, vector_store::{SurrealVectorStore, VectorStore}},
    utils::{config::get_config, embedding::EmbeddingProvider},
};
use ingestion_pipeline::{ChunkConfig, IngestionPipeline};
use retrieval_pipeline::{RetrievalConfig, RetrievalPipeline};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config
    let config = get_config()?;

    let db = Arc::new(
        SurrealDbClient::new(
            &config.surrealdb_address,
            &config.surrealdb_username,
            &config.surrealdb_password,
            &config.surrealdb_namespace,
            &config.surrealdb_database,
        )
        .await?,
    );

    // Create embedding provider based on config
    let embedding_provider = Arc::new(EmbeddingProvider::from_config(&config).await?);
    info!(
        embedding_backend = embedding_provider.backend_label(),
        embedding_dimension = embedding_provider.dimension(),
        embedding_model = embedding_provider.model_code().as_deref().unwrap_or("-"),
        "Embedding provider initialized"
    );
    if embedding_provider.dimension() != config.embedding_dimensions as usize {
        warn!(
            configured = config.embedding_dimensions,
            actual = embedding_provider.dimension(),
            "Configured embedding dimension differs from the backend's; using the backend's"
        );
    }

    // The collection must exist before the first upsert or search.
    let store = Arc::new(SurrealVectorStore::new(
        Arc::clone(&db),
        config.vector_collection.clone(),
        embedding_provider.dimension(),
    )?);
    store.ensure_collection().await?;

    let chunking = ChunkConfig {
        max_chars: config.chunk_max_chars,
        overlap: config.chunk_overlap,
    };
    let ingestion = Arc::new(IngestionPipeline::new(
        Arc::clone(&embedding_provider),
        Arc::clone(&store) as Arc<dyn VectorStore>,
        chunking,
    ));
    let retrieval = Arc::new(RetrievalPipeline::new(
        embedding_provider,
        store as Arc<dyn VectorStore>,
        RetrievalConfig::default(),
    ));

    let api_state = ApiState::new(config.clone(), db, ingestion, retrieval);

    // Create Axum router
    let app = Router::new()
        .nest("/api/v1", api_routes_v1(&api_state))
        .with_state(api_state);

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use common::utils::config::AppConfig;
    use tower::ServiceExt;
    use uuid::Uuid;

    const TEST_DIMENSIONS: usize = 32;

    fn test_config() -> AppConfig {
        AppConfig {
            surrealdb_address: "mem://".to_string(),
            surrealdb_username: "root".to_string(),
            surrealdb_password: "root".to_string(),
            surrealdb_namespace: "test_ns".to_string(),
            surrealdb_database: "test_db".to_string(),
            http_port: 0,
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            embedding_backend: "hashed".to_string(),
            embedding_model: None,
            embedding_dimensions: TEST_DIMENSIONS as u32,
            vector_collection: "test_chunks".to_string(),
            chunk_max_chars: 500,
            chunk_overlap: 100,
            ingest_max_body_bytes: 1024 * 1024,
        }
    }

    async fn test_state() -> ApiState {
        let database = Uuid::new_v4().to_string();
        let db = Arc::new(
            SurrealDbClient::memory("test_ns", &database)
                .await
                .expect("Failed to start in-memory surrealdb"),
        );

        let config = test_config();
        let embedding_provider =
            Arc::new(EmbeddingProvider::from_config(&config).await.expect("provider"));
        let store = Arc::new(
            SurrealVectorStore::new(
                Arc::clone(&db),
                config.vector_collection.clone(),
                embedding_provider.dimension(),
            )
            .expect("store config"),
        );
        store.ensure_collection().await.expect("collection bootstrap");

        let ingestion = Arc::new(IngestionPipeline::new(
            Arc::clone(&embedding_provider),
            Arc::clone(&store) as Arc<dyn VectorStore>,
            ChunkConfig {
                max_chars: config.chunk_max_chars,
                overlap: config.chunk_overlap,
            },
        ));
        let retrieval = Arc::new(RetrievalPipeline::new(
            embedding_provider,
            store as Arc<dyn VectorStore>,
            RetrievalConfig::default(),
        ));

        ApiState::new(config, db, ingestion, retrieval)
    }

    fn test_app(state: ApiState) -> Router {
        Router::new()
            .nest("/api/v1", api_routes_v1(&state))
            .with_state(state)
    }

    #[tokio::test]
    async fn probes_respond_ok() {
        let app = test_app(test_state().await);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);

        let ready_response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/ready")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("ready response");
        assert_eq!(ready_response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn empty_query_gets_a_400() {
        let app = test_app(test_state().await);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/query")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"query": "   "}"#))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn query_on_empty_collection_returns_empty_context() {
        let app = test_app(test_state().await);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/query")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"query": "anything"}"#))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(body["status"], "success");
        assert_eq!(body["context"], "");
    }

    #[tokio::test]
    async fn non_pdf_upload_gets_a_400() {
        let app = test_app(test_state().await);

        let boundary = "test-boundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"notes.txt\"\r\n\
             Content-Type: text/plain\r\n\r\n\
             hello\r\n\
             --{boundary}--\r\n"
        );

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/documents")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ingested_document_is_retrievable_via_query_route() {
        let state = test_state().await;

        let outcome = state
            .ingestion
            .ingest_text(
                "The quarterly report shows that the fennec fox enclosure \
                 needs a new heating system before winter.",
            )
            .await
            .expect("ingest");
        assert_eq!(outcome.chunk_count, 1);

        let app = test_app(state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/query")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"query": "fennec fox enclosure heating", "user_id": "tester"}"#,
                    ))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(body["status"], "success");
        let context = body["context"].as_str().expect("context string");
        assert!(context.contains("fennec fox enclosure"));
    }
}
