use std::{fmt, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize,
};
use surrealdb::sql::Thing;
use tracing::debug;
use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient};

/// Width of the HNSW candidate list used during search.
const EF_SEARCH: usize = 40;

/// One stored vector plus its payload: the durable record of a single chunk.
///
/// `chunk_index` is 0-based and contiguous within a document; it is the only
/// record of original chunk order and drives reassembly at retrieval time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    #[serde(deserialize_with = "deserialize_record_id")]
    pub id: String,
    #[serde(
        serialize_with = "serialize_datetime",
        deserialize_with = "deserialize_datetime",
        default
    )]
    pub created_at: DateTime<Utc>,
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

impl EmbeddingRecord {
    pub fn new(document_id: String, chunk_index: usize, text: String, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            document_id,
            chunk_index,
            text,
            embedding,
        }
    }
}

/// A search hit: the stored record and its cosine distance to the query
/// vector (smaller is more similar).
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub record: EmbeddingRecord,
    pub distance: f32,
}

/// Storage capability consumed by both pipelines. One implementation per
/// backing database; swap in another implementation to change engines
/// without touching pipeline code. `ensure_collection` must have completed
/// once before the first `upsert` or `search`.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Creates the collection and its vector index if absent. Idempotent.
    async fn ensure_collection(&self) -> Result<(), AppError>;

    /// Stores one record per `(vector, text)` pair, tagged with
    /// `document_id` and its position in the batch. Returns the generated
    /// point ids. An empty batch performs no writes.
    async fn upsert(
        &self,
        document_id: &str,
        vectors: Vec<Vec<f32>>,
        chunk_texts: Vec<String>,
    ) -> Result<Vec<String>, AppError>;

    /// Returns up to `top_k` records nearest to `query_vector` under cosine
    /// distance, most similar first. Tie order is store-defined.
    async fn search(&self, query_vector: Vec<f32>, top_k: usize)
        -> Result<Vec<ScoredChunk>, AppError>;
}

/// SurrealDB-backed [`VectorStore`]: one SCHEMALESS table per collection
/// with an HNSW cosine index over the `embedding` field.
pub struct SurrealVectorStore {
    db: Arc<SurrealDbClient>,
    collection: String,
    dimensions: usize,
}

impl SurrealVectorStore {
    pub fn new(
        db: Arc<SurrealDbClient>,
        collection: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self, AppError> {
        let collection = collection.into();
        if !is_valid_collection_name(&collection) {
            return Err(AppError::Config(format!(
                "invalid collection name '{collection}': expected [A-Za-z_][A-Za-z0-9_]*"
            )));
        }
        if dimensions == 0 {
            return Err(AppError::Config(
                "vector dimensionality must be greater than zero".into(),
            ));
        }

        Ok(Self {
            db,
            collection,
            dimensions,
        })
    }

    fn check_dimension(&self, vector: &[f32], what: &str) -> Result<(), AppError> {
        if vector.len() != self.dimensions {
            return Err(AppError::Validation(format!(
                "{what} has dimension {} but collection '{}' is configured for {}",
                vector.len(),
                self.collection,
                self.dimensions
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for SurrealVectorStore {
    async fn ensure_collection(&self) -> Result<(), AppError> {
        let ddl = format!(
            "DEFINE TABLE IF NOT EXISTS {table} SCHEMALESS;
             DEFINE INDEX IF NOT EXISTS idx_embedding_{table} ON TABLE {table} FIELDS embedding HNSW DIMENSION {dim} DIST COSINE;",
            table = self.collection,
            dim = self.dimensions,
        );
        self.db.query(ddl).await?.check()?;

        debug!(
            collection = %self.collection,
            dimensions = self.dimensions,
            "vector collection ready"
        );
        Ok(())
    }

    async fn upsert(
        &self,
        document_id: &str,
        vectors: Vec<Vec<f32>>,
        chunk_texts: Vec<String>,
    ) -> Result<Vec<String>, AppError> {
        if vectors.len() != chunk_texts.len() {
            return Err(AppError::Validation(format!(
                "got {} vectors for {} chunk texts",
                vectors.len(),
                chunk_texts.len()
            )));
        }
        if vectors.is_empty() {
            return Ok(Vec::new());
        }
        for (index, vector) in vectors.iter().enumerate() {
            self.check_dimension(vector, &format!("embedding for chunk {index}"))?;
        }

        let records: Vec<EmbeddingRecord> = vectors
            .into_iter()
            .zip(chunk_texts)
            .enumerate()
            .map(|(chunk_index, (embedding, text))| {
                EmbeddingRecord::new(document_id.to_string(), chunk_index, text, embedding)
            })
            .collect();
        let point_ids: Vec<String> = records.iter().map(|record| record.id.clone()).collect();

        // Single batch insert: the whole document's points land together.
        let _stored: Vec<EmbeddingRecord> = self
            .db
            .insert(self.collection.as_str())
            .content(records)
            .await?;

        debug!(
            %document_id,
            points = point_ids.len(),
            collection = %self.collection,
            "stored embedding records"
        );
        Ok(point_ids)
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, AppError> {
        self.check_dimension(&query_vector, "query vector")?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query = format!(
            "SELECT *, vector::distance::knn() AS distance FROM {table} WHERE embedding <|{top_k},{ef}|> $embedding ORDER BY distance",
            table = self.collection,
            ef = EF_SEARCH.max(top_k),
        );
        let rows: Vec<ScoredRow> = self
            .db
            .query(query)
            .bind(("embedding", query_vector))
            .await?
            .take(0)?;

        Ok(rows.into_iter().map(ScoredChunk::from).collect())
    }
}

#[derive(Debug, Deserialize)]
struct ScoredRow {
    #[serde(deserialize_with = "deserialize_record_id")]
    id: String,
    #[serde(deserialize_with = "deserialize_datetime", default)]
    created_at: DateTime<Utc>,
    document_id: String,
    chunk_index: usize,
    text: String,
    embedding: Vec<f32>,
    distance: f32,
}

impl From<ScoredRow> for ScoredChunk {
    fn from(row: ScoredRow) -> Self {
        ScoredChunk {
            record: EmbeddingRecord {
                id: row.id,
                created_at: row.created_at,
                document_id: row.document_id,
                chunk_index: row.chunk_index,
                text: row.text,
                embedding: row.embedding,
            },
            distance: row.distance,
        }
    }
}

fn is_valid_collection_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// SurrealDB returns record ids as `Thing` values while we address records
/// by their raw string id everywhere else; accept both shapes.
fn deserialize_record_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct RecordIdVisitor;

    impl<'de> Visitor<'de> for RecordIdVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or a record id")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value)
        }

        fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
        where
            A: de::MapAccess<'de>,
        {
            let thing = Thing::deserialize(de::value::MapAccessDeserializer::new(map))?;
            Ok(thing.id.to_raw())
        }
    }

    deserializer.deserialize_any(RecordIdVisitor)
}

fn serialize_datetime<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    Into::<surrealdb::sql::Datetime>::into(*date).serialize(serializer)
}

fn deserialize_datetime<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let dt = surrealdb::sql::Datetime::deserialize(deserializer)?;
    Ok(DateTime::<Utc>::from(dt))
}
