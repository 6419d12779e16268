use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    /// Accepted for future scoping; retrieval is not filtered by it.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Answers a free-text query with the reassembled context for it. An empty
/// context is a valid outcome, not an error.
pub async fn process_query(
    State(state): State<ApiState>,
    Json(input): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!(
        query_chars = input.query.chars().count(),
        user_id = input.user_id.as_deref().unwrap_or("-"),
        "received query"
    );

    let context = state.retrieval.retrieve(&input.query).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "message": "Query processed successfully",
            "context": context
        })),
    ))
}
