use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use common::error::AppError;
use serde_json::json;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, TryFromMultipart)]
pub struct UploadParams {
    #[form_data(limit = "unlimited")]
    pub file: FieldData<NamedTempFile>,
}

/// Accepts a PDF upload, runs it through the ingestion pipeline and reports
/// the stored document id and chunk count.
pub async fn upload_document(
    State(state): State<ApiState>,
    TypedMultipart(input): TypedMultipart<UploadParams>,
) -> Result<impl IntoResponse, ApiError> {
    let file_name = input.file.metadata.file_name.clone();
    info!(
        file_name = file_name.as_deref().unwrap_or("-"),
        content_type = input.file.metadata.content_type.as_deref().unwrap_or("-"),
        "received document upload"
    );

    if !is_pdf_upload(&input.file) {
        warn!(
            file_name = file_name.as_deref().unwrap_or("-"),
            "rejected upload: unsupported file type"
        );
        return Err(ApiError::ValidationError(
            "Only PDF documents are supported".to_string(),
        ));
    }

    let bytes = tokio::fs::read(input.file.contents.path())
        .await
        .map_err(AppError::from)?;

    let outcome = state.ingestion.ingest_pdf(bytes).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "message": "Document processed and stored successfully",
            "document_id": outcome.document_id,
            "chunks_count": outcome.chunk_count
        })),
    ))
}

fn is_pdf_upload(file: &FieldData<NamedTempFile>) -> bool {
    if file.metadata.content_type.as_deref() == Some("application/pdf") {
        return true;
    }

    file.metadata
        .file_name
        .as_deref()
        .map(|name| {
            mime_guess::from_path(name)
                .iter()
                .any(|mime| mime == mime_guess::mime::APPLICATION_PDF)
        })
        .unwrap_or(false)
}
