use common::error::AppError;

/// Extracts the text layer from a PDF byte stream.
///
/// This is a thin adapter over the extraction backend; it yields the
/// whitespace-trimmed text, which may be empty for image-only documents.
/// Callers decide whether an empty result is an error.
pub async fn extract_text_from_pdf(bytes: Vec<u8>) -> Result<String, AppError> {
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await?
        .map_err(|err| AppError::Processing(format!("PDF text extraction failed: {err}")))?;

    Ok(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_non_pdf_bytes() {
        let result = extract_text_from_pdf(b"plain text, not a pdf".to_vec()).await;
        assert!(matches!(result, Err(AppError::Processing(_))));
    }
}
