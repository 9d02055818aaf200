//! `POST /api/stt/transcribe` (§4.8): streams the request body to a
//! capped temp file, runs the configured STT backend, and always cleans
//! up the temp file — success, backend failure, or cap overflow alike.

use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Json};
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::http::errors::ApiError;
use crate::state::AppState;

pub async fn transcribe(
    State(state): State<AppState>,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    let max_bytes = state.config.current().server.upload_max_bytes;
    let tmp = tempfile::NamedTempFile::new()
        .map_err(|e| ApiError(spaceduck_domain::error::Error::Io(e)))?;
    let result = stream_to_cap(&tmp, body, max_bytes).await;
    let outcome = match result {
        Ok(()) => {
            let config = state.config.current();
            state.transcriber.transcribe(tmp.path(), &config.stt).await
        }
        Err(e) => Err(e),
    };
    // `tmp` drops here regardless of outcome, deleting the backing file.
    match outcome {
        Ok(transcript) => Ok(Json(serde_json::json!({ "transcript": transcript }))),
        Err(e) => Err(ApiError(e)),
    }
}

async fn stream_to_cap(
    tmp: &tempfile::NamedTempFile,
    body: axum::body::Body,
    max_bytes: u64,
) -> spaceduck_domain::Result<()> {
    let mut file = tokio::fs::File::create(tmp.path()).await?;
    let mut stream = body.into_data_stream();
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk: Bytes = chunk.map_err(|e| spaceduck_domain::error::Error::Validation(e.to_string()))?;
        written += chunk.len() as u64;
        if written > max_bytes {
            return Err(spaceduck_domain::error::Error::Validation(format!(
                "upload exceeds the {max_bytes}-byte cap"
            )));
        }
        file.write_all(&chunk).await?;
    }
    Ok(())
}
