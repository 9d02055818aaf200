//! `GET /api/conversations`, `POST /api/upload` (§4.8).

use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Json};
use spaceduck_store::ConversationRepository;

use crate::http::errors::ApiError;
use crate::state::AppState;

pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let conversations = state.store.list_conversations().await?;
    Ok(Json(conversations))
}

pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let max_bytes = state.config.current().server.upload_max_bytes;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError(spaceduck_domain::error::Error::Validation(e.to_string())))?
    {
        let filename = field.file_name().unwrap_or("upload.bin").to_string();
        let mime = field.content_type().unwrap_or("application/octet-stream").to_string();
        let bytes: Bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError(spaceduck_domain::error::Error::Validation(e.to_string())))?;
        if bytes.len() as u64 > max_bytes {
            return Err(ApiError(spaceduck_domain::error::Error::Validation(format!(
                "upload of {} bytes exceeds the {max_bytes}-byte cap",
                bytes.len()
            ))));
        }
        let entry = state.attachments.save(&filename, &mime, &bytes).await?;
        return Ok(Json(entry.as_ref()));
    }
    Err(ApiError(spaceduck_domain::error::Error::Validation("no file field in multipart body".into())))
}
