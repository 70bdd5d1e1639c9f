//! Transcription endpoint

use axum::extract::{Multipart, State};
use axum::Json;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, serde::Serialize)]
pub struct TranscriptionResponse {
    pub text: String,
}

/// `POST /v1/audio/transcriptions`
///
/// Accepts a multipart form with a `file` field holding the audio in any
/// container the native decoder understands, and responds with the
/// transcribed text.
pub async fn transcribe(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<TranscriptionResponse>, ApiError> {
    let audio = read_audio_field(&mut multipart).await?;

    info!(bytes = audio.len(), "transcription request");
    let text = state.transcribe(audio).await?;
    Ok(Json(TranscriptionResponse { text }))
}

/// Pull the audio payload out of a multipart form.
///
/// Requests without a `file` field, or with an empty one, are rejected
/// before any state is touched.
pub async fn read_audio_field(multipart: &mut Multipart) -> Result<Vec<u8>, ApiError> {
    let mut audio: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart payload: {e}")))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("failed reading `file` field: {e}")))?;
            audio = Some(bytes.to_vec());
        }
    }

    let audio = audio.ok_or_else(|| ApiError::bad_request("missing `file` field"))?;
    if audio.is_empty() {
        return Err(ApiError::bad_request("empty audio upload"));
    }
    Ok(audio)
}
