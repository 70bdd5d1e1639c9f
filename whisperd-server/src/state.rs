//! Application state

use std::sync::{Arc, Mutex};

use tracing::debug;

use whisperd_native::Session;

use crate::error::ApiError;

/// Shared application state.
///
/// The transcription session is single-flight: the native context mutates
/// internal buffers during a run, so the whole decode-run-extract span holds
/// one lock. Concurrent requests queue behind it.
#[derive(Clone)]
pub struct AppState {
    session: Arc<Mutex<Session>>,
}

impl AppState {
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
        }
    }

    /// Transcribe one uploaded audio payload.
    ///
    /// Runs on the blocking pool; inference can take many seconds and must
    /// not stall the async executor.
    pub async fn transcribe(&self, audio: Vec<u8>) -> Result<String, ApiError> {
        let session = Arc::clone(&self.session);
        let text = tokio::task::spawn_blocking(move || {
            let mut session = session
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            session.transcribe_bytes(&audio)
        })
        .await
        .map_err(|e| ApiError::internal(format!("transcription task failed: {e}")))??;

        debug!(chars = text.len(), "transcription finished");
        Ok(text)
    }
}
