//! Transcription session facade
//!
//! One `Session` bundles the loaded model, an execution context, the media
//! decoder, and a configured parameter block behind two operations: build it
//! once, then transcribe audio repeatedly. A session is single-flight by
//! construction (`&mut self` on every transcription), so callers that want
//! concurrency hold one session per worker or serialize behind a lock.

use std::path::Path;

use tracing::{debug, info};

use crate::context::{ExecutionContext, ResultFlags, SamplingStrategy};
use crate::error::{NativeError, Result};
use crate::lang;
use crate::library;
use crate::media::MediaFoundation;
use crate::model::Model;
use crate::params::{FullParams, ParamFlags};
use crate::status::Outcome;

/// A ready-to-transcribe pipeline over the native library.
pub struct Session {
    model: Model,
    context: ExecutionContext,
    media: MediaFoundation,
    params: FullParams,
}

impl Session {
    /// Load the native library from its default name and build a session.
    ///
    /// `language` is a case-insensitive language name ("english", "polish",
    /// ...); unknown names fall back to English.
    pub fn initialize(model_path: &str, language: &str) -> Result<Session> {
        Self::initialize_with(model_path, language, None)
    }

    /// Build a session, optionally naming the native library file.
    pub fn initialize_with(
        model_path: &str,
        language: &str,
        library_path: Option<&Path>,
    ) -> Result<Session> {
        let lib = match library_path {
            Some(path) => library::load_from(path)?,
            None => library::load()?,
        };

        let model = lib.load_model(model_path, None)?;
        let context = model.create_context()?;
        let media = lib.init_media_foundation()?;

        let mut params = context.default_params(SamplingStrategy::BeamSearch)?;
        params.add_flags(ParamFlags::NO_CONTEXT | ParamFlags::TOKEN_TIMESTAMPS);
        params.set_language(lang::resolve(language));

        info!(model = model_path, language, "session initialized");
        Ok(Self::from_parts(model, context, media, params))
    }

    pub(crate) fn from_parts(
        model: Model,
        context: ExecutionContext,
        media: MediaFoundation,
        params: FullParams,
    ) -> Session {
        Session {
            model,
            context,
            media,
            params,
        }
    }

    /// The model this session runs on.
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Mutable access to the parameter block, for callers that tune beyond
    /// the session defaults.
    pub fn params_mut(&mut self) -> &mut FullParams {
        &mut self.params
    }

    /// Transcribe an in-memory audio container (any format the native
    /// decoder understands). Blocks until inference finishes.
    pub fn transcribe_bytes(&mut self, data: &[u8]) -> Result<String> {
        let reader = self.media.load_bytes(data, true)?;
        debug!(bytes = data.len(), "running streamed transcription");
        let outcome = self.context.run_streamed(&self.params, &reader)?;
        self.collect_text(outcome)
    }

    /// Transcribe an audio file on disk. Blocks until inference finishes.
    pub fn transcribe_file(&mut self, path: &Path) -> Result<String> {
        let buffer = self.media.load_file(path, true)?;
        debug!(path = %path.display(), samples = buffer.count_samples(), "running full transcription");
        let outcome = self.context.run_full(&self.params, &buffer)?;
        self.collect_text(outcome)
    }

    /// Assemble the text of the last run.
    ///
    /// Zero segments means the run produced no result at all (distinct from
    /// recognized silence, which yields segments with empty text) and is
    /// reported as [`NativeError::EmptyResult`].
    fn collect_text(&mut self, outcome: Outcome) -> Result<String> {
        if let Outcome::Declined = outcome {
            debug!("transcription declined by encoder-begin hook");
        }

        let results = self
            .context
            .get_results(ResultFlags::TOKENS | ResultFlags::TIMESTAMPS, true)?;
        let (n_segments, _) = results.size()?;
        if n_segments == 0 {
            return Err(NativeError::EmptyResult);
        }

        let mut text = String::new();
        for segment in results.segments(n_segments)? {
            text.push_str(&segment.text());
        }
        Ok(text.trim_start().to_owned())
    }
}
