//! Command-line arguments

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "whisperd", about = "HTTP transcription server over the native Whisper library")]
pub struct Args {
    /// Model file to load. A missing file named like a published ggml model
    /// (ggml-*.bin) is downloaded on startup.
    #[arg(long, default_value = "ggml-medium.bin")]
    pub model: PathBuf,

    /// Transcription language, by name ("english", "polish", ...). Unknown
    /// names fall back to English.
    #[arg(long, default_value = "english")]
    pub language: String,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Explicit path to the native library, overriding the platform default
    /// lookup
    #[arg(long)]
    pub library: Option<PathBuf>,
}
