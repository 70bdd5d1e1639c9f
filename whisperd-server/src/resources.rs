//! Model file provisioning
//!
//! Published ggml model files are fetched from the whisper.cpp repository on
//! Hugging Face when the configured model path does not exist and its file
//! name matches a published release. Anything else that is missing is an
//! error: only known release names have a known download location.

use std::fs::File;
use std::path::Path;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

const MODEL_BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// Make sure the model file exists, downloading it when possible. Blocking.
pub fn ensure_model(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if !is_published_model(name) {
        bail!(
            "model file {} does not exist and is not a published ggml model name",
            path.display()
        );
    }

    download_model(name, path)
}

/// Whether `name` looks like a file published in the whisper.cpp model
/// repository.
fn is_published_model(name: &str) -> bool {
    name.starts_with("ggml-") && name.ends_with(".bin")
}

fn download_model(name: &str, dest: &Path) -> Result<()> {
    let url = format!("{MODEL_BASE_URL}/{name}");
    info!(%url, "downloading model");

    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(3600))
        .build()?;
    let mut response = client
        .get(&url)
        .send()
        .with_context(|| format!("request to {url} failed"))?;
    if !response.status().is_success() {
        bail!("HTTP {} for {}", response.status(), url);
    }

    let bar = match response.content_length() {
        Some(total) => ProgressBar::new(total).with_style(
            ProgressStyle::with_template(
                "{msg} [{bar:40}] {bytes}/{total_bytes} ({bytes_per_sec})",
            )?
            .progress_chars("=> "),
        ),
        None => ProgressBar::no_length(),
    };
    bar.set_message(name.to_owned());

    // Download to a temporary name so an interrupted transfer never leaves a
    // truncated file behind under the real model name.
    let partial = dest.with_extension("bin.part");
    let file = File::create(&partial)?;
    let mut writer = bar.wrap_write(file);
    response
        .copy_to(&mut writer)
        .with_context(|| format!("download of {url} interrupted"))?;
    bar.finish();

    std::fs::rename(&partial, dest)?;
    info!(path = %dest.display(), "model downloaded");
    Ok(())
}
