use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{JsonMapError, Result};
use crate::formats::Format;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// A document read from disk together with the format its extension names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadedDocument {
    pub path: PathBuf,
    pub content: String,
    pub format: Format,
}

pub fn open_file(path: impl AsRef<Path>) -> Result<LoadedDocument> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let format = Format::from_path(path).unwrap_or_default();
    debug!(path = %path.display(), %format, bytes = content.len(), "opened document");
    Ok(LoadedDocument {
        path: path.to_path_buf(),
        content,
        format,
    })
}

pub fn save_file(path: impl AsRef<Path>, content: &str) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, content)?;
    debug!(path = %path.display(), bytes = content.len(), "saved document");
    Ok(())
}

/// Downloads the body of `url` as text. Non-success statuses are errors.
pub async fn fetch_url(url: &str) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|err| JsonMapError::Transport(err.to_string()))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| JsonMapError::Transport(format!("request to {url} failed: {err}")))?
        .error_for_status()
        .map_err(|err| JsonMapError::Transport(err.to_string()))?;

    let body = response
        .text()
        .await
        .map_err(|err| JsonMapError::Transport(format!("failed to read response body: {err}")))?;

    info!(url, bytes = body.len(), "fetched remote document");
    Ok(body)
}
