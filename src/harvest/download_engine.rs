//! Streaming image downloads.
//!
//! One `fetch` call resolves one candidate URL: issue a streaming GET, verify
//! the response actually carries image content, and land the body at a
//! deterministic per-URL path inside the category directory. Work already on
//! disk is honored, so an interrupted harvest can be re-run without
//! re-fetching anything that completed. Bodies are streamed to a `.part`
//! sibling and renamed into place only once fully written; the destination
//! path never holds a truncated file.

use std::path::{Path, PathBuf};

use futures::stream::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

/// Error types for single-file downloads
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP error: {0}")]
    Status(StatusCode),

    #[error("Not image content: {0:?}")]
    ContentType(String),
}

/// Result type for single-file downloads
pub type DownloadResult<T> = Result<T, DownloadError>;

/// What became of one candidate URL. Failures carry no path; the URL is
/// simply abandoned, never retried.
#[derive(Debug, Clone, Default)]
pub struct DownloadOutcome {
    pub success: bool,
    pub path: Option<PathBuf>,
}

impl DownloadOutcome {
    pub fn success(path: PathBuf) -> Self {
        Self {
            success: true,
            path: Some(path),
        }
    }

    pub fn failure() -> Self {
        Self {
            success: false,
            path: None,
        }
    }
}

/// Downloads single files into category directories.
pub struct DownloadEngine {
    client: Client,
    write_buffer_bytes: usize,
}

impl DownloadEngine {
    pub fn new(client: Client, write_buffer_bytes: usize) -> Self {
        Self {
            client,
            write_buffer_bytes: write_buffer_bytes.max(1),
        }
    }

    /// Fetches one candidate URL into `dest_dir`. All failure modes collapse
    /// into an unsuccessful outcome; nothing here aborts the batch.
    pub async fn fetch(&self, url: &str, dest_dir: &Path) -> DownloadOutcome {
        match self.try_fetch(url, dest_dir).await {
            Ok(path) => DownloadOutcome::success(path),
            Err(e) => {
                debug!("Download failed for {}: {}", url, e);
                DownloadOutcome::failure()
            }
        }
    }

    async fn try_fetch(&self, url: &str, dest_dir: &Path) -> DownloadResult<PathBuf> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(DownloadError::Status(response.status()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.contains("image") {
            return Err(DownloadError::ContentType(content_type));
        }

        let path = destination_for(url, &content_type, dest_dir);
        if is_already_downloaded(&path) {
            debug!("File already exists: {}", path.display());
            return Ok(path);
        }

        self.stream_to_disk(response, &path).await?;
        Ok(path)
    }

    /// Streams the body to a `.part` sibling, then renames into place. Any
    /// transfer error removes the partial file before surfacing.
    async fn stream_to_disk(&self, response: Response, path: &Path) -> DownloadResult<()> {
        let temp = partial_path(path);

        if let Err(e) = self.write_body(response, &temp).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e);
        }

        if let Err(e) = tokio::fs::rename(&temp, path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn write_body(&self, response: Response, temp: &Path) -> DownloadResult<()> {
        let file = File::create(temp).await?;
        let mut writer = BufWriter::with_capacity(self.write_buffer_bytes, file);

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            writer.write_all(&chunk).await?;
        }
        writer.flush().await?;

        Ok(())
    }
}

/// Deterministic destination for a URL: the hex SHA-256 of the URL itself,
/// with an extension inferred from the declared content type.
pub fn destination_for(url: &str, content_type: &str, dest_dir: &Path) -> PathBuf {
    let digest = Sha256::digest(url.as_bytes());
    dest_dir.join(format!(
        "{}.{}",
        hex::encode(digest),
        extension_for_mime(content_type)
    ))
}

/// Maps a declared content type to a file extension, defaulting to `jpg`
/// when the type is unrecognized or ambiguous.
pub fn extension_for_mime(content_type: &str) -> &'static str {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        "image/tiff" => "tiff",
        "image/svg+xml" => "svg",
        _ => "jpg",
    }
}

/// A complete, non-empty file at the destination counts as done.
fn is_already_downloaded(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0)
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}
