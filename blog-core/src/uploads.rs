//! Cover-image uploads stored on local disk.
//!
//! The destination directory is part of [`UploadConfig`] and is injected
//! when [`DiskUploads`] is built. Files are streamed chunk by chunk so the
//! size limit is enforced before the whole upload is buffered.

use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::config::{self, BlogConfigSnapshot};
use crate::errors::BlogError;

/// Errors that can occur while storing an upload
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("File '{filename}' exceeds maximum size of {max_bytes} bytes")]
    TooLarge { filename: String, max_bytes: u64 },

    #[error("Content type '{content_type}' is not allowed")]
    ContentTypeRejected { content_type: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl From<UploadError> for BlogError {
    fn from(err: UploadError) -> Self {
        let message = err.to_string();
        match err {
            UploadError::TooLarge { .. } => BlogError::payload_too_large(message),
            UploadError::ContentTypeRejected { .. } => BlogError::unsupported_media_type(message),
            UploadError::Io { .. } => {
                BlogError::general_error("Failed to store upload").with_source(err.into())
            }
        }
    }
}

/// Where and how uploads are stored.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Directory files are written to
    pub dir: PathBuf,
    /// Public URL prefix the directory is served under
    pub url_prefix: String,
    /// Form field carrying the file
    pub field: String,
    /// Maximum file size in bytes (None = unlimited)
    pub max_file_bytes: Option<u64>,
    /// Maximum size of each text field sent alongside the file
    pub max_field_bytes: u64,
    /// Allowed content types (empty = all allowed)
    pub allowed_content_types: HashSet<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./public/uploads"),
            url_prefix: "/uploads".to_string(),
            field: "coverImage".to_string(),
            max_file_bytes: Some(5 * 1024 * 1024),
            max_field_bytes: 64 * 1024,
            allowed_content_types: HashSet::new(),
        }
    }
}

impl UploadConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn from_snapshot(snapshot: &BlogConfigSnapshot) -> Self {
        let defaults = Self::default();
        Self {
            dir: snapshot
                .get_string(config::UPLOADS_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.dir),
            url_prefix: snapshot.get_or(config::UPLOADS_URL_PREFIX, &defaults.url_prefix),
            field: snapshot.get_or(config::UPLOADS_FIELD, &defaults.field),
            max_file_bytes: snapshot
                .get_u64(config::UPLOADS_MAX_FILE_BYTES)
                .or(defaults.max_file_bytes),
            max_field_bytes: snapshot
                .get_u64(config::UPLOADS_MAX_FIELD_BYTES)
                .unwrap_or(defaults.max_field_bytes),
            allowed_content_types: snapshot
                .get_list(config::UPLOADS_ALLOWED_TYPES)
                .into_iter()
                .collect(),
        }
    }

    pub fn url_prefix(mut self, prefix: &str) -> Self {
        self.url_prefix = prefix.to_string();
        self
    }

    pub fn field(mut self, name: &str) -> Self {
        self.field = name.to_string();
        self
    }

    pub fn max_file_bytes(mut self, bytes: u64) -> Self {
        self.max_file_bytes = Some(bytes);
        self
    }

    pub fn allow_content_type(mut self, content_type: &str) -> Self {
        self.allowed_content_types.insert(content_type.to_string());
        self
    }

    fn accepts(&self, content_type: Option<&str>) -> bool {
        if self.allowed_content_types.is_empty() {
            return true;
        }
        content_type.is_some_and(|ct| self.allowed_content_types.contains(ct))
    }
}

/// Strategy for naming stored files
pub trait FilenameStrategy: Send + Sync {
    fn filename(&self, original_name: &str) -> String;
}

/// `<unix-millis>-<original basename>`: readable, keeps the extension, and
/// only collides for identical names within the same millisecond.
#[derive(Debug, Clone, Default)]
pub struct TimestampFilename;

impl FilenameStrategy for TimestampFilename {
    fn filename(&self, original_name: &str) -> String {
        format!(
            "{}-{}",
            Utc::now().timestamp_millis(),
            sanitize_original_name(original_name)
        )
    }
}

/// Keep the final path component and replace anything outside
/// `[A-Za-z0-9._-]`.
pub fn sanitize_original_name(original_name: &str) -> String {
    let base = original_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// A file that has been written to the upload directory.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub filename: String,
    pub original_name: String,
    pub content_type: Option<String>,
    pub size_bytes: u64,
    pub path: PathBuf,
    pub url: String,
}

impl StoredFile {
    /// Public URL, e.g. `/uploads/1718000000000-cat.png`
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Upload handler writing into one fixed directory.
#[derive(Clone)]
pub struct DiskUploads {
    config: UploadConfig,
    names: Arc<dyn FilenameStrategy>,
}

impl DiskUploads {
    pub fn new(config: UploadConfig) -> Self {
        Self {
            config,
            names: Arc::new(TimestampFilename),
        }
    }

    pub fn with_strategy(mut self, names: Arc<dyn FilenameStrategy>) -> Self {
        self.names = names;
        self
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Open the destination file for a new upload.
    pub async fn begin(
        &self,
        original_name: &str,
        content_type: Option<&str>,
    ) -> Result<PendingUpload, UploadError> {
        if !self.config.accepts(content_type) {
            return Err(UploadError::ContentTypeRejected {
                content_type: content_type.unwrap_or("unknown").to_string(),
            });
        }

        tokio::fs::create_dir_all(&self.config.dir).await?;

        let (filename, path, file) = self.create_unique(original_name).await?;

        tracing::debug!(%filename, dir = %self.config.dir.display(), "upload started");

        Ok(PendingUpload {
            file,
            path,
            url: format!("{}/{}", self.config.url_prefix.trim_end_matches('/'), filename),
            filename,
            original_name: original_name.to_string(),
            content_type: content_type.map(str::to_string),
            written: 0,
            max_bytes: self.config.max_file_bytes,
        })
    }

    /// Existing files are never truncated. A taken name is retried with a
    /// numeric suffix before the extension.
    async fn create_unique(
        &self,
        original_name: &str,
    ) -> Result<(String, PathBuf, File), UploadError> {
        let base = self.names.filename(original_name);
        let mut attempt = 0;
        loop {
            let filename = if attempt == 0 {
                base.clone()
            } else {
                numbered(&base, attempt)
            };
            let path = self.config.dir.join(&filename);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((filename, path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempt < MAX_NAME_ATTEMPTS => {
                    tracing::debug!(%filename, "upload name taken, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Store an in-memory file in one go.
    pub async fn store_bytes(
        &self,
        original_name: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<StoredFile, UploadError> {
        let mut pending = self.begin(original_name, content_type).await?;
        pending.write_chunk(bytes).await?;
        pending.finish().await
    }

    /// Remove a stored file, e.g. because the request that uploaded it failed.
    pub async fn discard(&self, file: &StoredFile) {
        match tokio::fs::remove_file(&file.path).await {
            Ok(()) => tracing::debug!(filename = %file.filename, "discarded upload"),
            Err(e) => tracing::warn!(filename = %file.filename, error = %e, "failed to discard upload"),
        }
    }
}

const MAX_NAME_ATTEMPTS: u32 = 16;

/// `cat.png` becomes `cat-2.png`.
fn numbered(filename: &str, n: u32) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{n}.{ext}"),
        _ => format!("{filename}-{n}"),
    }
}

/// An upload being streamed to disk.
pub struct PendingUpload {
    file: File,
    path: PathBuf,
    url: String,
    filename: String,
    original_name: String,
    content_type: Option<String>,
    written: u64,
    max_bytes: Option<u64>,
}

impl PendingUpload {
    /// Append a chunk. Going over the size limit removes the partial file.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), UploadError> {
        let next = self.written + chunk.len() as u64;
        if let Some(max_bytes) = self.max_bytes {
            if next > max_bytes {
                let _ = tokio::fs::remove_file(&self.path).await;
                return Err(UploadError::TooLarge {
                    filename: self.original_name.clone(),
                    max_bytes,
                });
            }
        }

        self.file.write_all(chunk).await?;
        self.written = next;
        Ok(())
    }

    pub async fn finish(mut self) -> Result<StoredFile, UploadError> {
        self.file.flush().await?;

        tracing::info!(
            filename = %self.filename,
            original = %self.original_name,
            size = self.written,
            "upload stored"
        );

        Ok(StoredFile {
            filename: self.filename,
            original_name: self.original_name,
            content_type: self.content_type,
            size_bytes: self.written,
            path: self.path,
            url: self.url,
        })
    }

    /// Drop the partial file.
    pub async fn abort(self) {
        let PendingUpload { file, path, .. } = self;
        drop(file);
        let _ = tokio::fs::remove_file(&path).await;
    }
}
