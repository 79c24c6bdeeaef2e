use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{ContentRef, UploadedFile};

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Blob I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to fetch file from URL: {url} ({reason})")]
    Fetch { url: String, reason: String },

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid inline file data: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// Object storage for uploaded files.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `path` and return a URL the bytes can be fetched from.
    async fn upload(&self, bytes: &[u8], path: &str) -> Result<String, BlobError>;

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, BlobError>;
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("static regex"))
}

/// Reduce a user supplied name to something safe for paths and headers.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned = unsafe_chars().replace_all(name.trim(), "_");
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn generate_blob_key(file_name: &str) -> String {
    format!(
        "{}_{}/{}",
        Utc::now().format("%Y%m%d"),
        &Uuid::new_v4().simple().to_string()[..8],
        sanitize_filename(file_name)
    )
}

pub fn ensure_dir(folder: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(folder)
}

/// Bytes of an attached file, fetched from the blob store when not inline.
pub async fn resolve_bytes(
    file: &UploadedFile,
    blobs: &dyn BlobStore,
) -> Result<Vec<u8>, BlobError> {
    match &file.content {
        ContentRef::Inline { data } => Ok(STANDARD.decode(data)?),
        ContentRef::Blob { url, .. } => blobs.fetch(url).await,
    }
}

/// Files on local disk. Its own `/blobs/` URLs are read back from disk and
/// are not served over HTTP; downloads go through the job's owner check.
pub struct LocalBlobStore {
    root: PathBuf,
    base_url: String,
    client: reqwest::Client,
}

impl LocalBlobStore {
    pub fn new(root: PathBuf, public_base_url: &str) -> Self {
        Self {
            root,
            base_url: format!("{}/blobs/", public_base_url.trim_end_matches('/')),
            client: reqwest::Client::new(),
        }
    }

    fn local_path(&self, key: &str) -> Option<PathBuf> {
        if key.is_empty() || key.split('/').any(|part| part.is_empty() || part == "..") {
            return None;
        }
        Some(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, bytes: &[u8], path: &str) -> Result<String, BlobError> {
        let target = self
            .local_path(path)
            .ok_or_else(|| BlobError::NotFound(path.to_string()))?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        Ok(format!("{}{}", self.base_url, path))
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, BlobError> {
        if let Some(key) = url.strip_prefix(&self.base_url) {
            let path = self
                .local_path(key)
                .ok_or_else(|| BlobError::NotFound(url.to_string()))?;
            return match tokio::fs::read(&path).await {
                Ok(bytes) => Ok(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(BlobError::NotFound(url.to_string()))
                }
                Err(e) => Err(e.into()),
            };
        }

        let fetch_err = |reason: String| BlobError::Fetch {
            url: url.to_string(),
            reason,
        };
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fetch_err(response.status().to_string()));
        }
        let bytes = response.bytes().await.map_err(|e| fetch_err(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Blob store kept in process memory.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, bytes: &[u8], path: &str) -> Result<String, BlobError> {
        let url = format!("memory://{}", path);
        self.objects.write().await.insert(url.clone(), bytes.to_vec());
        Ok(url)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, BlobError> {
        self.objects
            .read()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(url.to_string()))
    }
}
