//! File intake: turns user-selected files into attachable [`UploadedFile`]s.
//!
//! The capacity check is all-or-nothing for a batch. Conversion is per file:
//! one bad file is reported and the rest of the batch is still admitted.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::models::{ContentRef, UploadedFile};
use crate::storage::{generate_blob_key, BlobStore};

/// How file bytes are carried once admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntakeMode {
    Inline,
    Blob,
}

impl IntakeMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inline" => Some(IntakeMode::Inline),
            "blob" => Some(IntakeMode::Blob),
            _ => None,
        }
    }
}

/// A file as received from the client, before conversion.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub media_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRejection {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct IntakeOutcome {
    pub accepted: Vec<UploadedFile>,
    pub rejected: Vec<FileRejection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntakeError {
    #[error("Cannot upload more than {max} files in total.")]
    Capacity { max: usize },
}

pub struct FileIntake {
    max_files: usize,
    mode: IntakeMode,
    blobs: Arc<dyn BlobStore>,
    files: Vec<UploadedFile>,
}

impl FileIntake {
    pub fn new(max_files: usize, mode: IntakeMode, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            max_files,
            mode,
            blobs,
            files: Vec::new(),
        }
    }

    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    pub fn into_files(self) -> Vec<UploadedFile> {
        self.files
    }

    pub async fn add_files(
        &mut self,
        selection: Vec<SelectedFile>,
    ) -> Result<IntakeOutcome, IntakeError> {
        if self.files.len() + selection.len() > self.max_files {
            return Err(IntakeError::Capacity {
                max: self.max_files,
            });
        }

        let mut outcome = IntakeOutcome::default();
        for file in selection {
            let name = file.name.clone();
            match self.convert(file).await {
                Ok(uploaded) => outcome.accepted.push(uploaded),
                Err(reason) => {
                    warn!(file = %name, %reason, "Failed to process file");
                    outcome.rejected.push(FileRejection { name, reason });
                }
            }
        }
        self.files.extend(outcome.accepted.iter().cloned());
        Ok(outcome)
    }

    /// Drops the local reference only; blob data already uploaded is kept.
    pub fn remove_file(&mut self, index: usize) -> Option<UploadedFile> {
        if index < self.files.len() {
            Some(self.files.remove(index))
        } else {
            None
        }
    }

    async fn convert(&self, file: SelectedFile) -> Result<UploadedFile, String> {
        if file.bytes.is_empty() {
            return Err(format!("Failed to process file: {} (file is empty)", file.name));
        }

        let media_type = file
            .media_type
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| {
                mime_guess::from_path(&file.name)
                    .first_raw()
                    .unwrap_or("application/octet-stream")
                    .to_string()
            });

        let content = match self.mode {
            IntakeMode::Inline => ContentRef::Inline {
                data: STANDARD.encode(&file.bytes),
            },
            IntakeMode::Blob => {
                let key = generate_blob_key(&file.name);
                let url = self
                    .blobs
                    .upload(&file.bytes, &key)
                    .await
                    .map_err(|e| format!("Failed to process file: {} ({})", file.name, e))?;
                ContentRef::Blob { url, key }
            }
        };

        Ok(UploadedFile {
            name: file.name,
            media_type,
            size: file.bytes.len() as u64,
            content,
        })
    }
}
