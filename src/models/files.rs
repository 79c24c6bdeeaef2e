use serde::{Deserialize, Serialize};

/// Where the bytes of an uploaded file live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentRef {
    /// Base64 encoded bytes carried with the file record.
    Inline { data: String },
    /// Uploaded to the blob store; bytes must be fetched from `url` before use.
    Blob { url: String, key: String },
}

/// A file attached to a submission or a chat turn. Immutable once attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    pub media_type: String,
    pub size: u64,
    pub content: ContentRef,
}

impl UploadedFile {
    pub fn is_inline(&self) -> bool {
        matches!(self.content, ContentRef::Inline { .. })
    }
}
