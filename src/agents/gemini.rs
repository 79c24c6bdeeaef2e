use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::{ReviewService, ServiceError};
use crate::models::{ChatTurn, ContentRef, ReviewResult, Source, UploadedFile};
use crate::storage::{resolve_bytes, BlobStore};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";

/// Maximum thinking budget, used for the deep analysis of a review.
const REVIEW_THINKING_BUDGET: u32 = 32768;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    thinking_config: ThinkingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    uri: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
    status: Option<String>,
}

/// Gemini `generateContent` client. File bytes are re-read from the blob
/// store right before every call.
pub struct GeminiAgent {
    client: Client,
    api_base: String,
    model: String,
    blobs: Arc<dyn BlobStore>,
}

impl GeminiAgent {
    pub fn new(
        api_base: &str,
        model: &str,
        timeout: Duration,
        blobs: Arc<dyn BlobStore>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.to_string(),
            blobs,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn file_parts(&self, files: &[UploadedFile]) -> Result<Vec<Part>, ServiceError> {
        let mut parts = Vec::with_capacity(files.len());
        for file in files {
            let data = match &file.content {
                ContentRef::Inline { data } => data.clone(),
                ContentRef::Blob { .. } => {
                    STANDARD.encode(resolve_bytes(file, self.blobs.as_ref()).await?)
                }
            };
            parts.push(Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: file.media_type.clone(),
                    data,
                }),
            });
        }
        Ok(parts)
    }

    async fn generate(
        &self,
        secret: &str,
        body: &GenerateRequest,
    ) -> Result<Candidate, ServiceError> {
        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", secret)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .ok()
                .and_then(|e| {
                    e.error
                        .message
                        .or(e.error.status)
                })
                .unwrap_or_else(|| format!("HTTP {}: {}", status.as_u16(), text));
            warn!(model = %self.model, status = status.as_u16(), "Gemini call failed");
            return Err(ServiceError::Api(message));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| ServiceError::Api(format!("Parse error: {}", e)))?;
        parsed
            .candidates
            .into_iter()
            .next()
            .ok_or(ServiceError::EmptyResponse)
    }
}

fn candidate_text(candidate: &Candidate) -> Option<String> {
    let text: String = candidate
        .content
        .as_ref()?
        .parts
        .iter()
        .filter(|p| !p.thought)
        .filter_map(|p| p.text.as_deref())
        .collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn candidate_sources(candidate: Candidate) -> Vec<Source> {
    candidate
        .grounding_metadata
        .map(|m| m.grounding_chunks)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|chunk| chunk.web)
        .filter_map(|web| {
            web.uri.map(|uri| Source {
                uri,
                title: web.title,
            })
        })
        .collect()
}

#[async_trait]
impl ReviewService for GeminiAgent {
    async fn generate_review(
        &self,
        prompt: &str,
        files: &[UploadedFile],
        secret: &str,
    ) -> Result<ReviewResult, ServiceError> {
        info!(model = %self.model, files = files.len(), "Generating review");

        let mut parts = vec![Part::text(prompt)];
        parts.extend(self.file_parts(files).await?);

        let body = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
            tools: vec![Tool {
                google_search: GoogleSearch {},
            }],
            generation_config: Some(GenerationConfig {
                thinking_config: ThinkingConfig {
                    thinking_budget: REVIEW_THINKING_BUDGET,
                },
            }),
        };

        let candidate = self.generate(secret, &body).await?;
        let report = candidate_text(&candidate).ok_or(ServiceError::EmptyResponse)?;
        let sources = candidate_sources(candidate);
        info!(model = %self.model, sources = sources.len(), "Review generated");
        Ok(ReviewResult { report, sources })
    }

    async fn continue_chat(
        &self,
        secret: &str,
        history: &[ChatTurn],
        turn: &ChatTurn,
    ) -> Result<String, ServiceError> {
        let mut contents: Vec<Content> = history
            .iter()
            .map(|t| Content {
                role: t.role.as_str().to_string(),
                parts: vec![Part::text(t.text.clone())],
            })
            .collect();

        let mut parts = vec![Part::text(turn.text.clone())];
        parts.extend(self.file_parts(&turn.files).await?);
        contents.push(Content {
            role: turn.role.as_str().to_string(),
            parts,
        });

        let body = GenerateRequest {
            contents,
            tools: Vec::new(),
            generation_config: None,
        };

        let candidate = self.generate(secret, &body).await?;
        candidate_text(&candidate).ok_or(ServiceError::EmptyResponse)
    }
}
