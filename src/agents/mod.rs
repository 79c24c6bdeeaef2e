mod gemini;

pub use gemini::{GeminiAgent, DEFAULT_API_BASE, DEFAULT_MODEL};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ChatTurn, ReviewResult, UploadedFile};
use crate::storage::BlobError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Gemini API Error: {0}")]
    Api(String),

    #[error("Gemini API Error: request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error("Gemini API Error: response contained no text")]
    EmptyResponse,
}

/// The generative review backend. Errors are recorded verbatim on the job.
#[async_trait]
pub trait ReviewService: Send + Sync {
    async fn generate_review(
        &self,
        prompt: &str,
        files: &[UploadedFile],
        secret: &str,
    ) -> Result<ReviewResult, ServiceError>;

    /// Continue a conversation. `history` already starts with the report.
    async fn continue_chat(
        &self,
        secret: &str,
        history: &[ChatTurn],
        turn: &ChatTurn,
    ) -> Result<String, ServiceError>;
}

pub const REVIEWER_PROFILES: &[&str] = &[
    "Q1 journal",
    "Q2 Journal",
    "A* Conference",
    "International Conference",
];

pub const DEFAULT_REVIEWER_PROFILE: &str = "Q1 journal";

const PROFILE_PLACEHOLDER: &str = "[JOURNAL_LEVEL]";

const REVIEW_PROMPT: &str = "You're a [JOURNAL_LEVEL]'s reviewer in the field matching the content of the \
attached manuscript (attached files). Please read the attached manuscript carefully and research with other \
related approaches to make a comprehensive review of the paper. Make a comprehensive comparison between the \
proposed method or architechture and other state-of-the-art methods to the best of your knowledge and rate the \
paper on a scale of 100 points. Suggest a decision for the author and the editor. Suggest improvements if needed \
in: Novelty, Contribution, Technical Soundness, Methodology, Empirical Rigor and Evaluation (Sharpness and level \
of analysis, how well results are maintained,...), Presentation and Clarity (Clarity and effectiveness of slides, \
flow, and delivery, Logical flow and proper formatting of the presentation, Proper use and quality of references, \
extra references or missing important references, quality of writing, easy to follow, story telling, typo, \
grammar errors ...). Respond in Vietnamese.";

pub fn build_review_prompt(reviewer_profile: &str) -> String {
    REVIEW_PROMPT.replacen(PROFILE_PLACEHOLDER, reviewer_profile, 1)
}
