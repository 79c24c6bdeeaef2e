//! Downloadable review reports, derived purely from a completed job.

use serde::Serialize;
use thiserror::Error;

use crate::models::{ReviewJob, ReviewStatus};
use crate::storage::sanitize_filename;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Reports are only available for completed reviews (status is {0})")]
    NotCompleted(ReviewStatus),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("PDF error: {0}")]
    Pdf(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLink {
    pub label: String,
    pub uri: String,
}

/// Everything a rendered report shows, in display order.
#[derive(Debug, Clone, Serialize)]
pub struct ReportView {
    pub title: String,
    pub byline: String,
    pub report: String,
    pub sources: Vec<SourceLink>,
}

impl ReportView {
    pub fn from_job(job: &ReviewJob) -> Result<Self, ReportError> {
        let result = match (&job.status, &job.result) {
            (ReviewStatus::Completed, Some(result)) => result,
            _ => return Err(ReportError::NotCompleted(job.status)),
        };

        Ok(Self {
            title: format!("Review for: {}", job.manuscript_name),
            byline: format!(
                "Reviewed by: {} as {}",
                job.credential_name, job.reviewer_profile
            ),
            report: result.report.clone(),
            sources: result
                .sources
                .iter()
                .map(|s| SourceLink {
                    label: s.label().to_string(),
                    uri: s.uri.clone(),
                })
                .collect(),
        })
    }
}

pub fn download_name(job: &ReviewJob, extension: &str) -> String {
    format!("{}-review.{}", sanitize_filename(&job.manuscript_name), extension)
}
