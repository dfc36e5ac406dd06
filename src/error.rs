use thiserror::Error;

use crate::analyze::ValidationReport;

/// Content detection failures. `NotFound` is non-fatal: callers surface an
/// actionable "no readable content" state instead of aborting.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("no readable content found on this page")]
    NotFound,
}

/// Content quality failures. Each variant carries the validation report so
/// the caller can surface the specific failed metric. Generation is never
/// attempted after one of these; retrying cannot fix a deficient document.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("content too short to summarize ({} words, {} chars)", .0.metrics.word_count, .0.metrics.char_count)]
    ContentTooShort(ValidationReport),

    #[error("content too repetitive to summarize (unique word ratio {:.2})", .0.metrics.unique_word_ratio)]
    Repetitive(ValidationReport),

    #[error("content lacks sentence structure ({} sentences)", .0.metrics.sentence_count)]
    StructureInsufficient(ValidationReport),
}

impl AnalyzeError {
    pub fn report(&self) -> &ValidationReport {
        match self {
            Self::ContentTooShort(report)
            | Self::Repetitive(report)
            | Self::StructureInsufficient(report) => report,
        }
    }
}

/// Summarization orchestration failures.
#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("summarization provider rejected the API key")]
    ApiKeyInvalid,

    #[error("summarization is not configured: no API key set")]
    NotConfigured,

    #[error("rate limit exceeded; try again later")]
    RateLimited,

    #[error("summarization request timed out")]
    Timeout,

    #[error("transient provider failure: {0}")]
    Transient(String),

    #[error("provider response did not match the expected shape: {0}")]
    ParseFailure(String),

    #[error("summary cache error: {0}")]
    Cache(String),
}

impl SummarizeError {
    /// Transient failures are retried with backoff; the rest surface at once.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Timeout | Self::Transient(_))
    }
}
