//! Error taxonomy for the analysis pipeline.
//!
//! Every failure from either stage surfaces as a [`PipelineError`]. Adapters
//! turn it into user-facing text with [`PipelineError::explain`] and, for
//! HTTP, a status code with [`PipelineError::status_code`].

use axum::http::StatusCode;
use thiserror::Error;

/// Failure reaching or reading the article URL.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url} is not a text document (content-type {content_type})")]
    NotText { url: String, content_type: String },

    #[error("{url} contained no extractable text")]
    EmptyPage { url: String },
}

/// Why the language-model provider refused or failed a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamKind {
    RateLimited,
    Unavailable,
    Unauthorized,
    Other,
}

impl UpstreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UpstreamKind::RateLimited => "rate_limited",
            UpstreamKind::Unavailable => "unavailable",
            UpstreamKind::Unauthorized => "unauthorized",
            UpstreamKind::Other => "other",
        }
    }
}

/// Failure reported by the language-model provider.
#[derive(Debug, Error)]
#[error("language model {} error{}: {message}", .kind.as_str(), status_suffix(.status))]
pub struct UpstreamError {
    pub kind: UpstreamKind,
    /// HTTP status from the provider, when one was received.
    pub status: Option<u16>,
    pub message: String,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl UpstreamError {
    pub fn new(kind: UpstreamKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
        }
    }
}

/// Any failure that aborts a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid article URL '{0}'")]
    InvalidUrl(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("model output did not match the expected {stage} shape: {message}")]
    SchemaValidation { stage: &'static str, message: String },

    #[error("extracted article body is too short to analyze ({words} words)")]
    DegenerateContent { words: usize },

    #[error("analysis did not finish within {secs}s")]
    Timeout { secs: u64 },
}

impl PipelineError {
    pub fn schema(stage: &'static str, message: impl Into<String>) -> Self {
        PipelineError::SchemaValidation {
            stage,
            message: message.into(),
        }
    }

    /// Short machine-readable code, used in logs and the JSON API.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::InvalidUrl(_) => "invalid_url",
            PipelineError::Fetch(_) => "fetch_error",
            PipelineError::Upstream(e) => match e.kind {
                UpstreamKind::RateLimited => "upstream_rate_limited",
                UpstreamKind::Unavailable => "upstream_unavailable",
                UpstreamKind::Unauthorized => "upstream_unauthorized",
                UpstreamKind::Other => "upstream_error",
            },
            PipelineError::SchemaValidation { .. } => "schema_validation_error",
            PipelineError::DegenerateContent { .. } => "degenerate_content",
            PipelineError::Timeout { .. } => "timeout",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            PipelineError::Fetch(_) => StatusCode::BAD_GATEWAY,
            PipelineError::SchemaValidation { .. } => StatusCode::BAD_GATEWAY,
            PipelineError::DegenerateContent { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::Upstream(e) => match e.kind {
                UpstreamKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                UpstreamKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
                UpstreamKind::Unauthorized => StatusCode::UNAUTHORIZED,
                UpstreamKind::Other => StatusCode::BAD_GATEWAY,
            },
            PipelineError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Human-readable explanation naming the probable cause and a remedy.
    pub fn explain(&self) -> String {
        let (headline, cause, remedy) = match self {
            PipelineError::InvalidUrl(_) => (
                "INVALID URL",
                "The address is not a valid http(s) URL.",
                "Paste the full article link, including https://.",
            ),
            PipelineError::Fetch(_) => (
                "COULD NOT FETCH ARTICLE",
                "The article page could not be downloaded or contained no readable text.",
                "Check that the link opens in a browser and is not behind a paywall, then try again.",
            ),
            PipelineError::Upstream(e) => match e.kind {
                UpstreamKind::RateLimited => (
                    "API RATE LIMIT EXCEEDED",
                    "The language model API has reached its rate limit.",
                    "Please wait 30-60 seconds and try again, or switch to a model or plan with a higher limit.",
                ),
                UpstreamKind::Unavailable => (
                    "API SERVICE UNAVAILABLE",
                    "The language model API is currently overloaded or unavailable.",
                    "Please try again in a few moments.",
                ),
                UpstreamKind::Unauthorized => (
                    "AUTHENTICATION ERROR",
                    "Invalid or missing API key.",
                    "Check LLM_API_KEY in your environment, .env file, or config.yaml.",
                ),
                UpstreamKind::Other => (
                    "LANGUAGE MODEL ERROR",
                    "The language model API rejected the request.",
                    "Please try again or check the server logs for details.",
                ),
            },
            PipelineError::SchemaValidation { .. } => (
                "UNUSABLE MODEL OUTPUT",
                "The language model returned a result that did not match the expected structure.",
                "Try again; if it keeps happening, choose a model with structured output support.",
            ),
            PipelineError::DegenerateContent { .. } => (
                "NOT ENOUGH ARTICLE TEXT",
                "The page did not contain enough article text to analyze.",
                "Make sure the link points to a full news article rather than a gallery, video, or index page.",
            ),
            PipelineError::Timeout { .. } => (
                "ANALYSIS TIMED OUT",
                "The article took too long to fetch or analyze.",
                "Please try again; long articles and busy model providers can be slow.",
            ),
        };

        format!("⚠️ {headline}\n\n{cause}\n\nDetails: {self}\n\n{remedy}")
    }
}
