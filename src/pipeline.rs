//! The two-stage analysis pipeline.
//!
//! 1. **Extraction**: fetch the page, then have the model isolate title,
//!    author, date, and clean body text ([`Pipeline::extract`])
//! 2. **Analysis**: have the model produce an [`AnalysisReport`] from the
//!    extracted body ([`Pipeline::analyze`])
//!
//! [`Pipeline::run`] composes the two. The first failure from either stage
//! is returned unchanged and analysis never starts if extraction failed.
//!
//! Each model reply is parsed, normalised, and validated. A reply that fails
//! parsing or validation is re-asked up to `schema_reasks` times with the
//! rejection reason appended; upstream errors are never retried.

use crate::api::{CompletionRequest, LanguageModel, OutputSchema};
use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::models::{Analysis, AnalysisReport, ExtractedArticle};
use crate::prompts::{
    ANALYSIS_SYSTEM_PROMPT, EXTRACTION_SYSTEM_PROMPT, analysis_prompt, extraction_prompt,
    reask_note,
};
use crate::scrapers::PageFetcher;
use crate::utils::{looks_truncated, strip_code_fence, truncate_chars, truncate_for_log};
use crate::validation::{normalize_article, normalize_report, validate_article, validate_report};
use chrono::Utc;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Orchestrates extraction and analysis for one URL at a time.
///
/// Holds no per-request state, so one instance can serve concurrent
/// requests behind an `Arc`.
pub struct Pipeline {
    fetcher: Arc<dyn PageFetcher>,
    model: Arc<dyn LanguageModel>,
    max_content_chars: usize,
    min_content_words: usize,
    schema_reasks: u32,
    timeout: Option<Duration>,
}

impl Pipeline {
    pub fn new(
        config: &AppConfig,
        fetcher: Arc<dyn PageFetcher>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            fetcher,
            model,
            max_content_chars: config.max_content_chars,
            min_content_words: config.min_content_words,
            schema_reasks: config.schema_reasks,
            timeout: (config.pipeline_timeout_secs > 0)
                .then(|| Duration::from_secs(config.pipeline_timeout_secs)),
        }
    }

    /// Run both stages and return the analysis report.
    pub async fn run(&self, url: &str) -> Result<AnalysisReport, PipelineError> {
        self.run_detailed(url).await.map(|analysis| analysis.report)
    }

    /// Run both stages and return both outputs.
    #[instrument(level = "info", skip(self))]
    pub async fn run_detailed(&self, url: &str) -> Result<Analysis, PipelineError> {
        let t0 = Instant::now();
        let result = self
            .with_timeout(async {
                let article = self.extract(url).await?;
                let report = self.analyze(&article).await?;
                Ok(Analysis {
                    url: url.to_string(),
                    article,
                    report,
                    analyzed_at: Utc::now(),
                })
            })
            .await;

        let elapsed_ms = t0.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(elapsed_ms, "Pipeline completed"),
            Err(e) => warn!(elapsed_ms, code = e.code(), error = %e, "Pipeline failed"),
        }
        result
    }

    async fn with_timeout<T>(
        &self,
        fut: impl Future<Output = Result<T, PipelineError>>,
    ) -> Result<T, PipelineError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| PipelineError::Timeout {
                    secs: limit.as_secs(),
                })?,
            None => fut.await,
        }
    }

    /// Stage one: fetch `url` and extract the article.
    #[instrument(level = "info", skip(self))]
    pub async fn extract(&self, url: &str) -> Result<ExtractedArticle, PipelineError> {
        let url = parse_article_url(url)?;
        let page = self.fetcher.fetch(&url).await?;

        let content = truncate_chars(&page.text, self.max_content_chars);
        if content.len() < page.text.len() {
            info!(
                original_chars = page.text.chars().count(),
                kept_chars = self.max_content_chars,
                "Truncated page text before extraction"
            );
        }

        let schema = OutputSchema::of::<ExtractedArticle>("ExtractedArticle");
        let user = extraction_prompt(&page, content, Some(&schema));
        let article = self
            .ask_structured("extraction", EXTRACTION_SYSTEM_PROMPT, user, schema, |raw: ExtractedArticle| {
                let article = normalize_article(raw);
                let warnings = validate_article(&article).into_result("extraction")?;
                log_warnings("extraction", &warnings);
                Ok(article)
            })
            .await?;

        info!(
            title = %article.title,
            author = %article.author,
            date = %article.publication_date,
            words = article.word_count(),
            "Extracted article"
        );
        Ok(article)
    }

    /// Stage two: analyze an extracted article.
    #[instrument(level = "info", skip_all, fields(title = %article.title))]
    pub async fn analyze(&self, article: &ExtractedArticle) -> Result<AnalysisReport, PipelineError> {
        let words = article.word_count();
        if words == 0 || words < self.min_content_words {
            warn!(words, min = self.min_content_words, "Article body too short to analyze");
            return Err(PipelineError::DegenerateContent { words });
        }

        let schema = OutputSchema::of::<AnalysisReport>("AnalysisReport");
        let user = analysis_prompt(article, Some(&schema));
        let content = article.main_content.as_str();
        let report = self
            .ask_structured("analysis", ANALYSIS_SYSTEM_PROMPT, user, schema, |raw: AnalysisReport| {
                let report = normalize_report(raw);
                let warnings = validate_report(&report, content).into_result("analysis")?;
                log_warnings("analysis", &warnings);
                Ok(report)
            })
            .await?;

        info!(
            claims = report.core_claims.len(),
            red_flags = report.red_flags.len(),
            questions = report.verification_questions.len(),
            entity_categories = report.named_entities.len(),
            "Analyzed article"
        );
        Ok(report)
    }

    /// Ask the model for a `T`, re-asking on unparsable or invalid replies.
    async fn ask_structured<T, F>(
        &self,
        stage: &'static str,
        system: &str,
        user: String,
        schema: OutputSchema,
        check: F,
    ) -> Result<T, PipelineError>
    where
        T: DeserializeOwned + Send,
        F: Fn(T) -> Result<T, PipelineError> + Send + Sync,
    {
        let mut request = CompletionRequest {
            system: system.to_string(),
            user: user.clone(),
            schema: Some(schema),
        };
        let mut last_err = None;

        for attempt in 0..=self.schema_reasks {
            let reply = self.model.complete(&request).await?;
            debug!(stage, attempt, reply = %truncate_for_log(&reply, 300), "Model reply");

            let outcome = serde_json::from_str::<T>(strip_code_fence(&reply))
                .map_err(|e| {
                    if looks_truncated(&e) {
                        warn!(stage, attempt, "Model reply looks truncated");
                    }
                    PipelineError::schema(stage, e.to_string())
                })
                .and_then(&check);

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(stage, attempt, max = self.schema_reasks, error = %e, "Rejected model reply");
                    request.user = format!("{user}{}", reask_note(&e.to_string()));
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| PipelineError::schema(stage, "no reply")))
    }
}

fn log_warnings(stage: &str, warnings: &[String]) {
    for warning in warnings {
        warn!(stage, %warning, "Model output quality warning");
    }
}

/// Parse and check an article URL. Only absolute http(s) URLs with a host are accepted.
pub fn parse_article_url(raw: &str) -> Result<Url, PipelineError> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).map_err(|_| PipelineError::InvalidUrl(trimmed.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(PipelineError::InvalidUrl(trimmed.to_string()));
    }
    Ok(url)
}
