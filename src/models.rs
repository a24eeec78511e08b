//! Data models for fetched pages, extracted articles, and analysis reports.
//!
//! This module defines the records passed between the pipeline stages:
//! - [`RawPage`]: Page text and metadata hints returned by the fetcher
//! - [`ExtractedArticle`]: Clean article produced by the extraction stage
//! - [`AnalysisReport`]: Structured media-literacy report from the analysis stage
//! - [`Analysis`]: Both stage outputs for adapters that show the whole run
//!
//! [`ExtractedArticle`] and [`AnalysisReport`] derive [`JsonSchema`] so their
//! shape can be handed to the model as the structured-output contract.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A web page as returned by the fetch capability.
///
/// The text has scripts, styles, navigation, and other chrome stripped but
/// is otherwise unprocessed. Metadata fields are hints scraped from the
/// document head and may be absent or wrong.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPage {
    /// Final URL after redirects.
    pub url: String,
    /// `<title>` or `og:title`, if present.
    pub title_hint: Option<String>,
    /// Author meta tag, if present.
    pub author_hint: Option<String>,
    /// Publication date meta tag, if present.
    pub date_hint: Option<String>,
    /// Visible page text.
    pub text: String,
}

/// Article metadata and body isolated from a raw page by the extraction stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedArticle {
    /// Article title.
    pub title: String,
    /// Author name if available, empty string otherwise.
    #[serde(default)]
    pub author: String,
    /// Publication date as printed on the page, empty string if unknown.
    #[serde(default)]
    pub publication_date: String,
    /// Clean article text without ads, navigation, or comments.
    pub main_content: String,
}

impl ExtractedArticle {
    /// First `max` characters of the body, with an ellipsis when cut.
    pub fn preview(&self, max: usize) -> String {
        let mut chars = self.main_content.chars();
        let head: String = chars.by_ref().take(max).collect();
        if chars.next().is_some() {
            format!("{head}...")
        } else {
            head
        }
    }

    pub fn word_count(&self) -> usize {
        self.main_content.split_whitespace().count()
    }
}

/// Structured media-literacy analysis of one article.
///
/// `named_entities` is a sorted map so that rendering and serialization are
/// deterministic regardless of the order the model produced categories in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisReport {
    /// 3-5 main factual claims from the article.
    #[schemars(length(min = 3, max = 5))]
    pub core_claims: Vec<String>,
    /// Language and tone classification (neutral, emotional, persuasive, etc.) with justification.
    pub tone_analysis: String,
    /// Indicators of bias or weak reporting; empty when none are found.
    pub red_flags: Vec<String>,
    /// 3-4 questions the reader should ask to verify the claims.
    #[schemars(length(min = 3, max = 4))]
    pub verification_questions: Vec<String>,
    /// Key people, organizations, and locations grouped by category.
    #[serde(default)]
    pub named_entities: BTreeMap<String, Vec<String>>,
    /// One-paragraph summary of the article from a hypothetical opposing viewpoint.
    #[serde(default)]
    pub opposing_viewpoint: String,
}

impl AnalysisReport {
    /// True when at least one entity category has at least one entity.
    pub fn has_entities(&self) -> bool {
        self.named_entities.values().any(|v| !v.is_empty())
    }
}

/// The full result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    /// The URL that was analyzed.
    pub url: String,
    /// Stage one output.
    pub article: ExtractedArticle,
    /// Stage two output.
    pub report: AnalysisReport,
    /// When the analysis stage completed.
    pub analyzed_at: DateTime<Utc>,
}
