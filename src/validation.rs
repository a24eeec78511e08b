//! Validation of model output.
//!
//! The model is asked to honour a schema but nothing guarantees it does, so
//! every stage output goes through a normalisation pass and then an explicit
//! validation pass here. Errors reject the output; warnings are logged.

use crate::error::PipelineError;
use crate::models::{AnalysisReport, ExtractedArticle};
use crate::utils::normalize_whitespace;
use itertools::Itertools;
use std::collections::{BTreeMap, HashSet};
use std::ops::RangeInclusive;

pub const CORE_CLAIMS_BOUNDS: RangeInclusive<usize> = 3..=5;
pub const VERIFICATION_QUESTIONS_BOUNDS: RangeInclusive<usize> = 3..=4;

/// Words ignored when checking claims against the article text.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "that", "with", "this", "from", "was", "were", "are", "has", "have",
    "had", "its", "his", "her", "their", "they", "but", "not", "been", "will", "would", "said",
    "says", "about", "into", "than", "which", "who", "article", "reports", "according",
];

/// Outcome of validating one stage output.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Violations that make the output unusable.
    pub errors: Vec<String>,
    /// Quality issues worth logging.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Convert into a [`PipelineError::SchemaValidation`] when there are errors.
    pub fn into_result(self, stage: &'static str) -> Result<Vec<String>, PipelineError> {
        if self.is_valid() {
            Ok(self.warnings)
        } else {
            Err(PipelineError::schema(stage, self.errors.join("; ")))
        }
    }
}

/// Trim metadata fields and tidy whitespace in the body.
pub fn normalize_article(article: ExtractedArticle) -> ExtractedArticle {
    ExtractedArticle {
        title: article.title.trim().to_string(),
        author: article.author.trim().to_string(),
        publication_date: article.publication_date.trim().to_string(),
        main_content: normalize_whitespace(&article.main_content),
    }
}

pub fn validate_article(article: &ExtractedArticle) -> ValidationResult {
    let mut result = ValidationResult::default();
    if article.main_content.trim().is_empty() {
        result.add_error("main_content is empty".to_string());
    }
    if article.title.trim().is_empty() {
        result.add_warning("title is empty".to_string());
    }
    result
}

/// Trim entries, drop blank ones, and de-duplicate entities within each category.
///
/// Entity categories are trimmed and lowercased; categories that collide are merged.
///
/// Never pads or truncates the bounded lists; that is left to validation.
pub fn normalize_report(report: AnalysisReport) -> AnalysisReport {
    fn clean(items: Vec<String>) -> Vec<String> {
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    let mut merged: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (category, entities) in report.named_entities {
        let category = category.trim().to_lowercase();
        if !category.is_empty() {
            merged.entry(category).or_default().extend(clean(entities));
        }
    }
    let named_entities = merged
        .into_iter()
        .map(|(category, entities)| (category, entities.into_iter().unique().collect::<Vec<_>>()))
        .filter(|(_, entities)| !entities.is_empty())
        .collect();

    AnalysisReport {
        core_claims: clean(report.core_claims),
        tone_analysis: report.tone_analysis.trim().to_string(),
        red_flags: clean(report.red_flags),
        verification_questions: clean(report.verification_questions),
        named_entities,
        opposing_viewpoint: report.opposing_viewpoint.trim().to_string(),
    }
}

/// Check bounds and required content of an analysis report.
///
/// `article_content` is used for a loose grounding check: a claim sharing no
/// significant words with the article produces a warning.
pub fn validate_report(report: &AnalysisReport, article_content: &str) -> ValidationResult {
    let mut result = ValidationResult::default();

    check_len(
        &mut result,
        "core_claims",
        report.core_claims.len(),
        &CORE_CLAIMS_BOUNDS,
    );
    check_len(
        &mut result,
        "verification_questions",
        report.verification_questions.len(),
        &VERIFICATION_QUESTIONS_BOUNDS,
    );

    if report.tone_analysis.is_empty() {
        result.add_error("tone_analysis is empty".to_string());
    }

    if report.core_claims.iter().duplicates().next().is_some() {
        result.add_warning("core_claims contains duplicates".to_string());
    }

    let content_words = significant_words(article_content);
    for (i, claim) in report.core_claims.iter().enumerate() {
        if significant_words(claim).is_disjoint(&content_words) {
            result.add_warning(format!(
                "claim {} shares no keywords with the article: '{}'",
                i + 1,
                claim.chars().take(80).collect::<String>()
            ));
        }
    }

    for (i, question) in report.verification_questions.iter().enumerate() {
        if !question.ends_with('?') {
            result.add_warning(format!("verification question {} is not a question", i + 1));
        }
    }

    result
}

fn check_len(
    result: &mut ValidationResult,
    field: &str,
    len: usize,
    bounds: &RangeInclusive<usize>,
) {
    if !bounds.contains(&len) {
        result.add_error(format!(
            "{field} must have {}-{} items, got {len}",
            bounds.start(),
            bounds.end()
        ));
    }
}

/// Lowercased words of three or more letters that are not stopwords.
pub fn significant_words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}
