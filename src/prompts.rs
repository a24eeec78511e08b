//! Prompts for the extraction and analysis stages.

use crate::api::OutputSchema;
use crate::models::{ExtractedArticle, RawPage};

/// System prompt for the extraction stage
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are a web content extractor. You receive the visible text of a news web page and return the article it contains, cleanly separated from everything else on the page.

## Rules

1. Return the article **title**, **author** (empty string if not stated), **publication_date** exactly as printed on the page (empty string if not stated), and **main_content**.
2. main_content must contain all paragraphs of the article body, in order, verbatim.
3. Remove everything that is not the article: navigation, ads, newsletter prompts, related-story lists, share buttons, cookie notices, comments, and photo credits.
4. Do not summarise, paraphrase, translate, or add text.
5. Page metadata hints may be wrong; prefer what the article text itself says.

Respond with a single JSON object and nothing else."#;

/// System prompt for the analysis stage
pub const ANALYSIS_SYSTEM_PROMPT: &str = r#"You are a critical thinking partner for news readers. You analyze an article for its factual claims, tone, bias indicators, and what a reader should verify. You never judge whether the article is true.

## Sections

1. **core_claims**: 3 to 5 main factual claims made in the article. Each must be an assertion of fact drawn from the text, not an opinion, and phrased as one sentence.
2. **tone_analysis**: a short classification of the language and tone (for example neutral, emotional, persuasive, sensational) followed by a one or two sentence justification citing wording from the text.
3. **red_flags**: indicators of bias or weak reporting, such as anonymous sourcing, loaded language, missing context, one-sided quotes, or unsupported statistics. Return an empty list if there are none; do not invent issues.
4. **verification_questions**: 3 to 4 actionable questions the reader should ask to verify the claims, each ending with a question mark.
5. **named_entities**: key people, organizations, and locations, as an object mapping a lowercase category ("person", "organization", "location", ...) to a list of names.
6. **opposing_viewpoint**: one paragraph summarising the article from a deliberately adversarial, opposing perspective.

Respond with a single JSON object and nothing else."#;

/// Build the extraction stage user prompt from a fetched page.
pub fn extraction_prompt(page: &RawPage, content: &str, schema: Option<&OutputSchema>) -> String {
    let mut prompt = format!("URL: {}\n", page.url);
    for (label, hint) in [
        ("Title hint", &page.title_hint),
        ("Author hint", &page.author_hint),
        ("Date hint", &page.date_hint),
    ] {
        if let Some(hint) = hint {
            prompt.push_str(&format!("{label}: {hint}\n"));
        }
    }
    push_schema(&mut prompt, schema);
    prompt.push_str("\nPage text:\n");
    prompt.push_str(content);
    prompt
}

/// Build the analysis stage user prompt from an extracted article.
pub fn analysis_prompt(article: &ExtractedArticle, schema: Option<&OutputSchema>) -> String {
    let mut prompt = String::new();
    if !article.title.is_empty() {
        prompt.push_str(&format!("Title: {}\n", article.title));
    }
    if !article.publication_date.is_empty() {
        prompt.push_str(&format!("Published: {}\n", article.publication_date));
    }
    push_schema(&mut prompt, schema);
    prompt.push_str("\nArticle text:\n");
    prompt.push_str(&article.main_content);
    prompt
}

fn push_schema(prompt: &mut String, schema: Option<&OutputSchema>) {
    if let Some(schema) = schema {
        prompt.push_str(&format!(
            "\nThe JSON object must match this JSON schema:\n{}\n",
            schema.schema
        ));
    }
}

/// Follow-up instruction sent when the previous reply was rejected.
pub fn reask_note(reason: &str) -> String {
    format!(
        "\n\nYour previous reply was rejected because: {reason}. Reply again with a corrected JSON object."
    )
}
