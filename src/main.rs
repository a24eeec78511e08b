//! # Patrakaarita
//!
//! A news article analyzer. Given the URL of a news article it fetches the
//! page, has a language model isolate the article, then has the model produce
//! a media-literacy report: core factual claims, tone, red flags, questions
//! worth asking, named entities, and an opposing viewpoint.
//!
//! ## Usage
//!
//! ```sh
//! patrakaarita analyze https://example.com/news/story
//! patrakaarita serve --bind 127.0.0.1:8000
//! ```
//!
//! ## Architecture
//!
//! 1. **Fetching**: Download the page and reduce it to visible text
//! 2. **Extraction**: Model isolates title, author, date, and body
//! 3. **Analysis**: Model produces the structured report, which is validated
//! 4. **Output**: Render the report as plain text, print or serve it, and save it

use clap::Parser;
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod error;
mod models;
mod outputs;
mod pipeline;
mod prompts;
mod scrapers;
mod server;
mod utils;
mod validation;

use api::ChatClient;
use cli::{Cli, Command};
use config::AppConfig;
use models::Analysis;
use outputs::{file, report};
use pipeline::Pipeline;
use scrapers::HttpFetcher;
use server::AppState;

const PREVIEW_CHARS: usize = 200;

#[tokio::main]
#[instrument]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = AppConfig::load(args.config.as_deref())?;
    if config.api_key.is_none() {
        warn!("No API key configured (LLM_API_KEY, GROQ_API_KEY, or OPENAI_API_KEY); requests will likely be rejected");
    }

    let pipeline = Arc::new(Pipeline::new(
        &config,
        Arc::new(HttpFetcher::new(&config)?),
        Arc::new(ChatClient::new(&config)?),
    ));

    match args.command {
        Command::Analyze { url, json, output } => {
            let output_path = output.resolve(&config.output_path);
            analyze_once(&pipeline, &url, json, output_path.as_deref()).await
        }
        Command::Serve { bind, output } => {
            let state = AppState {
                pipeline,
                output_path: output.resolve(&config.output_path),
            };
            server::serve(&bind, state).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Analyze one URL and print the result to stdout.
async fn analyze_once(
    pipeline: &Pipeline,
    url: &str,
    json: bool,
    output_path: Option<&std::path::Path>,
) -> Result<ExitCode, Box<dyn Error>> {
    let start_time = std::time::Instant::now();

    let analysis = match pipeline.run_detailed(url).await {
        Ok(analysis) => analysis,
        Err(e) => {
            error!(code = e.code(), error = %e, "Analysis failed");
            eprintln!("{}", e.explain());
            return Ok(ExitCode::FAILURE);
        }
    };

    let rendered = report::render(&analysis.report);
    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        println!("{}", console_report(&analysis, &rendered));
    }

    if let Some(path) = output_path {
        if let Err(e) = file::write_report(path, &rendered).await {
            error!(path = %path.display(), error = %e, "Failed to save report");
        }
    }

    info!(
        elapsed_secs = start_time.elapsed().as_secs_f64(),
        "Analysis complete"
    );
    Ok(ExitCode::SUCCESS)
}

/// Stage one summary followed by the rendered report.
fn console_report(analysis: &Analysis, rendered: &str) -> String {
    let article = &analysis.article;
    let or_unknown = |s: &str| {
        if s.is_empty() {
            "Unknown".to_string()
        } else {
            s.to_string()
        }
    };
    let rule = "=".repeat(60);

    [
        rule.clone(),
        "RESEARCH OUTPUT".to_string(),
        rule.clone(),
        format!("Title: {}", or_unknown(&article.title)),
        format!("Author: {}", or_unknown(&article.author)),
        format!("Date: {}", or_unknown(&article.publication_date)),
        format!("Content preview: {}", article.preview(PREVIEW_CHARS)),
        String::new(),
        rule.clone(),
        "ANALYSIS OUTPUT".to_string(),
        rule,
        rendered.to_string(),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisReport, ExtractedArticle};
    use chrono::Utc;

    #[test]
    fn test_console_report_sections() {
        let analysis = Analysis {
            url: "https://example.com/a".to_string(),
            article: ExtractedArticle {
                title: "X".to_string(),
                main_content: "b".repeat(250),
                ..Default::default()
            },
            report: AnalysisReport::default(),
            analyzed_at: Utc::now(),
        };
        let text = console_report(&analysis, "CORE CLAIMS\n");
        assert!(text.contains("RESEARCH OUTPUT"));
        assert!(text.contains("Title: X\n"));
        assert!(text.contains("Author: Unknown\n"));
        assert!(text.contains("Date: Unknown\n"));
        assert!(text.contains(&format!("Content preview: {}...\n", "b".repeat(200))));
        assert!(text.ends_with("ANALYSIS OUTPUT\n============================================================\nCORE CLAIMS\n"));
    }
}
