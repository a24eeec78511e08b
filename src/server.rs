//! HTTP adapter around the [`Pipeline`].
//!
//! Routes:
//! - `GET /`: the interactive analysis page
//! - `POST /analyze`: `{"url": ...}` → rendered plain-text report
//! - `POST /api/analysis`: `{"url": ...}` → JSON with both stage outputs and the rendered report
//! - `GET /healthz`: liveness probe
//!
//! Failures are returned with the status from [`PipelineError::status_code`]
//! and the explanation from [`PipelineError::explain`].

use crate::error::PipelineError;
use crate::models::{AnalysisReport, ExtractedArticle};
use crate::outputs::{file, report};
use crate::pipeline::Pipeline;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span};

const INDEX_HTML: &str = include_str!("../static/index.html");

pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// Where each successful report is written; `None` disables saving.
    pub output_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub url: String,
    pub article: ExtractedArticle,
    pub report: AnalysisReport,
    pub rendered: String,
    pub analyzed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/analyze", post(analyze_text))
        .route("/api/analysis", post(analyze_json))
        .route("/healthz", get(healthz))
        .with_state(Arc::new(state))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: &str, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Analysis server listening");
    axum::serve(listener, router(state)).await
}

async fn index_page() -> impl IntoResponse {
    Html(INDEX_HTML)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn analyze_text(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Response {
    match state.pipeline.run(&request.url).await {
        Ok(analysis_report) => {
            let rendered = report::render(&analysis_report);
            save(&state, &rendered).await;
            rendered.into_response()
        }
        Err(e) => (e.status_code(), e.explain()).into_response(),
    }
}

async fn analyze_json(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Response {
    match state.pipeline.run_detailed(&request.url).await {
        Ok(analysis) => {
            let rendered = report::render(&analysis.report);
            save(&state, &rendered).await;
            Json(AnalysisResponse {
                url: analysis.url,
                article: analysis.article,
                report: analysis.report,
                rendered,
                analyzed_at: analysis.analyzed_at,
            })
            .into_response()
        }
        Err(e) => error_json(&e),
    }
}

fn error_json(e: &PipelineError) -> Response {
    (
        e.status_code(),
        Json(ErrorBody {
            error: e.code(),
            message: e.explain(),
        }),
    )
        .into_response()
}

/// Persist the report. A failed write is logged and does not fail the request.
async fn save(state: &AppState, rendered: &str) {
    if let Some(path) = &state.output_path {
        if let Err(e) = file::write_report(path, rendered).await {
            error!(path = %path.display(), error = %e, "Could not save report; returning it anyway");
        }
    }
}
