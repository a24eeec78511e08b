//! LLM API interaction.
//!
//! This module talks to an OpenAI-compatible `/chat/completions` endpoint
//! (Groq by default) and maps every provider failure onto
//! [`UpstreamError`].
//!
//! # Architecture
//!
//! - [`LanguageModel`]: Core trait the pipeline stages are written against
//! - [`ChatClient`]: `reqwest` implementation for OpenAI-compatible APIs
//! - [`classify_upstream`]: The single place provider failures are classified
//!
//! Transport failures are not retried; the first error is surfaced.

use crate::config::{AppConfig, ResponseFormat};
use crate::error::{UpstreamError, UpstreamKind};
use crate::utils::truncate_for_log;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// JSON schema a response must conform to.
#[derive(Debug, Clone)]
pub struct OutputSchema {
    /// Schema name sent to the provider, e.g. `"AnalysisReport"`.
    pub name: &'static str,
    pub schema: Value,
}

impl OutputSchema {
    /// Schema for `T`, with the `$schema` meta key removed.
    pub fn of<T: JsonSchema>(name: &'static str) -> Self {
        let mut schema = serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default();
        if let Value::Object(map) = &mut schema {
            map.remove("$schema");
        }
        Self { name, schema }
    }
}

/// One instruction to the model.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub schema: Option<OutputSchema>,
}

/// Trait for async LLM interaction.
///
/// Implementors send an instruction to a model and return the raw text of
/// its reply. Shape checking happens in the pipeline, not here.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, UpstreamError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

/// Client for OpenAI-compatible chat completion APIs.
pub struct ChatClient {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("has_api_key", &self.api_key.is_some())
            .field("response_format", &self.response_format)
            .finish()
    }
}

impl ChatClient {
    pub fn new(config: &AppConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            url: config.completions_url(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            response_format: config.response_format,
        })
    }

    fn headers(&self) -> Result<HeaderMap, UpstreamError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|_| {
                UpstreamError::new(
                    UpstreamKind::Unauthorized,
                    None,
                    "API key contains characters not allowed in an HTTP header",
                )
            })?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    fn response_format_for(&self, schema: Option<&OutputSchema>) -> Option<Value> {
        let schema = schema?;
        Some(match self.response_format {
            ResponseFormat::JsonSchema => json!({
                "type": "json_schema",
                "json_schema": {
                    "name": schema.name,
                    "schema": schema.schema,
                    "strict": false,
                }
            }),
            ResponseFormat::JsonObject => json!({ "type": "json_object" }),
        })
    }
}

#[async_trait]
impl LanguageModel for ChatClient {
    #[instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn complete(&self, request: &CompletionRequest) -> Result<String, UpstreamError> {
        let t0 = Instant::now();
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: self.response_format_for(request.schema.as_ref()),
        };
        debug!(prompt_chars = request.user.len(), "Sending chat completion");

        let response = self
            .http
            .post(&self.url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        let dt = t0.elapsed();

        if !status.is_success() {
            let kind = classify_upstream(Some(status.as_u16()), &text);
            warn!(
                status = status.as_u16(),
                kind = kind.as_str(),
                elapsed_ms = dt.as_millis() as u64,
                body = %truncate_for_log(&text, 300),
                "Chat completion failed"
            );
            return Err(UpstreamError::new(
                kind,
                Some(status.as_u16()),
                provider_message(&text),
            ));
        }

        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            UpstreamError::new(
                UpstreamKind::Other,
                Some(status.as_u16()),
                format!("unreadable completion response: {e}"),
            )
        })?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            UpstreamError::new(UpstreamKind::Other, Some(status.as_u16()), "no choices in response")
        })?;
        if choice.finish_reason.as_deref() == Some("length") {
            warn!(max_tokens = self.max_tokens, "Completion hit the token limit; output is likely truncated");
        }

        let content = choice.message.content.unwrap_or_default();
        info!(
            elapsed_ms = dt.as_millis() as u64,
            chars = content.len(),
            "Chat completion succeeded"
        );
        Ok(content)
    }
}

fn transport_error(e: reqwest::Error) -> UpstreamError {
    let kind = if e.is_timeout() || e.is_connect() {
        UpstreamKind::Unavailable
    } else {
        classify_upstream(e.status().map(|s| s.as_u16()), &e.to_string())
    };
    UpstreamError::new(kind, e.status().map(|s| s.as_u16()), e.to_string())
}

/// Pull `error.message` out of a provider error body, falling back to the raw body.
fn provider_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| truncate_for_log(body.trim(), 500))
}

/// Classify a provider failure.
///
/// Checked in order: the HTTP status, then structured error codes in the
/// JSON body (`error.code`, `error.type`, `error.status`), then substrings
/// of the message text.
pub fn classify_upstream(status: Option<u16>, body: &str) -> UpstreamKind {
    if let Some(kind) = status.and_then(kind_for_status) {
        return kind;
    }

    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let error = value.get("error").unwrap_or(&value);
        for field in ["code", "type", "status"] {
            match error.get(field) {
                Some(Value::String(code)) => {
                    if let Some(kind) = kind_for_code(code) {
                        return kind;
                    }
                }
                Some(Value::Number(n)) => {
                    if let Some(kind) = n
                        .as_u64()
                        .and_then(|n| u16::try_from(n).ok())
                        .and_then(kind_for_status)
                    {
                        return kind;
                    }
                }
                _ => {}
            }
        }
    }

    kind_for_message(body)
}

fn kind_for_status(status: u16) -> Option<UpstreamKind> {
    match status {
        429 => Some(UpstreamKind::RateLimited),
        401 | 403 => Some(UpstreamKind::Unauthorized),
        502 | 503 | 504 | 529 => Some(UpstreamKind::Unavailable),
        _ => None,
    }
}

fn kind_for_code(code: &str) -> Option<UpstreamKind> {
    match code.to_ascii_lowercase().as_str() {
        "rate_limit_exceeded" | "resource_exhausted" | "rate_limit_error" | "insufficient_quota" => {
            Some(UpstreamKind::RateLimited)
        }
        "unavailable" | "overloaded_error" | "service_unavailable" | "server_error" => {
            Some(UpstreamKind::Unavailable)
        }
        "invalid_api_key" | "authentication_error" | "permission_denied" | "unauthenticated"
        | "permission_error" => Some(UpstreamKind::Unauthorized),
        _ => None,
    }
}

fn kind_for_message(message: &str) -> UpstreamKind {
    let m = message.to_ascii_uppercase();
    if m.contains("429") || m.contains("RESOURCE_EXHAUSTED") || m.contains("RATE LIMIT") {
        UpstreamKind::RateLimited
    } else if m.contains("503") || m.contains("UNAVAILABLE") || m.contains("OVERLOADED") {
        UpstreamKind::Unavailable
    } else if m.contains("401") || m.contains("403") || m.contains("API KEY") {
        UpstreamKind::Unauthorized
    } else {
        UpstreamKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnalysisReport;
    use axum::{Json, Router, http::StatusCode, routing::post};
    use tokio::net::TcpListener;

    async fn spawn_provider(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    fn client_for(api_base: String, response_format: ResponseFormat) -> ChatClient {
        let config = AppConfig {
            api_base,
            api_key: Some("test-key".to_string()),
            response_format,
            ..Default::default()
        };
        ChatClient::new(&config).unwrap()
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: "You are a test.".to_string(),
            user: "Say hi".to_string(),
            schema: Some(OutputSchema::of::<AnalysisReport>("AnalysisReport")),
        }
    }

    #[test]
    fn test_classify_by_status() {
        assert_eq!(classify_upstream(Some(429), ""), UpstreamKind::RateLimited);
        assert_eq!(classify_upstream(Some(401), ""), UpstreamKind::Unauthorized);
        assert_eq!(classify_upstream(Some(403), ""), UpstreamKind::Unauthorized);
        assert_eq!(classify_upstream(Some(503), ""), UpstreamKind::Unavailable);
        assert_eq!(classify_upstream(Some(400), "bad request"), UpstreamKind::Other);
    }

    #[test]
    fn test_classify_by_structured_code() {
        let groq = r#"{"error":{"message":"Rate limit reached","type":"tokens","code":"rate_limit_exceeded"}}"#;
        assert_eq!(classify_upstream(Some(400), groq), UpstreamKind::RateLimited);

        let gemini = r#"{"error":{"code":429,"message":"quota","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(classify_upstream(None, gemini), UpstreamKind::RateLimited);

        let openai = r#"{"error":{"message":"Incorrect API key","code":"invalid_api_key"}}"#;
        assert_eq!(classify_upstream(Some(400), openai), UpstreamKind::Unauthorized);
    }

    #[test]
    fn test_classify_by_message_fallback() {
        assert_eq!(
            classify_upstream(None, "upstream said: 503 UNAVAILABLE"),
            UpstreamKind::Unavailable
        );
        assert_eq!(
            classify_upstream(None, "litellm.RateLimitError: 429"),
            UpstreamKind::RateLimited
        );
        assert_eq!(classify_upstream(None, "something odd"), UpstreamKind::Other);
    }

    #[test]
    fn test_output_schema_strips_meta() {
        let schema = OutputSchema::of::<AnalysisReport>("AnalysisReport");
        assert!(schema.schema.get("$schema").is_none());
        assert_eq!(schema.schema["type"], "object");
    }

    #[tokio::test]
    async fn test_complete_returns_message_content() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["model"], "llama-3.3-70b-versatile");
                assert_eq!(body["messages"][0]["role"], "system");
                assert_eq!(body["messages"][1]["content"], "Say hi");
                assert_eq!(body["response_format"]["type"], "json_schema");
                assert_eq!(
                    body["response_format"]["json_schema"]["name"],
                    "AnalysisReport"
                );
                Json(json!({
                    "choices": [{
                        "message": {"role": "assistant", "content": "{\"ok\":true}"},
                        "finish_reason": "stop"
                    }]
                }))
            }),
        );
        let base = spawn_provider(router).await;
        let client = client_for(base, ResponseFormat::JsonSchema);
        let content = client.complete(&request()).await.unwrap();
        assert_eq!(content, "{\"ok\":true}");
    }

    #[tokio::test]
    async fn test_complete_json_object_mode() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["response_format"], json!({"type": "json_object"}));
                Json(json!({"choices": [{"message": {"content": "{}"}, "finish_reason": "stop"}]}))
            }),
        );
        let base = spawn_provider(router).await;
        let client = client_for(base, ResponseFormat::JsonObject);
        assert_eq!(client.complete(&request()).await.unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_complete_maps_rate_limit() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({"error": {"message": "Rate limit reached for model", "code": "rate_limit_exceeded"}})),
                )
            }),
        );
        let base = spawn_provider(router).await;
        let client = client_for(base, ResponseFormat::JsonSchema);
        let err = client.complete(&request()).await.unwrap_err();
        assert_eq!(err.kind, UpstreamKind::RateLimited);
        assert_eq!(err.status, Some(429));
        assert_eq!(err.message, "Rate limit reached for model");
    }

    #[tokio::test]
    async fn test_complete_maps_unauthorized() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::UNAUTHORIZED, "Invalid API Key") }),
        );
        let base = spawn_provider(router).await;
        let client = client_for(base, ResponseFormat::JsonSchema);
        let err = client.complete(&request()).await.unwrap_err();
        assert_eq!(err.kind, UpstreamKind::Unauthorized);
        assert_eq!(err.message, "Invalid API Key");
    }

    #[tokio::test]
    async fn test_connection_refused_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = client_for(format!("http://{addr}/v1"), ResponseFormat::JsonSchema);
        let err = client.complete(&request()).await.unwrap_err();
        assert_eq!(err.kind, UpstreamKind::Unavailable);
    }

    #[test]
    fn test_debug_hides_key() {
        let client = client_for("http://localhost/v1".into(), ResponseFormat::JsonSchema);
        let dbg = format!("{client:?}");
        assert!(!dbg.contains("test-key"));
        assert!(dbg.contains("has_api_key: true"));
    }
}
