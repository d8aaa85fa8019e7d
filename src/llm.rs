use crate::config::{GenerationConfig, Provider};
use crate::error::{NlqError, Result};
use crate::prompt::Prompt;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::fmt;
use tracing::{debug, info, warn};

/// Unparsed text returned by the generation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCompletion(String);

impl RawCompletion {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RawCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Anything that turns a prompt into a completion.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &Prompt) -> Result<RawCompletion>;
}

/// Failure of a single HTTP attempt, split by whether retrying can help.
#[derive(Debug)]
enum CallError {
    Transient(String),
    Fatal(String),
}

impl CallError {
    fn is_transient(&self) -> bool {
        matches!(self, CallError::Transient(_))
    }

    fn into_message(self) -> String {
        match self {
            CallError::Transient(msg) | CallError::Fatal(msg) => msg,
        }
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::Transient(msg) | CallError::Fatal(msg) => f.write_str(msg),
        }
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// HTTP client for Gemini or an OpenAI-compatible chat endpoint.
#[derive(Clone)]
pub struct LlmClient {
    config: GenerationConfig,
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl LlmClient {
    pub fn new(config: GenerationConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NlqError::Config(format!("Failed to build HTTP client: {}", e)))?;
        let retry = RetryPolicy::with_max_retries(config.max_retries);

        Ok(Self { config, http, retry })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn call_once(&self, api_key: &str, prompt: &str) -> std::result::Result<String, CallError> {
        match self.config.provider {
            Provider::Gemini => self.call_gemini(api_key, prompt).await,
            Provider::OpenAi => self.call_openai(api_key, prompt).await,
        }
    }

    async fn call_gemini(&self, api_key: &str, prompt: &str) -> std::result::Result<String, CallError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );
        let body = serde_json::json!({
            "contents": [
                {"role": "user", "parts": [{"text": prompt}]}
            ],
            "generationConfig": {"temperature": 0.1}
        });

        let request = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&body);

        let response_json = send_json(request).await?;
        parse_gemini_response(&response_json).map_err(CallError::Fatal)
    }

    async fn call_openai(&self, api_key: &str, prompt: &str) -> std::result::Result<String, CallError> {
        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": "You translate questions into SQLite SELECT queries."},
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.1,
        });

        // Reasoning models spend completion tokens on reasoning
        if self.config.model.starts_with("gpt-5") || self.config.model.contains("o1") {
            body["max_completion_tokens"] = serde_json::json!(2000);
        } else {
            body["max_tokens"] = serde_json::json!(500);
        }

        let request = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body);

        let response_json = send_json(request).await?;
        parse_openai_response(&response_json).map_err(CallError::Fatal)
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, prompt: &Prompt) -> Result<RawCompletion> {
        let api_key = self.config.credential()?;

        info!(
            "Requesting SQL from {:?} model {}",
            self.config.provider, self.config.model
        );
        debug!("Prompt length: {} chars", prompt.len());

        let text = self
            .retry
            .retry_with_backoff(|| self.call_once(api_key, prompt.as_str()), CallError::is_transient)
            .await
            .map_err(|e| NlqError::GenerationService(e.into_message()))?;

        Ok(RawCompletion::new(text))
    }
}

async fn send_json(request: reqwest::RequestBuilder) -> std::result::Result<serde_json::Value, CallError> {
    let response = request.send().await.map_err(|e| {
        let msg = format!("LLM API call failed: {}", e);
        if e.is_timeout() || e.is_connect() {
            CallError::Transient(msg)
        } else {
            CallError::Fatal(msg)
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let msg = format!("LLM API error ({}): {}", status, error_text);
        return Err(if is_transient_status(status) {
            CallError::Transient(msg)
        } else {
            CallError::Fatal(msg)
        });
    }

    response
        .json()
        .await
        .map_err(|e| CallError::Fatal(format!("Failed to parse LLM response: {}", e)))
}

fn parse_gemini_response(response_json: &serde_json::Value) -> std::result::Result<String, String> {
    if let Some(error) = response_json.get("error") {
        return Err(format!("LLM API error: {}", error));
    }

    if let Some(reason) = response_json
        .get("promptFeedback")
        .and_then(|f| f.get("blockReason"))
        .and_then(|r| r.as_str())
    {
        return Err(format!("Prompt was blocked by the service: {}", reason));
    }

    let candidate = response_json
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| format!("No candidates in LLM response. Response: {}", response_json))?;

    if let Some(reason) = candidate.get("finishReason").and_then(|r| r.as_str()) {
        match reason {
            "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" => {
                return Err(format!("LLM response was filtered: {}", reason));
            }
            "MAX_TOKENS" => warn!("LLM response was truncated due to length limit"),
            _ => {}
        }
    }

    let text: String = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(format!("Empty content in LLM response. Response: {}", response_json));
    }
    Ok(text)
}

fn parse_openai_response(response_json: &serde_json::Value) -> std::result::Result<String, String> {
    if let Some(error) = response_json.get("error") {
        return Err(format!("LLM API error: {}", error));
    }

    let choice = response_json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| format!("No choices in LLM response. Response: {}", response_json))?;

    match choice.get("finish_reason").and_then(|r| r.as_str()) {
        Some("content_filter") => {
            return Err("LLM response was filtered by content policy".to_string());
        }
        Some("length") => warn!("LLM response was truncated due to length limit"),
        _ => {}
    }

    let content = choice["message"]["content"].as_str().unwrap_or_default();
    if content.is_empty() {
        return Err(format!("Empty content in LLM response. Response: {}", response_json));
    }
    Ok(content.to_string())
}
