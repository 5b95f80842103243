//! Inference backend client.
//!
//! The conversation core treats the LLM as an external collaborator (spec
//! §6): a local HTTP endpoint accepting `{ model, prompt | messages, stream,
//! options }` and returning either a single JSON body or a stream of token
//! chunks. This module never requires structured tool-call tokens from the
//! model — the orchestrator imposes structure on top of plain text.
//!
//! ## KV cache
//!
//! Ollama-compatible backends return a `context` array that can be replayed
//! on the next call to skip re-processing the conversation history. This
//! client caches it per-instance so `generate_with_session` gets the
//! latency win on multi-turn conversations; stateless callers use
//! `generate`, which never reuses context across calls.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::prompt::Message;
use crate::LlmError;

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub model: String,
    pub endpoint: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    /// Keep the model loaded between calls. "5m", "1h", "-1" (indefinite), "0" (unload).
    pub keep_alive: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "qwen2.5:7b-instruct".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            max_tokens: 512,
            temperature: 0.7,
            top_p: 0.9,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            keep_alive: "5m".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub text: String,
    pub tokens: usize,
    pub time_to_first_token_ms: u64,
    pub total_time_ms: u64,
    pub tokens_per_second: f32,
    pub finish_reason: FinishReason,
    /// Opaque context for KV cache reuse in multi-turn conversations.
    pub context: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    Error,
    Cancelled,
}

/// Inference backend trait. An implementation must tolerate being called
/// with both "gated" and "open" tool-calling models — it never assumes the
/// model emits structured tool-call tokens.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError>;

    async fn generate_stream(
        &self,
        messages: &[Message],
        tx: mpsc::Sender<String>,
    ) -> Result<GenerationResult, LlmError>;

    async fn is_available(&self) -> bool;

    fn model_name(&self) -> &str;

    /// Rough token estimate (~4 chars/token), used for context-window budgeting.
    fn estimate_tokens(&self, text: &str) -> usize {
        text.chars().count().max(1) / 4
    }
}

/// HTTP inference backend speaking the Ollama `/api/chat` wire format, the
/// de-facto local-inference contract spec §6 describes.
#[derive(Clone)]
pub struct HttpInferenceBackend {
    client: Client,
    config: LlmConfig,
    session_context: Arc<Mutex<Option<Vec<i64>>>>,
}

impl HttpInferenceBackend {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            session_context: Arc::new(Mutex::new(None)),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.config.endpoint, path)
    }

    /// Generate reusing (and updating) the cached KV-cache context.
    pub async fn generate_with_session(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
        let context = self.session_context.lock().clone();
        let result = self.generate_with_context(messages, context.as_deref()).await?;
        if let Some(ref ctx) = result.context {
            *self.session_context.lock() = Some(ctx.clone());
        }
        Ok(result)
    }

    pub fn clear_session(&self) {
        *self.session_context.lock() = None;
    }

    async fn generate_with_context(
        &self,
        messages: &[Message],
        context: Option<&[i64]>,
    ) -> Result<GenerationResult, LlmError> {
        let start = std::time::Instant::now();

        let request = OllamaChatRequest {
            model: self.config.model.clone(),
            messages: messages.iter().map(OllamaMessage::from).collect(),
            stream: false,
            options: Some(OllamaOptions {
                temperature: Some(self.config.temperature),
                top_p: Some(self.config.top_p),
                num_predict: Some(self.config.max_tokens as i32),
            }),
            keep_alive: Some(self.config.keep_alive.clone()),
            context: context.map(|c| c.to_vec()),
        };

        let mut last_error = None;
        let mut backoff = self.config.initial_backoff;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::warn!(attempt, ?backoff, "inference request failed, retrying");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }

            match self.execute_request(&request).await {
                Ok(result) => {
                    let total_time = start.elapsed();
                    return Ok(GenerationResult {
                        text: result.message.content,
                        tokens: result.eval_count.unwrap_or(0) as usize,
                        time_to_first_token_ms: result.prompt_eval_duration.unwrap_or(0) / 1_000_000,
                        total_time_ms: total_time.as_millis() as u64,
                        tokens_per_second: result.eval_count.unwrap_or(0) as f32
                            / (result.eval_duration.unwrap_or(1) as f32 / 1e9),
                        finish_reason: if result.done { FinishReason::Stop } else { FinishReason::Length },
                        context: result.context,
                    });
                }
                Err(e) if Self::is_retryable(&e) => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::Network("max retries exceeded".to_string())))
    }

    async fn execute_request(&self, request: &OllamaChatRequest) -> Result<OllamaChatResponse, LlmError> {
        let response = self.client.post(self.api_url("/chat")).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error = response.text().await.unwrap_or_default();
            if status.is_server_error() {
                return Err(LlmError::Network(format!("server error {}: {}", status, error)));
            }
            return Err(LlmError::Api(error));
        }

        response.json().await.map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }

    fn is_retryable(error: &LlmError) -> bool {
        matches!(error, LlmError::Network(_) | LlmError::Timeout)
    }
}

#[async_trait]
impl InferenceBackend for HttpInferenceBackend {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
        self.generate_with_context(messages, None).await
    }

    async fn generate_stream(
        &self,
        messages: &[Message],
        tx: mpsc::Sender<String>,
    ) -> Result<GenerationResult, LlmError> {
        let start = std::time::Instant::now();
        let mut first_token_time = None;
        let mut total_tokens = 0usize;
        let mut full_response = String::new();
        let mut final_context = None;

        let cached_context = self.session_context.lock().clone();

        let request = OllamaChatRequest {
            model: self.config.model.clone(),
            messages: messages.iter().map(OllamaMessage::from).collect(),
            stream: true,
            options: Some(OllamaOptions {
                temperature: Some(self.config.temperature),
                top_p: Some(self.config.top_p),
                num_predict: Some(self.config.max_tokens as i32),
            }),
            keep_alive: Some(self.config.keep_alive.clone()),
            context: cached_context,
        };

        let response = self.client.post(self.api_url("/chat")).json(&request).send().await?;
        if !response.status().is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(error));
        }

        use futures::StreamExt;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            let text = String::from_utf8_lossy(&chunk);

            for line in text.lines() {
                if line.is_empty() {
                    continue;
                }
                let Ok(chunk_response) = serde_json::from_str::<OllamaStreamChunk>(line) else {
                    continue;
                };

                if first_token_time.is_none() {
                    first_token_time = Some(start.elapsed());
                }

                let token = &chunk_response.message.content;
                full_response.push_str(token);
                total_tokens += 1;

                if chunk_response.done {
                    final_context = chunk_response.context;
                }

                if tx.send(token.clone()).await.is_err() {
                    return Ok(GenerationResult {
                        text: full_response,
                        tokens: total_tokens,
                        time_to_first_token_ms: first_token_time.map(|t| t.as_millis() as u64).unwrap_or(0),
                        total_time_ms: start.elapsed().as_millis() as u64,
                        tokens_per_second: 0.0,
                        finish_reason: FinishReason::Cancelled,
                        context: final_context,
                    });
                }

                if chunk_response.done {
                    break;
                }
            }
        }

        if let Some(ref ctx) = final_context {
            *self.session_context.lock() = Some(ctx.clone());
        }

        let total_time = start.elapsed();
        Ok(GenerationResult {
            text: full_response,
            tokens: total_tokens,
            time_to_first_token_ms: first_token_time.map(|t| t.as_millis() as u64).unwrap_or(0),
            total_time_ms: total_time.as_millis() as u64,
            tokens_per_second: total_tokens as f32 / total_time.as_secs_f32(),
            finish_reason: FinishReason::Stop,
            context: final_context,
        })
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/api/tags", self.config.endpoint))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<Vec<i64>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

impl From<&Message> for OllamaMessage {
    fn from(m: &Message) -> Self {
        Self { role: m.role.to_string(), content: m.content.clone() }
    }
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
    done: bool,
    #[serde(default)]
    context: Option<Vec<i64>>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    eval_duration: Option<u64>,
    #[serde(default)]
    prompt_eval_duration: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct OllamaStreamChunk {
    message: OllamaMessage,
    done: bool,
    #[serde(default)]
    context: Option<Vec<i64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let config = LlmConfig::default();
        assert!(config.max_tokens > 0);
        assert!(config.max_retries >= 1);
    }

    #[tokio::test]
    async fn backend_construction_does_not_panic() {
        let backend = HttpInferenceBackend::new(LlmConfig::default()).unwrap();
        assert_eq!(backend.model_name(), "qwen2.5:7b-instruct");
    }
}
