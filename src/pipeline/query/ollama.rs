use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::types::LlmClient;
use super::LlmError;
use crate::config::ModelConfig;

/// Ollama HTTP client for local LLM inference.
pub struct OllamaClient {
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout_secs: u64,
    max_request_chars: usize,
    client: reqwest::blocking::Client,
}

impl OllamaClient {
    pub fn from_config(config: &ModelConfig) -> Result<Self, LlmError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
            max_request_chars: config.max_request_chars,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Names of the models installed in the Ollama instance.
    pub fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaTagsResponse = response
            .json()
            .map_err(|e| LlmError::ResponseParsing(e.to_string()))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }

    /// Prefix match, so "gemma3" finds "gemma3:latest".
    pub fn is_model_available(&self, model: &str) -> Result<bool, LlmError> {
        let models = self.list_models()?;
        Ok(models.iter().any(|m| m.starts_with(model)))
    }

    /// True when the server answers at all.
    pub fn health_check(&self) -> bool {
        match self.list_models() {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(base_url = %self.base_url, error = %e, "Ollama health check failed");
                false
            }
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_connect() {
            LlmError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            LlmError::Timeout(self.timeout_secs)
        } else {
            LlmError::HttpClient(e.to_string())
        }
    }
}

/// Request body for Ollama /api/chat
#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

/// Response body from Ollama /api/chat (non-streaming)
#[derive(Deserialize)]
struct OllamaChatResponse {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: String,
}

/// Response body from Ollama /api/tags
#[derive(Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

impl LlmClient for OllamaClient {
    fn generate(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let size = system.chars().count() + user.chars().count();
        if size > self.max_request_chars {
            return Err(LlmError::RequestTooLarge {
                size,
                limit: self.max_request_chars,
            });
        }

        let url = format!("{}/api/chat", self.base_url);
        let body = OllamaChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaChatResponse = response
            .json()
            .map_err(|e| LlmError::ResponseParsing(e.to_string()))?;

        Ok(parsed.message.content)
    }
}

/// Scripted LLM client for tests: replays queued results in order, then
/// falls back to a fixed reply (or an error when none is set).
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    fallback: Option<String>,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<(String, String)>>,
}

impl MockLlmClient {
    pub fn scripted(responses: Vec<Result<String, LlmError>>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            fallback: None,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    /// Same reply on every call.
    pub fn repeating(response: &str) -> Self {
        Self {
            fallback: Some(response.to_string()),
            ..Self::scripted(Vec::new())
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// (system, user) of the most recent call.
    pub fn last_prompt(&self) -> Option<(String, String)> {
        self.last_prompt
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl LlmClient for MockLlmClient {
    fn generate(&self, system: &str, user: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap_or_else(|p| p.into_inner()) =
            Some((system.to_string(), user.to_string()));

        let next = self
            .script
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front();
        match (next, &self.fallback) {
            (Some(result), _) => result,
            (None, Some(reply)) => Ok(reply.clone()),
            (None, None) => Err(LlmError::HttpClient("mock script exhausted".into())),
        }
    }
}
