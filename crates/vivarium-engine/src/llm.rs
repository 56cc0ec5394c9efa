//! HTTP inference backends.
//!
//! Defines an enum-based dispatch over the supported model-server shapes,
//! avoiding the dyn-compatibility issues with async trait methods. Both
//! backends communicate over HTTP via `reqwest` and satisfy the core
//! [`InferenceProvider`] contract: the engine does not care what model sits
//! behind the endpoint, it sends a request and expects text containing
//! JSON.
//!
//! - [`CompletionBackend`] -- llama.cpp-style raw `/completion` endpoint
//!   with ChatML wrapping.
//! - [`OpenAiBackend`] -- OpenAI-compatible `/chat/completions` endpoint
//!   (also fits Ollama and most local inference servers).

use vivarium_core::config::{BackendKind, InferenceConfig};
use vivarium_core::decision::{InferenceProvider, InferenceRequest, ProviderError};

/// Tokens requested per completion call.
const MAX_COMPLETION_TOKENS: u32 = 256;

/// Sampling temperature; low, because the reply must be strict JSON.
const COMPLETION_TEMPERATURE: f64 = 0.25;

/// An HTTP inference backend of either supported shape.
pub enum LlmBackend {
    /// llama.cpp-style raw completion API.
    Completion(CompletionBackend),
    /// OpenAI-compatible chat completions API.
    OpenAi(OpenAiBackend),
}

impl LlmBackend {
    /// Construct the backend selected by configuration.
    pub fn from_config(config: &InferenceConfig) -> Self {
        match config.backend {
            BackendKind::Completion => Self::Completion(CompletionBackend::new(config)),
            BackendKind::OpenAi => Self::OpenAi(OpenAiBackend::new(config)),
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Completion(_) => "completion",
            Self::OpenAi(_) => "openai-compatible",
        }
    }
}

impl InferenceProvider for LlmBackend {
    async fn infer(&self, request: &InferenceRequest) -> Result<String, ProviderError> {
        match self {
            Self::Completion(backend) => backend.complete(request).await,
            Self::OpenAi(backend) => backend.complete(request).await,
        }
    }
}

impl core::fmt::Debug for LlmBackend {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LlmBackend")
            .field("kind", &self.name())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// llama.cpp-style completion backend
// ---------------------------------------------------------------------------

/// Backend for llama.cpp-style `/completion` endpoints.
///
/// Wraps the request in ChatML markers and stops generation at the
/// end-of-turn marker. No API key or model name is involved; the server
/// serves whatever weights it was started with.
pub struct CompletionBackend {
    client: reqwest::Client,
    api_url: String,
}

impl CompletionBackend {
    /// Create a new completion backend.
    pub fn new(config: &InferenceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
        }
    }

    /// Send a request and return the raw completion text.
    async fn complete(&self, request: &InferenceRequest) -> Result<String, ProviderError> {
        let url = format!("{}/completion", self.api_url);

        let prompt = format!(
            "<|im_start|>system\n{}\n\n{}<|im_end|>\n<|im_start|>assistant\n",
            request.system, request.user
        );
        let body = serde_json::json!({
            "prompt": prompt,
            "n_predict": MAX_COMPLETION_TOKENS,
            "temperature": COMPLETION_TEMPERATURE,
            "stop": ["<|im_end|>"],
            "stream": false,
        });

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Unreachable {
                message: format!("completion request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(ProviderError::Response {
                message: format!("completion endpoint returned {status}: {error_body}"),
            });
        }

        let json: serde_json::Value =
            response.json().await.map_err(|e| ProviderError::Response {
                message: format!("completion response parse failed: {e}"),
            })?;

        extract_completion_content(&json)
    }
}

/// Extract the text from a llama.cpp `/completion` response.
fn extract_completion_content(json: &serde_json::Value) -> Result<String, ProviderError> {
    json.get("content")
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| ProviderError::Response {
            message: "completion response missing content".to_owned(),
        })
}

// ---------------------------------------------------------------------------
// OpenAI-compatible backend
// ---------------------------------------------------------------------------

/// Backend for OpenAI-compatible chat completions APIs.
///
/// Sends requests to `{api_url}/chat/completions` with JSON response mode
/// enabled. The `Authorization` header is only attached when an API key is
/// configured, so unauthenticated local servers work out of the box.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAiBackend {
    /// Create a new OpenAI-compatible backend.
    pub fn new(config: &InferenceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    /// Send a request and return the raw response text.
    async fn complete(&self, request: &InferenceRequest) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.api_url);

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user}
            ],
            "temperature": COMPLETION_TEMPERATURE,
            "max_tokens": MAX_COMPLETION_TOKENS,
            "response_format": {"type": "json_object"}
        });

        let mut http_request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if !self.api_key.is_empty() {
            http_request = http_request.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = http_request
            .send()
            .await
            .map_err(|e| ProviderError::Unreachable {
                message: format!("chat completions request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(ProviderError::Response {
                message: format!("chat completions endpoint returned {status}: {error_body}"),
            });
        }

        let json: serde_json::Value =
            response.json().await.map_err(|e| ProviderError::Response {
                message: format!("chat completions response parse failed: {e}"),
            })?;

        extract_openai_content(&json)
    }
}

/// Extract the text content from an OpenAI-style chat completions response.
fn extract_openai_content(json: &serde_json::Value) -> Result<String, ProviderError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| ProviderError::Response {
            message: "chat completions response missing choices[0].message.content".to_owned(),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn extract_completion_content_valid() {
        let json = serde_json::json!({
            "content": "{\"alice\": {\"action\": \"go_cafe\"}}",
            "stop": true
        });
        let result = extract_completion_content(&json).unwrap();
        assert!(result.contains("go_cafe"));
    }

    #[test]
    fn extract_completion_content_missing() {
        let json = serde_json::json!({"error": "loading model"});
        assert!(extract_completion_content(&json).is_err());
    }

    #[test]
    fn extract_openai_content_valid() {
        let json = serde_json::json!({
            "choices": [{
                "message": {
                    "content": "{\"bob\": {\"action\": \"idle\"}}"
                }
            }]
        });
        let result = extract_openai_content(&json).unwrap();
        assert!(result.contains("idle"));
    }

    #[test]
    fn extract_openai_content_missing_choices() {
        let json = serde_json::json!({"error": "rate_limit"});
        assert!(extract_openai_content(&json).is_err());
    }

    #[test]
    fn from_config_dispatches_on_backend_kind() {
        let completion_config = InferenceConfig::default();
        assert_eq!(LlmBackend::from_config(&completion_config).name(), "completion");

        let openai_config = InferenceConfig {
            backend: BackendKind::OpenAi,
            ..InferenceConfig::default()
        };
        assert_eq!(
            LlmBackend::from_config(&openai_config).name(),
            "openai-compatible"
        );
    }
}
