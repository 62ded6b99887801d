//! Reqwest-based OpenAI chat-completion client

use cascade_core::{CascadeError, CascadeResult};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Reasoning model used for both discovery passes.
pub const DISCOVERY_MODEL: &str = "gpt-5.2";

/// Cheap model used for one-word category classification.
pub const CLASSIFIER_MODEL: &str = "gpt-4o-mini";

/// LLM calls can run long under high reasoning effort.
const LLM_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAiClient {
    /// Create a client reading `OPENAI_API_KEY` from the environment.
    pub fn new() -> CascadeResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| CascadeError::config("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self::with_api_key(api_key))
    }

    /// Create a client with an explicit API key.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(LLM_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key: api_key.into(),
            model: DISCOVERY_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Make a chat-completion call requiring strict-JSON output and return the
    /// parsed object.
    ///
    /// HTTP 429 maps to [`CascadeError::RateLimited`]; the caller owns the
    /// decision to back off and retry. No retries happen here.
    #[instrument(skip(self, system_prompt, user_prompt))]
    pub async fn chat_json(&self, system_prompt: &str, user_prompt: &str) -> CascadeResult<Value> {
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "reasoning_effort": "high",
            "response_format": {"type": "json_object"},
        });

        let content = self.send_chat(&payload).await?;

        serde_json::from_str(&content)
            .map_err(|e| CascadeError::parse(format!("Model returned invalid JSON: {}", e)))
    }

    /// Make a plain chat-completion call and return the raw text content.
    /// Used by the classifier, which expects a single category name back.
    #[instrument(skip(self, prompt))]
    pub async fn chat_text(&self, prompt: &str, max_tokens: u32) -> CascadeResult<String> {
        let payload = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": max_tokens,
            "temperature": 0,
        });

        self.send_chat(&payload).await
    }

    async fn send_chat(&self, payload: &Value) -> CascadeResult<String> {
        let url = format!("{}/chat/completions", OPENAI_API_BASE);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CascadeError::network(format!("OpenAI request timed out: {}", e))
                } else {
                    CascadeError::network(format!("OpenAI request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(CascadeError::rate_limited(body));
            }
            return Err(CascadeError::api(format!(
                "OpenAI API error ({}): {}",
                status, body
            )));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            CascadeError::parse(format!("Failed to parse chat completion response: {}", e))
        })?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CascadeError::parse("No content in chat completion response"))?;

        debug!(model = %self.model, bytes = content.len(), "chat completion received");
        Ok(content)
    }
}
