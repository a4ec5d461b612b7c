//! OpenAI chat completions client.

use async_trait::async_trait;
use docrag_core::{Backoff, GenerateError, GenerationRequest, Generator};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default chat model.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Generator backed by the OpenAI `/chat/completions` endpoint.
///
/// Only rate limiting (429) is retried here. A server error may come after
/// the model already produced output, so it is reported instead.
pub struct OpenAiGenerator {
    client: Client,
    endpoint: String,
    model: String,
    backoff: Backoff,
}

impl OpenAiGenerator {
    /// Create a client for `model` at `base_url`.
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Result<Self, GenerateError> {
        if api_key.trim().is_empty() {
            return Err(GenerateError::Request("missing OpenAI API key".to_string()));
        }

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|e| GenerateError::Request(format!("invalid OpenAI API key: {e}")))?;
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| GenerateError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
            backoff: Backoff::default(),
        })
    }

    /// Create a client for the default model and endpoint.
    pub fn with_defaults(api_key: &str) -> Result<Self, GenerateError> {
        Self::new(api_key, DEFAULT_BASE_URL, DEFAULT_MODEL)
    }

    /// Use a different retry schedule for rate limiting.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerateError> {
        let body = ChatRequest {
            model: &self.model,
            temperature: request.temperature,
            messages: [
                Message {
                    role: "system",
                    content: request.system,
                },
                Message {
                    role: "user",
                    content: request.prompt,
                },
            ],
        };

        let mut attempt = 0u32;
        let resp = loop {
            let resp = self
                .client
                .post(&self.endpoint)
                .json(&body)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        GenerateError::Timeout(e.to_string())
                    } else {
                        GenerateError::Request(e.to_string())
                    }
                })?;

            if resp.status().as_u16() != 429 || attempt >= self.backoff.max_retries {
                break resp;
            }
            attempt += 1;
            let delay = self.backoff.delay(attempt);
            warn!(
                "Chat completion rate limited, retrying in {:?} ({}/{})",
                delay, attempt, self.backoff.max_retries
            );
            tokio::time::sleep(delay).await;
        };

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(GenerateError::Request(format!(
                "OpenAI chat request failed ({status}): {text}"
            )));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| GenerateError::Request(format!("failed to parse chat response: {e}")))?;

        let answer = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(GenerateError::EmptyResponse)?;

        debug!("Generated {} chars with {}", answer.len(), self.model);
        Ok(answer)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [Message<'a>; 2],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}
