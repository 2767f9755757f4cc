// Copyright 2026 Muvon Un Limited
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::QuizError;
use crate::llm::types::{ChatCompletionBody, ChatCompletionResponse, CompletionRequest};

/// Opaque text completion capability
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint
pub struct OpenAiCompatibleClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            warn!(
                env = %config.api_key_env,
                "No API key found, requests will be sent unauthenticated"
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("Quizforge/1.0")
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatibleClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = serde_json::to_string(&ChatCompletionBody {
            model: &self.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        })?;

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .body(body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .context("Failed to reach completion endpoint")?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read completion response body")?;
        if !status.is_success() {
            anyhow::bail!("Completion request failed with {}: {}", status, text);
        }

        let parsed: ChatCompletionResponse =
            serde_json::from_str(&text).context("Unexpected completion response shape")?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .context("Completion response contained no choices")?;

        if choice.finish_reason.as_deref() == Some("length") {
            // Truncated output is left to the structured-output parsers to reject
            debug!(
                max_tokens = request.max_tokens,
                "Completion stopped at the output token limit"
            );
        }

        Ok(choice.message.content.unwrap_or_default())
    }
}

/// Applies a per-call deadline to another provider
pub struct TimedCompletion {
    inner: Arc<dyn CompletionProvider>,
    timeout: Duration,
}

impl TimedCompletion {
    pub fn new(inner: Arc<dyn CompletionProvider>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl CompletionProvider for TimedCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        match tokio::time::timeout(self.timeout, self.inner.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(QuizError::Timeout(self.timeout).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ChatMessage;
    use crate::testing::{ScriptedCompletion, Stalled};

    fn request() -> CompletionRequest {
        CompletionRequest::deterministic(vec![ChatMessage::user("hi")], 10)
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_completion_reports_timeout() {
        let timed = TimedCompletion::new(Arc::new(Stalled), Duration::from_secs(5));
        let err = timed.complete(&request()).await.unwrap_err();
        assert!(QuizError::is_timeout(&err));
    }

    #[tokio::test]
    async fn test_timed_completion_passes_through() {
        let inner = Arc::new(ScriptedCompletion::new(vec!["hello".to_string()]));
        let timed = TimedCompletion::new(inner, Duration::from_secs(5));
        assert_eq!(timed.complete(&request()).await.unwrap(), "hello");
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"[]"},"finish_reason":"stop"}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("[]"));
        assert_eq!(parsed.choices[0].finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_request_body_shape() {
        let messages = vec![ChatMessage::system("s"), ChatMessage::user("u")];
        let body = ChatCompletionBody {
            model: "gpt-4o-mini",
            messages: &messages,
            max_tokens: 200,
            temperature: 0.0,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["max_tokens"], 200);
    }
}
