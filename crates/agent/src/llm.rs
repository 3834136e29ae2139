use std::time::Duration;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_url: String,
    pub model: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(3),
            max_retries: 2,
        }
    }
}

/// Chat-completions client for any OpenAI-compatible endpoint. The key
/// stays wrapped in a [`SecretString`] and is only exposed into the
/// Authorization header, never into logs or errors.
pub struct HttpLlmClient {
    http: reqwest::Client,
    config: LlmConfig,
    api_key: SecretString,
}

impl HttpLlmClient {
    pub fn new(config: LlmConfig, api_key: SecretString) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("build completion http client")?;
        Ok(Self { http, config, api_key })
    }

    async fn request(&self, body: &serde_json::Value) -> Result<String> {
        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .context("completion request failed")?
            .error_for_status()
            .context("completion endpoint returned an error status")?;

        let completion: ChatCompletion =
            response.json().await.context("completion body was not valid JSON")?;
        first_choice_content(completion)
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0,
            "max_tokens": 256,
        });

        let mut attempt = 0u32;
        loop {
            match self.request(&body).await {
                Ok(content) => return Ok(content),
                Err(error) if attempt < self.config.max_retries => {
                    attempt += 1;
                    let backoff = Duration::from_millis(200 * 2u64.pow(attempt - 1));
                    debug!(attempt, error = %error, "completion attempt failed, retrying");
                    tokio::time::sleep(backoff).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

fn first_choice_content(completion: ChatCompletion) -> Result<String> {
    completion
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| anyhow::anyhow!("completion had no choices"))
}
