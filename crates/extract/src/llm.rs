use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Capability interface over the extraction service. Tests substitute a
/// deterministic backend; production uses [`ChatClient`].
pub trait ChatBackend {
    fn complete(
        &self,
        system: &str,
        user: &str,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Client for an OpenAI-compatible chat-completions endpoint (DeepSeek in
/// production). Non-streaming, JSON-forced, low temperature for stable
/// structured output.
#[derive(Clone)]
pub struct ChatClient {
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl ChatClient {
    pub fn new(base_url: String, api_key: String, model: String, timeout: Duration) -> Self {
        Self {
            base_url,
            api_key,
            model,
            timeout,
            client: reqwest::Client::new(),
        }
    }

    /// Configuration from `DEEPSEEK_API_KEY` / `DEEPSEEK_BASE_URL` /
    /// `DEEPSEEK_MODEL`.
    pub fn from_env() -> Result<Self> {
        let api_key =
            std::env::var("DEEPSEEK_API_KEY").context("DEEPSEEK_API_KEY is not set")?;
        let base_url = std::env::var("DEEPSEEK_BASE_URL")
            .unwrap_or_else(|_| "https://api.deepseek.com".to_string());
        let model = std::env::var("DEEPSEEK_MODEL")
            .unwrap_or_else(|_| "deepseek-chat".to_string());

        Ok(Self::new(base_url, api_key, model, Duration::from_secs(120)))
    }

    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: 0.1,
            max_tokens: 3000,
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to extraction service")?;

        if !response.status().is_success() {
            anyhow::bail!("Extraction service request failed: {}", response.status());
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse extraction service response")?;

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .context("Extraction service returned no choices")?;

        Ok(choice.message.content)
    }
}

impl ChatBackend for ChatClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        self.generate(system, user).await
    }
}
