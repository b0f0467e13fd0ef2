//! OpenAI-compatible chat completions backend
//!
//! Works against OpenAI itself and the many services that mirror its API
//! (DeepSeek, vLLM, LM Studio, ...). Uses direct HTTP rather than a client
//! SDK so that vendor extensions like `reasoning_content` survive.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

use super::types::{
    ChatCompletionMessage, ChatCompletionRequest, ChatCompletionResponse, ContentPart, ImageUrl,
    MessageContent,
};
use super::{encode_image, ChatHistory, ModelAdapter};
use crate::config::ModelConfig;

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible model adapter
#[derive(Default)]
pub struct OpenAiModel {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    system_prompt: Option<String>,
    temperature: Option<f32>,
    top_p: Option<f32>,
    max_tokens: Option<u32>,
    running: bool,
}

impl OpenAiModel {
    pub fn new() -> Self {
        Self::default()
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn build_messages(
        &self,
        history: &ChatHistory,
        user: ChatCompletionMessage,
    ) -> Vec<ChatCompletionMessage> {
        let mut messages = Vec::with_capacity(history.len() * 2 + 2);

        if let Some(system) = &self.system_prompt {
            messages.push(ChatCompletionMessage::text("system", system.clone()));
        }
        for (prompt, response) in history {
            messages.push(ChatCompletionMessage::text("user", prompt.clone()));
            messages.push(ChatCompletionMessage::text("assistant", response.clone()));
        }
        messages.push(user);

        messages
    }

    async fn send(&self, messages: Vec<ChatCompletionMessage>) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            stream: false,
        };

        tracing::debug!("Sending {} messages to {}", request.messages.len(), self.base_url);

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .authorize(self.http_client.post(&url))
            .json(&request)
            .send()
            .await
            .context("Failed to send chat completion request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Chat completion API error {}: {}", status, body));
        }

        let raw_body = response.text().await.context("Failed to get response text")?;
        let body: ChatCompletionResponse =
            serde_json::from_str(&raw_body).context("Failed to parse chat completion response")?;

        let message = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .context("Chat completion response has no choices")?;

        Ok(merge_reasoning(
            message.reasoning_content,
            message.content.unwrap_or_default(),
        ))
    }
}

/// Fold a separate reasoning channel back into `<think>` tags
fn merge_reasoning(reasoning: Option<String>, content: String) -> String {
    match reasoning {
        Some(reasoning) if !reasoning.trim().is_empty() => {
            format!("<think>{}</think>{}", reasoning, content)
        }
        _ => content,
    }
}

#[async_trait]
impl ModelAdapter for OpenAiModel {
    async fn load(&mut self, config: &ModelConfig) -> Result<()> {
        if config.model_name.is_empty() {
            anyhow::bail!("OpenAI loader requires model_name");
        }

        let base_url = config
            .api_host
            .as_deref()
            .unwrap_or(DEFAULT_OPENAI_URL)
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&base_url).with_context(|| format!("Invalid api_host: {}", base_url))?;

        self.http_client = reqwest::Client::new();
        self.base_url = base_url;
        self.api_key = config.api_key.clone();
        self.model = config.model_name.clone();
        self.system_prompt = config.system_prompt.clone();
        self.temperature = config.temperature;
        self.top_p = config.top_p;
        self.max_tokens = config.max_tokens;

        // Reachability and credential check
        let response = self
            .authorize(self.http_client.get(format!("{}/models", self.base_url)))
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.base_url))?;
        if !response.status().is_success() {
            anyhow::bail!("Model listing at {} returned {}", self.base_url, response.status());
        }

        self.running = true;
        Ok(())
    }

    async fn ask(&self, prompt: &str, history: &ChatHistory) -> Result<String> {
        let messages = self.build_messages(history, ChatCompletionMessage::text("user", prompt));
        self.send(messages).await
    }

    async fn ask_vision(
        &self,
        prompt: &str,
        images: &[PathBuf],
        history: &ChatHistory,
    ) -> Result<String> {
        let mut parts = vec![ContentPart::Text {
            text: prompt.to_string(),
        }];
        for path in images {
            let (mime, data) = encode_image(path).await?;
            parts.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:{};base64,{}", mime, data),
                },
            });
        }

        let user = ChatCompletionMessage {
            role: "user",
            content: MessageContent::Parts(parts),
        };
        let messages = self.build_messages(history, user);
        self.send(messages).await
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn name(&self) -> &str {
        "openai"
    }
}
