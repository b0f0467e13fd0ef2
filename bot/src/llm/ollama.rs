//! Ollama LLM implementation

use anyhow::{Context, Result};
use async_trait::async_trait;
use ollama_rs::{
    generation::{
        chat::{request::ChatMessageRequest, ChatMessage},
        images::Image,
    },
    Ollama,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::{encode_image, ChatHistory, ModelAdapter};
use crate::config::ModelConfig;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Information about an available model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: u64,
    pub modified_at: String,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    models: Vec<ModelInfo>,
}

/// List available models from Ollama
pub async fn list_models(ollama_url: &str) -> Result<Vec<ModelInfo>> {
    let url = parse_url(ollama_url)?;

    let client = reqwest::Client::new();
    let api_url = format!("{}api/tags", url);

    let response: OllamaTagsResponse = client
        .get(&api_url)
        .send()
        .await
        .with_context(|| format!("Failed to reach Ollama at {}", url))?
        .error_for_status()?
        .json()
        .await?;

    Ok(response.models)
}

fn parse_url(raw: &str) -> Result<url::Url> {
    url::Url::parse(raw).with_context(|| format!("Invalid Ollama URL: {}", raw))
}

/// Ollama-backed model adapter
#[derive(Default)]
pub struct OllamaModel {
    client: Option<Ollama>,
    model: String,
    system_prompt: Option<String>,
}

impl OllamaModel {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self) -> Result<&Ollama> {
        self.client
            .as_ref()
            .context("Ollama model used before load")
    }

    fn build_messages(&self, history: &ChatHistory, user: ChatMessage) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() * 2 + 2);

        if let Some(system) = &self.system_prompt {
            messages.push(ChatMessage::system(system.clone()));
        }
        for (prompt, response) in history {
            messages.push(ChatMessage::user(prompt.clone()));
            messages.push(ChatMessage::assistant(response.clone()));
        }
        messages.push(user);

        messages
    }

    async fn send(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let request = ChatMessageRequest::new(self.model.clone(), messages);
        let response = self
            .client()?
            .send_chat_messages(request)
            .await
            .context("Ollama chat request failed")?;

        Ok(response.message.content)
    }
}

#[async_trait]
impl ModelAdapter for OllamaModel {
    async fn load(&mut self, config: &ModelConfig) -> Result<()> {
        if config.model_name.is_empty() {
            anyhow::bail!("Ollama loader requires model_name");
        }

        let raw_url = config.api_host.as_deref().unwrap_or(DEFAULT_OLLAMA_URL);
        let url = parse_url(raw_url)?;
        let host = url.host_str().unwrap_or("localhost").to_string();
        let port = url.port().unwrap_or(11434);

        // Fails fast when the server is unreachable
        let models = list_models(raw_url).await?;
        if !models.iter().any(|m| m.name == config.model_name) {
            tracing::warn!(
                "Model {} is not pulled on {}, first request may be slow",
                config.model_name,
                raw_url
            );
        }

        self.client = Some(Ollama::new(format!("{}://{}", url.scheme(), host), port));
        self.model = config.model_name.clone();
        self.system_prompt = config.system_prompt.clone();
        Ok(())
    }

    async fn ask(&self, prompt: &str, history: &ChatHistory) -> Result<String> {
        let messages = self.build_messages(history, ChatMessage::user(prompt.to_string()));
        self.send(messages).await
    }

    async fn ask_vision(
        &self,
        prompt: &str,
        images: &[PathBuf],
        history: &ChatHistory,
    ) -> Result<String> {
        let mut encoded = Vec::with_capacity(images.len());
        for path in images {
            let (_, data) = encode_image(path).await?;
            encoded.push(Image::from_base64(data));
        }

        let user = ChatMessage::user(prompt.to_string()).with_images(encoded);
        let messages = self.build_messages(history, user);
        self.send(messages).await
    }

    fn is_running(&self) -> bool {
        self.client.is_some()
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
