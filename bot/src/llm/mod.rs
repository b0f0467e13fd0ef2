//! LLM abstraction layer
//!
//! A [`ModelAdapter`] wraps one backend. The orchestrator only ever talks to
//! the trait; which implementation it gets is decided by the `loader` field
//! of the active model config through the [`LoaderRegistry`].

mod ollama;
mod openai;
mod registry;
mod types;

pub use ollama::{list_models, ModelInfo, OllamaModel};
pub use openai::OpenAiModel;
pub use registry::{LoaderConstructor, LoaderRegistry};

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use std::path::{Path, PathBuf};

use crate::config::ModelConfig;

/// Prior exchanges as `(prompt, response)` pairs, oldest first
pub type ChatHistory = [(String, String)];

/// Trait for model backends
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// Prepare the backend for the given config
    ///
    /// On success the adapter reports `is_running() == true`.
    async fn load(&mut self, config: &ModelConfig) -> Result<()>;

    /// Text-only request
    async fn ask(&self, prompt: &str, history: &ChatHistory) -> Result<String>;

    /// Request with images attached to the prompt
    async fn ask_vision(
        &self,
        prompt: &str,
        images: &[PathBuf],
        history: &ChatHistory,
    ) -> Result<String> {
        let _ = (prompt, images, history);
        anyhow::bail!("Loader {} does not accept images", self.name())
    }

    /// Whether `load` succeeded and the adapter can serve requests
    fn is_running(&self) -> bool;

    /// Loader name for logging and status output
    fn name(&self) -> &str;
}

/// Read an image from disk as `(mime type, base64 payload)`
pub(crate) async fn encode_image(path: &Path) -> Result<(&'static str, String)> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image {}", path.display()))?;

    Ok((
        image_mime(path),
        base64::engine::general_purpose::STANDARD.encode(bytes),
    ))
}

fn image_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => "image/jpeg",
    }
}
