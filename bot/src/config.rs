//! Configuration loading
//!
//! The bot reads a single `.muice.toml`:
//!
//! ```toml
//! [bot]
//! nicknames = ["muice"]
//! superusers = ["10001"]
//! database = "~/.muicebot/chat.db"
//! default_model = "model"
//!
//! [models.model]
//! loader = "ollama"
//! model_name = "qwen2.5:7b"
//! think = 1
//! ```
//!
//! Each `[models.<name>]` table is a named model configuration. Tables are
//! kept raw until selected so that a broken entry only fails when someone
//! tries to load it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::MuiceError;
use crate::thought::ThinkMode;

/// Config file name searched for on startup
pub const CONFIG_FILE_NAME: &str = ".muice.toml";

/// Find a config file by walking up the directory tree, then checking global config.
///
/// Search order:
/// 1. Current directory and parent directories (walking up to root)
/// 2. Global config at ~/.config/muicebot/
fn find_config_file(filename: &str) -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let candidate = current.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_path = config_dir.join("muicebot").join(filename);
        if global_path.exists() {
            return Some(global_path);
        }
    }

    None
}

// ============================================================================
// Model Configuration
// ============================================================================

/// Identifier of a model adapter implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderKind {
    /// Local Ollama server
    #[serde(alias = "Ollama")]
    Ollama,
    /// Any OpenAI-compatible chat completions endpoint
    #[serde(alias = "Openai", alias = "OpenAI")]
    Openai,
}

impl LoaderKind {
    /// Every loader the registry knows how to build
    pub const ALL: &'static [LoaderKind] = &[LoaderKind::Ollama, LoaderKind::Openai];

    pub fn as_str(&self) -> &'static str {
        match self {
            LoaderKind::Ollama => "ollama",
            LoaderKind::Openai => "openai",
        }
    }
}

impl std::fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named model configuration bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub loader: LoaderKind,
    /// Model identifier understood by the backend
    #[serde(default)]
    pub model_name: String,
    /// Backend base URL; each loader has its own default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub think: ThinkMode,
    #[serde(default)]
    pub multimodal: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            loader: LoaderKind::Ollama,
            model_name: default_model_name(),
            api_host: None,
            api_key: None,
            system_prompt: None,
            temperature: None,
            top_p: None,
            max_tokens: None,
            think: ThinkMode::default(),
            multimodal: false,
        }
    }
}

// ============================================================================
// Bot Configuration (.muice.toml)
// ============================================================================

/// Top-level bot configuration (from .muice.toml)
#[derive(Debug, Clone, Deserialize)]
pub struct BotFileConfig {
    #[serde(default)]
    pub bot: BotSectionConfig,
    #[serde(default = "default_models")]
    pub models: BTreeMap<String, toml::Value>,
}

/// Bot configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct BotSectionConfig {
    /// Names that address the bot at the start of a message
    #[serde(default = "default_nicknames")]
    pub nicknames: Vec<String>,
    /// Users allowed to run privileged commands such as `load`
    #[serde(default)]
    pub superusers: Vec<String>,
    /// SQLite database path (supports `~` and `$VAR`)
    pub database: Option<String>,
    /// Upper bound for a single model call
    #[serde(default = "default_inference_timeout")]
    pub inference_timeout_secs: u64,
    /// Model config loaded at startup
    #[serde(default = "default_model_config")]
    pub default_model: String,
}

// Default value functions
fn default_nicknames() -> Vec<String> {
    vec!["muice".to_string()]
}

fn default_inference_timeout() -> u64 {
    120
}

fn default_model_config() -> String {
    "model".to_string()
}

fn default_model_name() -> String {
    "qwen2.5:7b".to_string()
}

fn default_models() -> BTreeMap<String, toml::Value> {
    let mut models = BTreeMap::new();
    if let Ok(value) = toml::Value::try_from(ModelConfig::default()) {
        models.insert(default_model_config(), value);
    }
    models
}

impl Default for BotSectionConfig {
    fn default() -> Self {
        Self {
            nicknames: default_nicknames(),
            superusers: Vec::new(),
            database: None,
            inference_timeout_secs: default_inference_timeout(),
            default_model: default_model_config(),
        }
    }
}

impl Default for BotFileConfig {
    fn default() -> Self {
        Self {
            bot: BotSectionConfig::default(),
            models: default_models(),
        }
    }
}

impl BotFileConfig {
    /// Load config from .muice.toml
    ///
    /// Returns the config together with the file it came from, if any.
    pub fn load() -> Result<(Self, Option<PathBuf>)> {
        if let Some(config_path) = find_config_file(CONFIG_FILE_NAME) {
            tracing::debug!("Loading config from: {}", config_path.display());
            let config = Self::load_from_path(&config_path)?;
            return Ok((config, Some(config_path)));
        }

        tracing::debug!("No {} found, using defaults", CONFIG_FILE_NAME);
        Ok((Self::default(), None))
    }

    /// Load from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Parse from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: BotFileConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Resolved database path; falls back to the default location
    pub fn database_path(&self) -> Result<Option<PathBuf>> {
        match &self.bot.database {
            Some(raw) => Ok(Some(expand_path(raw)?)),
            None => Ok(None),
        }
    }
}

/// Expand `~` and environment variables in a configured path
pub fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw).with_context(|| format!("Failed to expand {}", raw))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

// ============================================================================
// Model Registry
// ============================================================================

/// Named model configurations, validated on lookup
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    source: Option<PathBuf>,
    models: BTreeMap<String, toml::Value>,
}

impl ModelRegistry {
    /// Build a registry from already-parsed tables
    pub fn new(models: BTreeMap<String, toml::Value>) -> Self {
        Self {
            source: None,
            models,
        }
    }

    /// Remember the file the tables came from so `reload` can re-read it
    pub fn with_source(mut self, path: PathBuf) -> Self {
        self.source = Some(path);
        self
    }

    /// Registry with a single validated entry
    pub fn single(name: &str, config: &ModelConfig) -> Result<Self> {
        let mut models = BTreeMap::new();
        models.insert(name.to_string(), toml::Value::try_from(config)?);
        Ok(Self::new(models))
    }

    /// Re-read model tables from the source file, if there is one
    pub fn reload(&mut self) -> Result<()> {
        if let Some(path) = &self.source {
            let config = BotFileConfig::load_from_path(path)?;
            self.models = config.models;
            tracing::debug!("Reloaded {} model configs from {}", self.models.len(), path.display());
        }
        Ok(())
    }

    /// Configured names, sorted
    pub fn names(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(normalize_name(name))
    }

    /// Look up and validate a model config
    ///
    /// `models.deepseek` and `deepseek` name the same entry.
    pub fn resolve(&self, name: &str) -> Result<ModelConfig, MuiceError> {
        self.resolve_entry(name).map(|(_, config)| config)
    }

    /// Like [`resolve`](Self::resolve), also returning the table key
    pub fn resolve_entry(&self, name: &str) -> Result<(String, ModelConfig), MuiceError> {
        let key = normalize_name(name);
        let raw = self
            .models
            .get(key)
            .ok_or_else(|| MuiceError::ConfigNotFound(name.to_string()))?;

        let config = raw
            .clone()
            .try_into::<ModelConfig>()
            .map_err(|e| MuiceError::InvalidConfig {
                name: key.to_string(),
                reason: e.to_string(),
            })?;

        Ok((key.to_string(), config))
    }
}

fn normalize_name(name: &str) -> &str {
    let name = name.trim();
    name.strip_prefix("models.").unwrap_or(name)
}
