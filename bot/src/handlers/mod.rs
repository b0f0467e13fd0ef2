//! Command handlers module
//!
//! Handler functions for CLI subcommands. [`CommandContext`] resolves the
//! config file and CLI overrides once and builds the shared resources.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::Identity;
use crate::config::{BotFileConfig, BotSectionConfig, ModelRegistry};
use crate::db::Database;
use crate::llm::LoaderRegistry;
use crate::muice::Muice;
use crate::router::{InboundMessage, Router};

pub mod console;
pub mod core;

pub use console::run_console;
pub use self::core::{configs, history, send};

// =============================================================================
// CommandContext - resolved configuration
// =============================================================================

/// Shared context for command handlers
pub struct CommandContext {
    pub verbose: u8,
    pub file_config: BotFileConfig,
    /// File the config came from, if any
    pub config_path: Option<PathBuf>,
    database: Option<PathBuf>,
    model_config: String,
}

impl CommandContext {
    /// Resolve with priority: CLI/env > config file > defaults
    pub fn new(
        config: Option<PathBuf>,
        database: Option<PathBuf>,
        model_config: Option<String>,
        verbose: u8,
    ) -> Result<Self> {
        let (file_config, config_path) = match config {
            Some(path) => (BotFileConfig::load_from_path(&path)?, Some(path)),
            None => BotFileConfig::load()?,
        };

        let database = match database {
            Some(path) => Some(path),
            None => file_config.database_path()?,
        };
        let model_config = model_config.unwrap_or_else(|| file_config.bot.default_model.clone());

        Ok(Self {
            verbose,
            file_config,
            config_path,
            database,
            model_config,
        })
    }

    /// Name of the model config loaded at startup
    pub fn model_config(&self) -> &str {
        &self.model_config
    }

    /// Open the history database
    pub fn database(&self) -> Result<Database> {
        match &self.database {
            Some(path) => Database::open_at(path.clone()),
            None => Database::open(),
        }
    }

    /// Model configs, re-readable from the config file
    pub fn model_registry(&self) -> ModelRegistry {
        let registry = ModelRegistry::new(self.file_config.models.clone());
        match &self.config_path {
            Some(path) => registry.with_source(path.clone()),
            None => registry,
        }
    }

    /// Build the orchestrator without loading the model
    pub fn build_muice(&self) -> Result<Muice> {
        let muice = Muice::new(
            self.database()?,
            LoaderRegistry::new(),
            self.model_registry(),
            &self.model_config,
        )
        .with_context(|| format!("Cannot use model config {}", self.model_config))?;

        Ok(muice.with_inference_timeout(Duration::from_secs(
            self.file_config.bot.inference_timeout_secs,
        )))
    }

    /// Build a router with the model loaded, speaking for `identity`
    pub async fn build_router(&self, identity: &Identity) -> Result<Router> {
        let muice = self.build_muice()?;
        if !muice.load_model().await {
            anyhow::bail!(
                "Failed to load model config {}, check the [models.{}] section",
                self.model_config,
                self.model_config
            );
        }

        Router::new(Arc::new(muice), &self.bot_config_for(identity))
    }

    /// Bot section with `identity` added to the superusers when requested
    fn bot_config_for(&self, identity: &Identity) -> BotSectionConfig {
        let mut bot = self.file_config.bot.clone();
        if identity.superuser && !bot.superusers.contains(&identity.user) {
            bot.superusers.push(identity.user.clone());
        }
        bot
    }
}

/// Build the inbound event for a console line
pub fn inbound_message(identity: &Identity, line: &str) -> InboundMessage {
    let (text, images) = console::extract_images(line);

    let message = match &identity.group {
        Some(group) => InboundMessage::group(group, &identity.user, text),
        None => InboundMessage::private(&identity.user, text),
    };

    let message = match &identity.username {
        Some(name) => message.with_username(name),
        None => message,
    };

    message.with_images(images)
}
