//! Message routing
//!
//! Turns inbound platform events into orchestrator calls. A message is either
//! a command (`/reset`), a chat addressed to the bot (private chat, @-mention
//! or a leading nickname), or ignored.

pub mod commands;

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::BotSectionConfig;
use crate::muice::{ChatRequest, Muice};
use commands::{CommandContext, CommandRegistry};

/// An event received from a messaging platform
#[derive(Debug, Clone, Default)]
pub struct InboundMessage {
    pub user_id: String,
    /// Display name of the sender
    pub username: String,
    /// Set for group chats
    pub group_id: Option<String>,
    pub text: String,
    /// Local paths of attached images
    pub images: Vec<PathBuf>,
    /// Private chat or explicit mention of the bot
    pub to_me: bool,
}

impl InboundMessage {
    /// A private-chat message; always addressed to the bot
    pub fn private(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            username: user_id.clone(),
            user_id,
            text: text.into(),
            to_me: true,
            ..Self::default()
        }
    }

    /// A group-chat message; addressed to the bot only by nickname unless mentioned
    pub fn group(
        group_id: impl Into<String>,
        user_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            group_id: Some(group_id.into()),
            to_me: false,
            ..Self::private(user_id, text)
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_images(mut self, images: Vec<PathBuf>) -> Self {
        self.images = images;
        self
    }

    pub fn mentioned(mut self) -> Self {
        self.to_me = true;
        self
    }

    /// Session identifier in the usual `group_<gid>_<uid>` form
    pub fn session_id(&self) -> String {
        match &self.group_id {
            Some(group) => format!("group_{}_{}", group, self.user_id),
            None => self.user_id.clone(),
        }
    }
}

/// Outbound messages, sent in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub messages: Vec<String>,
}

impl Reply {
    /// One message, newlines kept
    pub fn single(text: impl Into<String>) -> Self {
        Self {
            messages: vec![text.into()],
        }
    }

    /// One message per non-empty line; never empty
    pub fn paragraphs(text: &str) -> Self {
        let mut messages: Vec<String> = text
            .split('\n')
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        if messages.is_empty() {
            messages.push(String::new());
        }

        Self { messages }
    }
}

/// Routes inbound messages to commands or the orchestrator
pub struct Router {
    muice: Arc<Muice>,
    commands: CommandRegistry,
    nickname_regex: Option<Regex>,
    superusers: HashSet<String>,
}

impl Router {
    pub fn new(muice: Arc<Muice>, bot_config: &BotSectionConfig) -> Result<Self> {
        Ok(Self {
            muice,
            commands: CommandRegistry::new(),
            nickname_regex: nickname_regex(&bot_config.nicknames)?,
            superusers: bot_config.superusers.iter().cloned().collect(),
        })
    }

    pub fn muice(&self) -> &Arc<Muice> {
        &self.muice
    }

    pub fn is_superuser(&self, user_id: &str) -> bool {
        self.superusers.contains(user_id)
    }

    /// Handle one inbound message; `None` means stay silent
    pub async fn handle(&self, message: &InboundMessage) -> Option<Reply> {
        if let Some((name, args)) = CommandRegistry::parse_command(&message.text) {
            if let Some(cmd) = self.commands.find(name) {
                if cmd.superuser_only() && !self.is_superuser(&message.user_id) {
                    tracing::warn!("User {} is not allowed to run /{}", message.user_id, name);
                    return None;
                }

                tracing::info!("Command /{} from {}", name, message.user_id);
                let ctx = CommandContext {
                    muice: &self.muice,
                    message,
                    registry: &self.commands,
                };
                return Some(cmd.execute(args, &ctx).await);
            }
        }

        let text = self.addressed_text(message)?;

        let images = if self.muice.is_multimodal().await {
            message.images.clone()
        } else {
            Vec::new()
        };

        if text.is_empty() && images.is_empty() {
            return None;
        }

        tracing::info!("Received a message: {}", text);

        let request = ChatRequest {
            message: text,
            username: message.username.clone(),
            user_id: message.user_id.clone(),
            group_id: message.group_id.clone(),
            image_paths: images,
        };
        let response = self.muice.ask(request).await;

        tracing::info!("Response: {}", response);
        Some(Reply::paragraphs(&response))
    }

    /// Message text with any leading nickname removed, if the bot is addressed
    fn addressed_text(&self, message: &InboundMessage) -> Option<String> {
        if let Some(re) = &self.nickname_regex {
            if let Some(m) = re.find(&message.text) {
                return Some(message.text[m.end()..].trim().to_string());
            }
        }

        message.to_me.then(|| message.text.trim().to_string())
    }
}

fn nickname_regex(nicknames: &[String]) -> Result<Option<Regex>> {
    let alternatives: Vec<String> = nicknames
        .iter()
        .filter(|n| !n.is_empty())
        .map(|n| regex::escape(n))
        .collect();

    if alternatives.is_empty() {
        return Ok(None);
    }

    let pattern = format!(r"^(?:{})\s*", alternatives.join("|"));
    Regex::new(&pattern)
        .map(Some)
        .with_context(|| format!("Invalid nickname pattern: {}", pattern))
}
