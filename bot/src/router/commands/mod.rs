//! Chat command system
//!
//! Commands start with `.` or `/` (`/reset`, `.load deepseek`). Each one is a
//! [`BotCommand`] registered in the [`CommandRegistry`] and dispatched by name.

mod help;
mod history;
mod load;
mod status;
mod whoami;

pub use help::HelpCommand;
pub use history::{RefreshCommand, ResetCommand, UndoCommand};
pub use load::LoadCommand;
pub use status::StatusCommand;
pub use whoami::WhoAmICommand;

use async_trait::async_trait;
use std::sync::Arc;

use super::{InboundMessage, Reply};
use crate::muice::Muice;

/// Accepted command prefixes
pub const COMMAND_PREFIXES: &[char] = &['.', '/'];

// ============================================================================
// Command Context
// ============================================================================

/// Context passed to commands during execution
pub struct CommandContext<'a> {
    pub muice: &'a Muice,
    /// The message that triggered the command
    pub message: &'a InboundMessage,
    /// Registry the command was found in (for help output)
    pub registry: &'a CommandRegistry,
}

// ============================================================================
// BotCommand Trait
// ============================================================================

/// Trait for chat commands
#[async_trait]
pub trait BotCommand: Send + Sync {
    /// Command name (without prefix)
    fn name(&self) -> &'static str;

    /// Short description for help text
    fn description(&self) -> &'static str;

    /// Argument synopsis shown in help, e.g. `<config_name>`
    fn usage(&self) -> Option<&'static str> {
        None
    }

    /// Whether only configured superusers may run this command
    fn superuser_only(&self) -> bool {
        false
    }

    /// Execute the command
    async fn execute(&self, args: &str, ctx: &CommandContext<'_>) -> Reply;
}

// ============================================================================
// Command Registry
// ============================================================================

/// Registry of chat commands
pub struct CommandRegistry {
    commands: Vec<Arc<dyn BotCommand>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// Create a new registry with all built-in commands
    pub fn new() -> Self {
        let commands: Vec<Arc<dyn BotCommand>> = vec![
            Arc::new(HelpCommand),
            Arc::new(StatusCommand),
            Arc::new(RefreshCommand),
            Arc::new(ResetCommand),
            Arc::new(UndoCommand),
            Arc::new(WhoAmICommand),
            Arc::new(LoadCommand),
        ];

        Self { commands }
    }

    /// Find a command by name
    pub fn find(&self, name: &str) -> Option<&Arc<dyn BotCommand>> {
        self.commands.iter().find(|cmd| cmd.name() == name)
    }

    /// Parse command input into (command_name, args)
    pub fn parse_command(input: &str) -> Option<(&str, &str)> {
        let input = input.trim();
        let rest = input.strip_prefix(COMMAND_PREFIXES)?;

        let mut parts = rest.splitn(2, char::is_whitespace);
        let name = parts.next().filter(|n| !n.is_empty())?;
        let args = parts.next().unwrap_or("").trim();

        Some((name, args))
    }

    /// Get all registered commands
    pub fn all_commands(&self) -> &[Arc<dyn BotCommand>] {
        &self.commands
    }
}
