//! CLI argument definitions
//!
//! Contains the main CLI struct and Commands enum for clap parsing.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "muicebot")]
#[command(about = "Chat bot with per-user conversation history over Ollama or OpenAI-compatible models")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: nearest .muice.toml, then ~/.config/muicebot/.muice.toml)
    #[arg(long, env = "MUICE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database path (default: from config or ~/.muicebot/chat.db)
    #[arg(long, env = "MUICE_DB", global = true)]
    pub database: Option<PathBuf>,

    /// Model config to load at startup (default: bot.default_model)
    #[arg(long, global = true)]
    pub model_config: Option<String>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace). Default is warn.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// Who the console speaks as
#[derive(clap::Args, Debug, Clone)]
pub struct Identity {
    /// User ID of the sender
    #[arg(long, default_value = "console")]
    pub user: String,

    /// Display name (default: the user ID)
    #[arg(long)]
    pub username: Option<String>,

    /// Speak in a group chat instead of a private one
    #[arg(long)]
    pub group: Option<String>,

    /// Treat the sender as a superuser
    #[arg(long)]
    pub superuser: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive console chat
    Run {
        #[command(flatten)]
        identity: Identity,
    },
    /// Route a single message and print the reply
    Send {
        /// Message text, commands included (e.g. "/status")
        message: String,

        #[command(flatten)]
        identity: Identity,
    },
    /// List configured model configs
    Configs,
    /// Print a user's available conversation history
    History {
        /// User ID
        #[arg(long, default_value = "console")]
        user: String,
    },
}
