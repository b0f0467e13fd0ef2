//! Chat bot conversation orchestrator
//!
//! Keeps per-user conversation history in SQLite, forwards each turn to a
//! pluggable model backend (Ollama or an OpenAI-compatible API) and routes
//! chat commands such as `/refresh`, `/undo` and `/reset`.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod llm;
pub mod muice;
pub mod router;
pub mod thought;

pub use config::{BotFileConfig, LoaderKind, ModelConfig, ModelRegistry};
pub use db::{Database, HistoryEntry};
pub use error::MuiceError;
pub use llm::{LoaderRegistry, ModelAdapter};
pub use muice::{ChatRequest, Muice};
pub use router::{InboundMessage, Reply, Router};
pub use thought::ThinkMode;
