//! One-shot command handlers

use anyhow::Result;

use super::{inbound_message, CommandContext};
use crate::cli::Identity;

/// Handle the `send` command - route one message and print the reply
pub async fn send(ctx: &CommandContext, identity: &Identity, message: &str) -> Result<()> {
    let router = ctx.build_router(identity).await?;
    let inbound = inbound_message(identity, message);

    match router.handle(&inbound).await {
        Some(reply) => {
            for line in reply.messages {
                println!("{}", line);
            }
        }
        None => {
            if ctx.verbose >= 1 {
                eprintln!("(no reply: message not addressed to the bot)");
            }
        }
    }

    Ok(())
}

/// Handle the `configs` command - list model configs
pub async fn configs(ctx: &CommandContext) -> Result<()> {
    let registry = ctx.model_registry();
    let names = registry.names();

    if names.is_empty() {
        println!("No model configs defined.");
        return Ok(());
    }

    match &ctx.config_path {
        Some(path) => println!("Model configs ({}):", path.display()),
        None => println!("Model configs (built-in defaults):"),
    }

    for name in names {
        let current_marker = if name == ctx.model_config() { " (current)" } else { "" };
        match registry.resolve(&name) {
            Ok(config) => println!(
                "  {}{} - {} {}{}",
                name,
                current_marker,
                config.loader,
                config.model_name,
                if config.multimodal { " [multimodal]" } else { "" }
            ),
            Err(e) => println!("  {}{} - invalid: {}", name, current_marker, e),
        }
    }

    Ok(())
}

/// Handle the `history` command - print a user's available history
pub async fn history(ctx: &CommandContext, user_id: &str) -> Result<()> {
    let db = ctx.database()?;
    let uid = user_id.to_string();
    let entries = tokio::task::spawn_blocking(move || db.get_history(&uid)).await??;

    if entries.is_empty() {
        println!("No conversation history for {}.", user_id);
        return Ok(());
    }

    for entry in entries {
        let place = entry
            .group_id
            .as_deref()
            .map(|g| format!(" in group {}", g))
            .unwrap_or_default();
        println!(
            "[{}] {}{}:",
            entry.time.format("%Y-%m-%d %H:%M:%S"),
            entry.username,
            place
        );
        println!("  > {}", entry.message);
        for image in &entry.images {
            println!("  > [image:{}]", image.display());
        }
        println!("  {}", entry.respond);
    }

    Ok(())
}
