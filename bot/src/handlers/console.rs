//! Console channel
//!
//! Line-oriented stand-in for a chat platform. Each stdin line becomes one
//! inbound message; `[image:<path>]` markers attach local images.

use anyhow::Result;
use regex::Regex;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::LazyLock;

use super::{inbound_message, CommandContext};
use crate::cli::Identity;
use crate::config::expand_path;
use crate::router::Router;

static IMAGE_MARKER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[image:([^\]]+)\]").expect("valid image marker regex"));

/// Split a console line into text and image paths
///
/// Paths go through `~`/`$VAR` expansion; a path that fails to expand is kept as written.
pub fn extract_images(line: &str) -> (String, Vec<PathBuf>) {
    let images = IMAGE_MARKER_REGEX
        .captures_iter(line)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|p| !p.is_empty())
        .map(|p| {
            expand_path(p).unwrap_or_else(|e| {
                tracing::warn!("Using image path as written: {:#}", e);
                PathBuf::from(p)
            })
        })
        .collect();

    let text = IMAGE_MARKER_REGEX.replace_all(line, "");
    (text.trim().to_string(), images)
}

/// Handle the `run` command - interactive console chat
pub async fn run_console(ctx: &CommandContext, identity: &Identity) -> Result<()> {
    let router = ctx.build_router(identity).await?;
    run_console_loop(&router, identity).await
}

async fn run_console_loop(router: &Router, identity: &Identity) -> Result<()> {
    let interactive = atty::is(atty::Stream::Stdin);

    if interactive {
        println!("Console chat. Type 'quit' to exit, '/help' for commands.");
        println!("Model config: {}", router.muice().active_config_name().await);
        if let Some(group) = &identity.group {
            println!("Group {}: start a message with the bot's nickname to address it.", group);
        }
        println!();
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if interactive {
            print!("> ");
            stdout.flush()?;
        }

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input == "quit" || input == "exit" {
            break;
        }

        let message = inbound_message(identity, input);
        match router.handle(&message).await {
            Some(reply) => {
                for line in &reply.messages {
                    println!("{}", line);
                }
                if interactive {
                    println!();
                }
            }
            None => tracing::debug!("No reply for: {}", input),
        }
    }

    Ok(())
}
