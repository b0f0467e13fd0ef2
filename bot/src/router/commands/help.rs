//! Help command - lists available commands

use super::{BotCommand, CommandContext};
use crate::router::Reply;
use async_trait::async_trait;

/// Help command
pub struct HelpCommand;

#[async_trait]
impl BotCommand for HelpCommand {
    fn name(&self) -> &'static str {
        "help"
    }

    fn description(&self) -> &'static str {
        "输出此帮助信息"
    }

    async fn execute(&self, _args: &str, ctx: &CommandContext<'_>) -> Reply {
        let mut help_text = String::from("基本命令：\n");

        for cmd in ctx.registry.all_commands() {
            match cmd.usage() {
                Some(usage) => help_text.push_str(&format!(
                    "{} {} {}\n",
                    cmd.name(),
                    usage,
                    cmd.description()
                )),
                None => help_text.push_str(&format!("{} {}\n", cmd.name(), cmd.description())),
            }
        }

        help_text.push_str("（支持的命令前缀：“.”、“/”）");
        Reply::single(help_text)
    }
}
