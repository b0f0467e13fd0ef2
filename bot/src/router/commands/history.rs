//! Commands that rewrite the caller's conversation history

use super::{BotCommand, CommandContext};
use crate::router::Reply;
use async_trait::async_trait;

/// Regenerate the last answer
pub struct RefreshCommand;

#[async_trait]
impl BotCommand for RefreshCommand {
    fn name(&self) -> &'static str {
        "refresh"
    }

    fn description(&self) -> &'static str {
        "刷新模型输出"
    }

    async fn execute(&self, _args: &str, ctx: &CommandContext<'_>) -> Reply {
        let response = ctx.muice.refresh(&ctx.message.user_id).await;
        Reply::paragraphs(&response)
    }
}

/// Clear conversation history
pub struct ResetCommand;

#[async_trait]
impl BotCommand for ResetCommand {
    fn name(&self) -> &'static str {
        "reset"
    }

    fn description(&self) -> &'static str {
        "清空对话记录"
    }

    async fn execute(&self, _args: &str, ctx: &CommandContext<'_>) -> Reply {
        Reply::single(ctx.muice.reset(&ctx.message.user_id).await)
    }
}

/// Drop the last exchange
pub struct UndoCommand;

#[async_trait]
impl BotCommand for UndoCommand {
    fn name(&self) -> &'static str {
        "undo"
    }

    fn description(&self) -> &'static str {
        "撤回上一个对话"
    }

    async fn execute(&self, _args: &str, ctx: &CommandContext<'_>) -> Reply {
        Reply::single(ctx.muice.undo(&ctx.message.user_id).await)
    }
}
