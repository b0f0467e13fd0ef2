//! Status command - show model state

use super::{BotCommand, CommandContext};
use crate::router::Reply;
use async_trait::async_trait;

pub struct StatusCommand;

#[async_trait]
impl BotCommand for StatusCommand {
    fn name(&self) -> &'static str {
        "status"
    }

    fn description(&self) -> &'static str {
        "显示当前状态"
    }

    async fn execute(&self, _args: &str, ctx: &CommandContext<'_>) -> Reply {
        Reply::single(ctx.muice.status().await)
    }
}
