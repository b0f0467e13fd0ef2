//! Whoami command - echo the caller's identity

use super::{BotCommand, CommandContext};
use crate::router::Reply;
use async_trait::async_trait;

pub struct WhoAmICommand;

#[async_trait]
impl BotCommand for WhoAmICommand {
    fn name(&self) -> &'static str {
        "whoami"
    }

    fn description(&self) -> &'static str {
        "输出当前用户信息"
    }

    async fn execute(&self, _args: &str, ctx: &CommandContext<'_>) -> Reply {
        Reply::single(format!(
            "用户 ID: {}\n当前会话信息：{}",
            ctx.message.user_id,
            ctx.message.session_id()
        ))
    }
}
