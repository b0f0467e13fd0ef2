//! Load command - switch to another model config

use super::{BotCommand, CommandContext};
use crate::router::Reply;
use async_trait::async_trait;

/// Config loaded when `load` is given no argument
const DEFAULT_CONFIG_NAME: &str = "model";

/// Load command
pub struct LoadCommand;

#[async_trait]
impl BotCommand for LoadCommand {
    fn name(&self) -> &'static str {
        "load"
    }

    fn description(&self) -> &'static str {
        "加载模型"
    }

    fn usage(&self) -> Option<&'static str> {
        Some("<config_name>")
    }

    fn superuser_only(&self) -> bool {
        true
    }

    async fn execute(&self, args: &str, ctx: &CommandContext<'_>) -> Reply {
        let config_name = match args.split_whitespace().next() {
            Some(name) => name,
            None => DEFAULT_CONFIG_NAME,
        };

        Reply::single(ctx.muice.change_model_config(config_name).await)
    }
}
