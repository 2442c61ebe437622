//! `/config`, `/triggers` and `/reply`.

use async_trait::async_trait;

use super::{Command, CommandResult, ConsoleContext};
use crate::config::{BotConfig, parse_triggers};

pub struct ConfigCommand;

#[async_trait]
impl Command for ConfigCommand {
    fn name(&self) -> &str {
        "/config"
    }

    fn description(&self) -> &str {
        "show triggers, reply and the settings file"
    }

    async fn execute(&self, _args: &str, ctx: &ConsoleContext<'_>) -> CommandResult {
        let config = ctx.registry.config().await;
        println!("  triggers  {}", config.triggers_display());
        println!("  reply     {}", config.reply_text);
        println!("  file      {}", ctx.registry.store().path().display());
        CommandResult::Handled
    }
}

/// Save and apply `config`, printing the outcome.
async fn apply(ctx: &ConsoleContext<'_>, config: BotConfig) {
    match ctx.registry.reconfigure(config).await {
        Ok(()) => {
            let config = ctx.registry.config().await;
            println!("  saved: [{}] -> {}", config.triggers_display(), config.reply_text);
        }
        Err(e) => println!("  error: {e}"),
    }
}

pub struct TriggersCommand;

#[async_trait]
impl Command for TriggersCommand {
    fn name(&self) -> &str {
        "/triggers"
    }

    fn description(&self) -> &str {
        "set trigger phrases, comma separated"
    }

    async fn execute(&self, args: &str, ctx: &ConsoleContext<'_>) -> CommandResult {
        if args.is_empty() {
            println!("  usage: /triggers @team, help me");
            return CommandResult::Handled;
        }
        let current = ctx.registry.config().await;
        apply(ctx, BotConfig::new(parse_triggers(args), current.reply_text)).await;
        CommandResult::Handled
    }
}

pub struct ReplyCommand;

#[async_trait]
impl Command for ReplyCommand {
    fn name(&self) -> &str {
        "/reply"
    }

    fn description(&self) -> &str {
        "set the reply text"
    }

    async fn execute(&self, args: &str, ctx: &ConsoleContext<'_>) -> CommandResult {
        if args.is_empty() {
            println!("  usage: /reply On it");
            return CommandResult::Handled;
        }
        let current = ctx.registry.config().await;
        apply(ctx, BotConfig::new(current.triggers, args)).await;
        CommandResult::Handled
    }
}
