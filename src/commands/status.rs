use async_trait::async_trait;

use super::{Command, CommandResult, ConsoleContext};

pub struct StatusCommand;

#[async_trait]
impl Command for StatusCommand {
    fn name(&self) -> &str {
        "/status"
    }

    fn description(&self) -> &str {
        "show the bot state"
    }

    async fn execute(&self, _args: &str, ctx: &ConsoleContext<'_>) -> CommandResult {
        let state = ctx.registry.status().await;
        let label = if state.is_running() {
            "running"
        } else {
            "stopped"
        };
        println!("  status    {label} ({state})");
        CommandResult::Handled
    }
}
