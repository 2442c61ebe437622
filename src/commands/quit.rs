use async_trait::async_trait;

use super::{Command, CommandResult, ConsoleContext};

pub struct QuitCommand;

#[async_trait]
impl Command for QuitCommand {
    fn name(&self) -> &str {
        "/quit"
    }

    fn aliases(&self) -> &[&str] {
        &["quit", "exit", "/exit"]
    }

    fn description(&self) -> &str {
        "stop the bot and leave the console"
    }

    async fn execute(&self, _args: &str, _ctx: &ConsoleContext<'_>) -> CommandResult {
        CommandResult::Quit
    }
}
