use async_trait::async_trait;

use super::{Command, CommandResult, ConsoleContext};

/// Listed in `/help`; the registry answers it directly.
pub struct HelpCommand;

#[async_trait]
impl Command for HelpCommand {
    fn name(&self) -> &str {
        "/help"
    }

    fn aliases(&self) -> &[&str] {
        &["/h", "/?"]
    }

    fn description(&self) -> &str {
        "show available commands"
    }

    async fn execute(&self, _args: &str, _ctx: &ConsoleContext<'_>) -> CommandResult {
        CommandResult::Handled
    }
}
