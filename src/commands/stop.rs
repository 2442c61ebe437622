use async_trait::async_trait;

use super::{Command, CommandResult, ConsoleContext};

pub struct StopCommand;

#[async_trait]
impl Command for StopCommand {
    fn name(&self) -> &str {
        "/stop"
    }

    fn description(&self) -> &str {
        "stop monitoring and close the browser"
    }

    async fn execute(&self, _args: &str, ctx: &ConsoleContext<'_>) -> CommandResult {
        match ctx.registry.stop().await {
            Ok(()) => println!("  stopped"),
            Err(e) => println!("  error: {e}"),
        }
        CommandResult::Handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::test_registry;
    use crate::lifecycle::LifecycleState;
    use crate::session::mock::MockSession;

    #[tokio::test]
    async fn closes_the_browser() {
        let session = MockSession::new();
        let (registry, _dir) = test_registry(vec![session.clone()]);
        let ctx = ConsoleContext {
            registry: &registry,
        };
        registry.start().await.unwrap();

        StopCommand.execute("", &ctx).await;

        assert_eq!(registry.status().await, LifecycleState::Stopped);
        assert_eq!(session.close_count(), 1);
    }
}
