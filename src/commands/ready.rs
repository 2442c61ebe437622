use async_trait::async_trait;

use super::{Command, CommandResult, ConsoleContext};

pub struct ReadyCommand;

#[async_trait]
impl Command for ReadyCommand {
    fn name(&self) -> &str {
        "/ready"
    }

    fn aliases(&self) -> &[&str] {
        &["/monitor"]
    }

    fn description(&self) -> &str {
        "logged in and on the channel, start monitoring"
    }

    async fn execute(&self, _args: &str, ctx: &ConsoleContext<'_>) -> CommandResult {
        match ctx.registry.signal_ready().await {
            Ok(()) => println!("  monitoring started"),
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
    async fn starts_monitoring() {
        let (registry, _dir) = test_registry(vec![MockSession::new()]);
        let ctx = ConsoleContext {
            registry: &registry,
        };
        registry.start().await.unwrap();

        ReadyCommand.execute("", &ctx).await;

        let mut rx = registry.lifecycle().await.unwrap().subscribe();
        rx.wait_for(|s| *s == LifecycleState::Monitoring)
            .await
            .unwrap();
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn without_a_bot_changes_nothing() {
        let (registry, _dir) = test_registry(vec![]);
        let ctx = ConsoleContext {
            registry: &registry,
        };
        ReadyCommand.execute("", &ctx).await;
        assert_eq!(registry.status().await, LifecycleState::Idle);
    }
}
