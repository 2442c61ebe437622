use async_trait::async_trait;

use super::{Command, CommandResult, ConsoleContext};

pub struct StartCommand;

#[async_trait]
impl Command for StartCommand {
    fn name(&self) -> &str {
        "/start"
    }

    fn aliases(&self) -> &[&str] {
        &["/run"]
    }

    fn description(&self) -> &str {
        "open the browser and wait for you to log in"
    }

    async fn execute(&self, _args: &str, ctx: &ConsoleContext<'_>) -> CommandResult {
        match ctx.registry.start().await {
            Ok(()) => {
                println!("  browser opened at {}", ctx.registry.options().target_url);
                println!("  log in, open the channel, then type /ready");
            }
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
    async fn opens_the_target() {
        let session = MockSession::new();
        let (registry, _dir) = test_registry(vec![session.clone()]);
        let ctx = ConsoleContext {
            registry: &registry,
        };

        StartCommand.execute("", &ctx).await;

        assert_eq!(registry.status().await, LifecycleState::AwaitingManualReady);
        assert_eq!(session.opened(), vec!["https://chat.test/app".to_string()]);
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn failure_is_reported_not_fatal() {
        let (registry, _dir) = test_registry(vec![]);
        let ctx = ConsoleContext {
            registry: &registry,
        };

        assert!(matches!(
            StartCommand.execute("", &ctx).await,
            CommandResult::Handled
        ));
        assert_eq!(registry.status().await, LifecycleState::Idle);
    }
}
