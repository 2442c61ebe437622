//! Console commands prefixed with `/`.
//!
//! Commands implement the [`Command`] trait and are registered in a
//! [`CommandRegistry`]. The registry splits the input into a command word
//! and its arguments, resolves aliases and generates `/help`.

mod config;
mod help;
mod quit;
mod ready;
mod start;
mod status;
mod stop;

use async_trait::async_trait;
use std::sync::Arc;

use crate::registry::BotRegistry;

/// What commands get to work with.
pub struct ConsoleContext<'a> {
    pub registry: &'a BotRegistry,
}

/// What the console should do after a command runs.
#[derive(Debug)]
pub enum CommandResult {
    /// Not a command.
    NotACommand,
    /// Command handled, keep reading input.
    Handled,
    /// Leave the console.
    Quit,
}

/// A console command.
#[async_trait]
pub trait Command: Send + Sync {
    /// Primary name, e.g. `"/start"`.
    fn name(&self) -> &str;

    /// Alternative names, e.g. `&["/h", "/?"]`.
    fn aliases(&self) -> &[&str] {
        &[]
    }

    /// One-line description for `/help`.
    fn description(&self) -> &str;

    /// Run the command. `args` is whatever followed the command word,
    /// trimmed.
    async fn execute(&self, args: &str, ctx: &ConsoleContext<'_>) -> CommandResult;
}

pub struct CommandRegistry {
    commands: Vec<Arc<dyn Command>>,
}

impl CommandRegistry {
    /// Create a registry with all built-in commands.
    pub fn new() -> Self {
        let commands: Vec<Arc<dyn Command>> = vec![
            Arc::new(help::HelpCommand),
            Arc::new(start::StartCommand),
            Arc::new(ready::ReadyCommand),
            Arc::new(stop::StopCommand),
            Arc::new(status::StatusCommand),
            Arc::new(config::ConfigCommand),
            Arc::new(config::TriggersCommand),
            Arc::new(config::ReplyCommand),
            Arc::new(quit::QuitCommand),
        ];
        Self { commands }
    }

    /// Dispatch input to a matching command, or return `NotACommand`.
    pub async fn dispatch(&self, input: &str, ctx: &ConsoleContext<'_>) -> CommandResult {
        let input = input.trim();
        let (word, args) = match input.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (input, ""),
        };

        for command in &self.commands {
            if word == command.name() || command.aliases().contains(&word) {
                // /help needs the registry itself
                if command.name() == "/help" {
                    print!("{}", self.help_text());
                    return CommandResult::Handled;
                }
                return command.execute(args, ctx).await;
            }
        }

        if word.starts_with('/') {
            println!("unknown command: {word}");
            println!("type /help for available commands");
            return CommandResult::Handled;
        }

        CommandResult::NotACommand
    }

    /// Generate help text from all registered commands.
    pub fn help_text(&self) -> String {
        let entries: Vec<(String, &str)> = self
            .commands
            .iter()
            .map(|c| (format_label(c.name(), c.aliases()), c.description()))
            .collect();

        let max_width = entries
            .iter()
            .map(|(label, _)| label.len())
            .max()
            .unwrap_or(10);

        let mut out = String::new();
        for (label, desc) in &entries {
            out.push_str(&format!("  {label:<max_width$}  {desc}\n"));
        }
        out
    }

    pub fn names(&self) -> Vec<&str> {
        self.commands.iter().map(|c| c.name()).collect()
    }

    /// All registered names and aliases.
    pub fn all_triggers(&self) -> Vec<&str> {
        let mut triggers = Vec::new();
        for cmd in &self.commands {
            triggers.push(cmd.name());
            triggers.extend_from_slice(cmd.aliases());
        }
        triggers
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn format_label(name: &str, aliases: &[&str]) -> String {
    if aliases.is_empty() {
        name.to_string()
    } else {
        format!("{} ({})", name, aliases.join(", "))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::ConfigStore;
    use crate::engine::Selectors;
    use crate::monitor::MonitorOptions;
    use crate::registry::BotOptions;
    use crate::session::mock::{MockLauncher, MockSession};
    use std::time::Duration;

    /// A registry backed by a temp config file and scripted browsers.
    pub(crate) fn test_registry(sessions: Vec<MockSession>) -> (BotRegistry, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));
        let options = BotOptions {
            target_url: "https://chat.test/app".to_string(),
            selectors: Selectors::default(),
            monitor: MonitorOptions {
                poll_interval: Duration::from_millis(10),
                ready_timeout: None,
            },
        };
        let registry = BotRegistry::new(
            store,
            Arc::new(MockLauncher::with_sessions(sessions)),
            options,
        );
        (registry, dir)
    }

    #[test]
    fn all_builtins_registered() {
        let reg = CommandRegistry::new();
        let names = reg.names();
        for name in [
            "/help", "/start", "/ready", "/stop", "/status", "/config", "/triggers", "/reply",
            "/quit",
        ] {
            assert!(names.contains(&name), "missing: {name}");
        }
    }

    #[test]
    fn no_duplicate_triggers() {
        let reg = CommandRegistry::new();
        let triggers = reg.all_triggers();
        let mut seen = Vec::new();
        for t in &triggers {
            assert!(!seen.contains(t), "duplicate trigger: {t}");
            seen.push(t);
        }
    }

    #[test]
    fn help_text_includes_all_commands() {
        let reg = CommandRegistry::new();
        let text = reg.help_text();
        for name in reg.names() {
            assert!(text.contains(name), "help missing: {name}");
        }
        assert!(text.contains("/?"));
    }

    #[tokio::test]
    async fn unknown_slash_command_is_handled() {
        let (registry, _dir) = test_registry(vec![]);
        let ctx = ConsoleContext {
            registry: &registry,
        };
        assert!(matches!(
            CommandRegistry::new().dispatch("/foobar", &ctx).await,
            CommandResult::Handled
        ));
    }

    #[tokio::test]
    async fn plain_text_is_not_a_command() {
        let (registry, _dir) = test_registry(vec![]);
        let ctx = ConsoleContext {
            registry: &registry,
        };
        assert!(matches!(
            CommandRegistry::new().dispatch("hello there", &ctx).await,
            CommandResult::NotACommand
        ));
    }

    #[tokio::test]
    async fn arguments_reach_the_command() {
        let (registry, _dir) = test_registry(vec![]);
        let ctx = ConsoleContext {
            registry: &registry,
        };
        let reg = CommandRegistry::new();
        reg.dispatch("/reply   On it  ", &ctx).await;
        assert_eq!(registry.config().await.reply_text, "On it");
    }

    #[test]
    fn format_label_with_aliases() {
        assert_eq!(format_label("/help", &["/h", "/?"]), "/help (/h, /?)");
        assert_eq!(format_label("/stop", &[]), "/stop");
    }
}
