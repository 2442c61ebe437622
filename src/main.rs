use std::ffi::OsString;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use tripwire::banner::{BannerInfo, print_banner, print_farewell};
use tripwire::client::ControlClient;
use tripwire::commands::{CommandRegistry, CommandResult, ConsoleContext};
use tripwire::config::{BotConfig, ConfigSource, ConfigStore};
use tripwire::consts::{
    DEFAULT_BIND, DEFAULT_COMPOSE_SELECTOR, DEFAULT_MESSAGE_SELECTOR, DEFAULT_TARGET_URL,
    default_config_path, default_profile_dir,
};
use tripwire::engine::Selectors;
use tripwire::events::Event;
use tripwire::lifecycle::LifecycleState;
use tripwire::logging::init_logging;
use tripwire::monitor::MonitorOptions;
use tripwire::registry::{BotOptions, BotRegistry};
use tripwire::server;
use tripwire::session::chromium::{BrowserOptions, ChromiumLauncher};

#[derive(Parser)]
#[command(
    name = "tripwire",
    version,
    about = "Watches a chat channel and answers trigger phrases for you."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Settings file with TRIGGERS and REPLY_TEXT
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (RUST_LOG overrides)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(flatten)]
    bot: BotArgs,
}

#[derive(Args, Clone)]
struct BotArgs {
    /// Chat app URL opened after launch
    #[arg(long, global = true, default_value = DEFAULT_TARGET_URL)]
    target_url: String,

    /// Browser profile directory (keeps the login between runs)
    #[arg(long, global = true)]
    profile_dir: Option<PathBuf>,

    /// Run the browser without a window
    #[arg(long, global = true, default_value_t = false)]
    headless: bool,

    /// Milliseconds between checks for new messages
    #[arg(long, global = true, default_value_t = 1500)]
    poll_interval_ms: u64,

    /// Give up waiting for the ready signal after this many seconds
    #[arg(long, global = true)]
    ready_timeout: Option<u64>,

    /// CSS selector matching every message body in the channel
    #[arg(long, global = true, default_value = DEFAULT_MESSAGE_SELECTOR)]
    message_selector: String,

    /// CSS selector matching the compose box
    #[arg(long, global = true, default_value = DEFAULT_COMPOSE_SELECTOR)]
    compose_selector: String,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP control API
    Serve {
        #[arg(long, default_value = DEFAULT_BIND)]
        bind: SocketAddr,
    },
    /// Interactive console with slash commands
    Console,
    /// Open the browser, wait for Enter, then monitor until Ctrl+C
    Run,
    /// Start `serve` in the background and drive it over HTTP
    Launch {
        #[arg(long, default_value = DEFAULT_BIND)]
        bind: SocketAddr,
    },
    /// Show or change the stored settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the stored settings
    Show,
    /// Validate and save new settings
    Set {
        /// Trigger phrase (repeatable, commas also split)
        #[arg(long = "trigger", required = true)]
        triggers: Vec<String>,
        /// Reply text
        #[arg(long)]
        reply: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let store = ConfigStore::new(&config_path);

    match &cli.command {
        Command::Config { action } => handle_config(&store, action),
        Command::Launch { bind } => handle_launch(&cli, *bind).await,
        Command::Serve { bind } => {
            let registry = build_registry(store, &cli.bot);
            show_banner("serve", &registry, &cli.bot, Some(&bind.to_string())).await;
            server::serve(registry, *bind).await
        }
        Command::Run => {
            let registry = build_registry(store, &cli.bot);
            show_banner("run", &registry, &cli.bot, None).await;
            handle_run(&registry).await
        }
        Command::Console => {
            let registry = build_registry(store, &cli.bot);
            show_banner("console", &registry, &cli.bot, None).await;
            handle_console(&registry).await
        }
    }
}

fn build_registry(store: ConfigStore, args: &BotArgs) -> Arc<BotRegistry> {
    let launcher = ChromiumLauncher::new(BrowserOptions {
        headless: args.headless,
        profile_dir: args.profile_dir.clone().unwrap_or_else(default_profile_dir),
    });
    let options = BotOptions {
        target_url: args.target_url.clone(),
        selectors: Selectors {
            message: args.message_selector.clone(),
            compose: args.compose_selector.clone(),
        },
        monitor: MonitorOptions {
            poll_interval: Duration::from_millis(args.poll_interval_ms),
            ready_timeout: args.ready_timeout.map(Duration::from_secs),
        },
    };
    Arc::new(BotRegistry::new(store, Arc::new(launcher), options))
}

async fn show_banner(mode: &str, registry: &BotRegistry, args: &BotArgs, bind: Option<&str>) {
    let config = registry.config().await;
    print_banner(&BannerInfo {
        mode,
        config_path: registry.store().path(),
        config: &config,
        target_url: &args.target_url,
        poll_interval: Duration::from_millis(args.poll_interval_ms),
        bind,
    });
}

fn handle_config(store: &ConfigStore, action: &ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let loaded = store.load();
            if let ConfigSource::Invalid(reason) = &loaded.source {
                println!("warning: {reason}, showing defaults");
            }
            println!("  file      {}", store.path().display());
            println!("  triggers  {}", loaded.config.triggers_display());
            println!("  reply     {}", loaded.config.reply_text);
        }
        ConfigAction::Set { triggers, reply } => {
            let config = BotConfig::from_input(&triggers.join(","), reply)?;
            store.save(&config)?;
            println!(
                "✓ saved [{}] -> {} to {}",
                config.triggers_display(),
                config.reply_text,
                store.path().display()
            );
        }
    }
    Ok(())
}

/// Open the browser, wait for Enter, monitor until Ctrl+C or the browser
/// goes away.
async fn handle_run(registry: &BotRegistry) -> anyhow::Result<()> {
    registry.start().await?;

    println!("\nLog in manually in the browser window and open the channel.");
    print!("Press Enter once logged in... ");
    io::stdout().flush()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    tokio::select! {
        _ = lines.next_line() => {}
        _ = tokio::signal::ctrl_c() => {
            println!();
            registry.shutdown().await;
            print_farewell();
            return Ok(());
        }
    }

    registry.signal_ready().await?;
    println!("monitoring, press Ctrl+C to stop");

    if let Some(lifecycle) = registry.lifecycle().await {
        let mut rx = lifecycle.subscribe();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => println!(),
            _ = rx.wait_for(|s| *s == LifecycleState::Stopped) => {
                warn!("bot stopped on its own");
            }
        }
    }

    registry.shutdown().await;
    print_farewell();
    Ok(())
}

fn print_event(event: &Event) {
    match event {
        Event::StateChanged { state } => println!("\n  [state] {state}"),
        Event::MessageSeen { text } => println!("\n  [seen] {text}"),
        Event::TriggerFired { message, reply } => {
            println!("\n  [reply] \"{reply}\" <- {message}")
        }
        Event::ConfigChanged { config } => println!(
            "\n  [config] [{}] -> {}",
            config.triggers_display(),
            config.reply_text
        ),
    }
}

async fn handle_console(registry: &BotRegistry) -> anyhow::Result<()> {
    let mut events = registry.events().subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let commands = CommandRegistry::new();
    let ctx = ConsoleContext { registry };
    println!("type /help for commands, /start to open the browser");

    // async stdin so Ctrl+C is caught at the prompt too
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        print!("\ntripwire> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            result = lines.next_line() => {
                match result {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        println!();
                        break;
                    }
                    Err(e) => {
                        eprintln!("input error: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match commands.dispatch(input, &ctx).await {
            CommandResult::Quit => break,
            CommandResult::Handled => {}
            CommandResult::NotACommand => println!("type /help for available commands"),
        }
    }

    registry.shutdown().await;
    printer.abort();
    print_farewell();
    Ok(())
}

/// Arguments for the child `serve` process, carrying over our own options.
fn serve_args(cli: &Cli, bind: SocketAddr) -> Vec<OsString> {
    let bot = &cli.bot;
    let mut args: Vec<OsString> = vec![
        "serve".into(),
        "--bind".into(),
        bind.to_string().into(),
        "--log-level".into(),
        cli.log_level.clone().into(),
        "--target-url".into(),
        bot.target_url.clone().into(),
        "--poll-interval-ms".into(),
        bot.poll_interval_ms.to_string().into(),
        "--message-selector".into(),
        bot.message_selector.clone().into(),
        "--compose-selector".into(),
        bot.compose_selector.clone().into(),
    ];
    if let Some(config) = &cli.config {
        args.push("--config".into());
        args.push(config.clone().into());
    }
    if let Some(profile) = &bot.profile_dir {
        args.push("--profile-dir".into());
        args.push(profile.clone().into());
    }
    if bot.headless {
        args.push("--headless".into());
    }
    if let Some(secs) = bot.ready_timeout {
        args.push("--ready-timeout".into());
        args.push(secs.to_string().into());
    }
    args
}

/// Run `serve` as a child, open the browser through it, and forward Enter
/// as the ready signal.
async fn handle_launch(cli: &Cli, bind: SocketAddr) -> anyhow::Result<()> {
    let exe = std::env::current_exe().context("cannot locate own executable")?;
    let mut child = tokio::process::Command::new(exe)
        .args(serve_args(cli, bind))
        .kill_on_drop(true)
        .spawn()
        .context("failed to start the server process")?;
    info!(pid = ?child.id(), "server process started");

    let client = ControlClient::new(format!("http://{bind}"))?;
    let up = client
        .wait_until_up(10, Duration::from_secs(1), || {
            matches!(child.try_wait(), Ok(None))
        })
        .await;
    if let Err(e) = up {
        let _ = child.kill().await;
        bail!("{e:#}");
    }

    let started = client.start().await?;
    println!("{}", started.message);
    print!("Press Enter once logged in... ");
    io::stdout().flush()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ready_sent = false;
    loop {
        tokio::select! {
            status = child.wait() => {
                let status = status.context("failed to wait for the server")?;
                println!("server exited ({status})");
                return Ok(());
            }
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line(), if !ready_sent => {
                ready_sent = true;
                if let Ok(Some(_)) = line {
                    match client.ready().await {
                        Ok(reply) => println!("{}, press Ctrl+C to stop", reply.message),
                        Err(e) => eprintln!("error: {e:#}"),
                    }
                }
            }
        }
    }

    println!("\nstopping...");
    if let Err(e) = client.stop().await {
        warn!(error = %e, "stop request failed");
    }
    let _ = child.kill().await;
    print_farewell();
    Ok(())
}
