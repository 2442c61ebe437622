//! Project-wide constants.

use std::path::PathBuf;
use std::time::Duration;

pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");

/// Triggers written to a freshly created config file.
pub const DEFAULT_TRIGGERS: &[&str] = &["@team"];

/// Reply written to a freshly created config file.
pub const DEFAULT_REPLY: &str = "Team Take";

/// Config file name, resolved against the working directory.
pub const CONFIG_FILE: &str = "config.json";

/// The chat application the browser is pointed at.
pub const DEFAULT_TARGET_URL: &str = "https://discord.com/app";

/// Every rendered message body in the active channel, oldest first.
pub const DEFAULT_MESSAGE_SELECTOR: &str = "li.messageListItem__5126c div.messageContent_c19a55";

/// The compose box at the bottom of the channel.
pub const DEFAULT_COMPOSE_SELECTOR: &str = "div[role='textbox']";

/// Delay between two ticks of the poll loop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Address the control service listens on.
pub const DEFAULT_BIND: &str = "127.0.0.1:5000";

/// Default config path: `./config.json`.
/// Always next to where the bot is run from, so it stays editable.
pub fn default_config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(CONFIG_FILE)
}

/// Default browser profile directory: `~/.tripwire/profile`.
/// Keeping it between runs means the manual login usually survives a restart.
pub fn default_profile_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".tripwire")
        .join("profile")
}
