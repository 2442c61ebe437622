//! Trigger/reply configuration backed by a flat JSON file.
//!
//! The file holds a single object:
//!
//! ```json
//! { "TRIGGERS": ["@team"], "REPLY_TEXT": "Team Take" }
//! ```
//!
//! Loading never fails: a missing file is created with the defaults, a file
//! with one key missing is patched in memory, and an unreadable file falls
//! back to the defaults without being overwritten.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::consts::{DEFAULT_REPLY, DEFAULT_TRIGGERS};

/// The active trigger set and reply text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(rename = "TRIGGERS")]
    pub triggers: Vec<String>,
    #[serde(rename = "REPLY_TEXT")]
    pub reply_text: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            triggers: DEFAULT_TRIGGERS.iter().map(|t| t.to_string()).collect(),
            reply_text: DEFAULT_REPLY.to_string(),
        }
    }
}

/// Rejections for operator-supplied settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("triggers cannot be empty")]
    EmptyTriggers,
    #[error("triggers cannot contain a blank entry")]
    BlankTrigger,
    #[error("reply message cannot be empty")]
    EmptyReply,
}

impl BotConfig {
    pub fn new(triggers: Vec<String>, reply_text: impl Into<String>) -> Self {
        Self {
            triggers,
            reply_text: reply_text.into(),
        }
    }

    /// Build a config from the settings form: comma-separated triggers and a
    /// reply line. Blank triggers are dropped, everything is trimmed.
    pub fn from_input(triggers: &str, reply: &str) -> Result<Self, ConfigError> {
        let config = Self::new(parse_triggers(triggers), reply.trim());
        config.validate()?;
        Ok(config)
    }

    /// Operator edits must leave something to match and something to send.
    /// A blank trigger would match every message, so none are allowed.
    /// A file on disk may still carry an empty trigger list; that only
    /// produces a warning at load time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.triggers.is_empty() {
            return Err(ConfigError::EmptyTriggers);
        }
        if self.triggers.iter().any(|t| t.trim().is_empty()) {
            return Err(ConfigError::BlankTrigger);
        }
        if self.reply_text.trim().is_empty() {
            return Err(ConfigError::EmptyReply);
        }
        Ok(())
    }

    /// Triggers joined back into the comma-separated form.
    pub fn triggers_display(&self) -> String {
        self.triggers.join(", ")
    }
}

/// Split a comma-separated trigger list, dropping blanks.
pub fn parse_triggers(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Where a loaded config came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from disk as-is.
    File,
    /// No file existed; the defaults were written to disk.
    Created,
    /// The file lacked some keys; those were filled from the defaults.
    Patched { missing: Vec<&'static str> },
    /// The file could not be read or parsed; defaults are in use and the
    /// file was left untouched.
    Invalid(String),
}

/// A config plus its provenance.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: BotConfig,
    pub source: ConfigSource,
}

/// Same shape as [`BotConfig`] but tolerant of missing keys.
#[derive(Deserialize)]
struct PartialConfig {
    #[serde(rename = "TRIGGERS")]
    triggers: Option<Vec<String>>,
    #[serde(rename = "REPLY_TEXT")]
    reply_text: Option<String>,
}

/// Reads and writes the config file at a fixed path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the config, falling back to defaults where needed.
    pub fn load(&self) -> LoadedConfig {
        info!(path = %self.path.display(), "loading configuration");

        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "config file not found, creating it with defaults");
                let config = BotConfig::default();
                if let Err(e) = self.save(&config) {
                    error!(error = %e, "could not write default config");
                }
                return LoadedConfig {
                    config,
                    source: ConfigSource::Created,
                };
            }
            Err(e) => return invalid(format!("cannot read config: {e}")),
        };

        let partial: PartialConfig = match serde_json::from_str(&raw) {
            Ok(partial) => partial,
            Err(e) => return invalid(format!("config is not valid JSON: {e}")),
        };

        let mut missing = Vec::new();
        let defaults = BotConfig::default();
        let triggers = partial.triggers.unwrap_or_else(|| {
            missing.push("TRIGGERS");
            defaults.triggers
        });
        let reply_text = partial.reply_text.unwrap_or_else(|| {
            missing.push("REPLY_TEXT");
            defaults.reply_text
        });
        let config = BotConfig::new(triggers, reply_text);

        if config.triggers.is_empty() {
            warn!("TRIGGERS list is empty, the bot will not respond to anything");
        }

        let source = if missing.is_empty() {
            ConfigSource::File
        } else {
            error!(?missing, "config keys missing, using defaults for them");
            ConfigSource::Patched { missing }
        };
        LoadedConfig { config, source }
    }

    /// Write the config as pretty JSON, replacing the file atomically.
    pub fn save(&self, config: &BotConfig) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        config
            .serialize(&mut ser)
            .context("failed to serialize config")?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).context("failed to create temp file")?;
        tmp.write_all(&buf)?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .with_context(|| format!("failed to write {}", self.path.display()))?;

        info!(path = %self.path.display(), "configuration saved");
        Ok(())
    }
}

fn invalid(reason: String) -> LoadedConfig {
    error!(%reason, "using default configuration");
    LoadedConfig {
        config: BotConfig::default(),
        source: ConfigSource::Invalid(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> ConfigStore {
        ConfigStore::new(dir.path().join("config.json"))
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let loaded = store.load();
        assert_eq!(loaded.source, ConfigSource::Created);
        assert_eq!(loaded.config, BotConfig::default());
        assert!(store.path().exists());

        let again = store.load();
        assert_eq!(again.source, ConfigSource::File);
        assert_eq!(again.config.triggers, vec!["@team"]);
        assert_eq!(again.config.reply_text, "Team Take");
    }

    #[test]
    fn malformed_json_falls_back_without_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{ not json").unwrap();

        let loaded = store.load();
        assert!(matches!(loaded.source, ConfigSource::Invalid(_)));
        assert_eq!(loaded.config, BotConfig::default());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "{ not json");
    }

    #[test]
    fn wrong_types_are_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), r#"{"TRIGGERS": "@team", "REPLY_TEXT": 5}"#).unwrap();

        assert!(matches!(store.load().source, ConfigSource::Invalid(_)));
    }

    #[test]
    fn missing_key_is_patched_from_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), r#"{"TRIGGERS": ["urgent"]}"#).unwrap();

        let loaded = store.load();
        assert_eq!(
            loaded.source,
            ConfigSource::Patched {
                missing: vec!["REPLY_TEXT"]
            }
        );
        assert_eq!(loaded.config.triggers, vec!["urgent"]);
        assert_eq!(loaded.config.reply_text, "Team Take");
    }

    #[test]
    fn empty_trigger_list_loads() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), r#"{"TRIGGERS": [], "REPLY_TEXT": "hi"}"#).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.source, ConfigSource::File);
        assert!(loaded.config.triggers.is_empty());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let config = BotConfig::new(vec!["ping".into(), "@ops".into()], "pong");

        store.save(&config).unwrap();
        let loaded = store.load();
        assert_eq!(loaded.source, ConfigSource::File);
        assert_eq!(loaded.config, config);
    }

    #[test]
    fn save_uses_upper_case_keys_and_four_space_indent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&BotConfig::default()).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"TRIGGERS\""));
        assert!(raw.contains("\"REPLY_TEXT\""));
        assert!(raw.contains("\n    \"TRIGGERS\""));
    }

    #[test]
    fn save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("nested").join("config.json"));
        store.save(&BotConfig::default()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn parse_triggers_drops_blanks() {
        assert_eq!(parse_triggers(" @team, ,urgent ,"), vec!["@team", "urgent"]);
        assert!(parse_triggers("  ").is_empty());
    }

    #[test]
    fn from_input_validates() {
        assert_eq!(
            BotConfig::from_input(" , ", "hi"),
            Err(ConfigError::EmptyTriggers)
        );
        assert_eq!(
            BotConfig::from_input("@team", "   "),
            Err(ConfigError::EmptyReply)
        );
        let config = BotConfig::from_input("@team, help ", " On it ").unwrap();
        assert_eq!(config.triggers, vec!["@team", "help"]);
        assert_eq!(config.reply_text, "On it");
    }

    #[test]
    fn blank_entry_among_triggers_is_rejected() {
        let config = BotConfig::new(vec!["@team".into(), "".into()], "Team Take");
        assert_eq!(config.validate(), Err(ConfigError::BlankTrigger));
        let config = BotConfig::new(vec![" @team".into(), " ".into()], "Team Take");
        assert_eq!(config.validate(), Err(ConfigError::BlankTrigger));
        assert_eq!(
            BotConfig::new(vec![], "Team Take").validate(),
            Err(ConfigError::EmptyTriggers)
        );
    }

    #[test]
    fn triggers_display_round_trips_through_parse() {
        let config = BotConfig::new(vec!["a".into(), "b c".into()], "x");
        assert_eq!(config.triggers_display(), "a, b c");
        assert_eq!(parse_triggers(&config.triggers_display()), config.triggers);
    }
}
