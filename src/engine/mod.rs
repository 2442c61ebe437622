pub mod poll;

use crate::consts::{DEFAULT_COMPOSE_SELECTOR, DEFAULT_MESSAGE_SELECTOR};

/// What one tick of the poll loop observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing visible, or the latest message was already seen.
    NoNewMessage,
    /// A new message arrived but matched no trigger (or the reply failed).
    NewMessageIgnored,
    /// A new message matched a trigger and the reply was submitted.
    TriggerFired,
    /// The browser is gone. The engine has dropped its session; do not tick
    /// again.
    SessionLost,
}

impl TickOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TickOutcome::NoNewMessage => "no_new_message",
            TickOutcome::NewMessageIgnored => "new_message_ignored",
            TickOutcome::TriggerFired => "trigger_fired",
            TickOutcome::SessionLost => "session_lost",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// No session is attached (never attached, released, or lost), or one
    /// is already attached when attaching.
    #[error("engine not ready: {0}")]
    NotReady(&'static str),
}

/// CSS selectors for the two parts of the page the engine touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selectors {
    /// Matches every message body in the open channel, oldest first.
    pub message: String,
    /// Matches the compose box.
    pub compose: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            message: DEFAULT_MESSAGE_SELECTOR.to_string(),
            compose: DEFAULT_COMPOSE_SELECTOR.to_string(),
        }
    }
}

/// Case-insensitive substring match against any trigger.
pub fn matches_trigger(triggers: &[String], text: &str) -> bool {
    let text = text.to_lowercase();
    triggers
        .iter()
        .any(|trigger| text.contains(&trigger.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triggers(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn match_ignores_case() {
        assert!(matches_trigger(&triggers(&["@Team"]), "hey @TEAM look"));
        assert!(matches_trigger(&triggers(&["urgent"]), "URGENT: prod down"));
    }

    #[test]
    fn match_is_substring() {
        assert!(matches_trigger(&triggers(&["team"]), "teammates"));
        assert!(!matches_trigger(&triggers(&["teams"]), "team"));
    }

    #[test]
    fn any_trigger_is_enough() {
        assert!(matches_trigger(&triggers(&["foo", "bar"]), "only bar here"));
    }

    #[test]
    fn empty_trigger_set_never_matches() {
        assert!(!matches_trigger(&[], "@team"));
    }

    #[test]
    fn non_ascii_case_folding() {
        assert!(matches_trigger(&triggers(&["ÉQUIPE"]), "salut l'équipe"));
    }

    #[test]
    fn outcome_names() {
        assert_eq!(TickOutcome::TriggerFired.as_str(), "trigger_fired");
        assert_eq!(TickOutcome::SessionLost.as_str(), "session_lost");
    }
}
