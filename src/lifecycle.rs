//! The bot's lifecycle state machine.
//!
//! ```text
//! Idle ──setup──▶ AwaitingManualReady ──ready──▶ Monitoring
//!                        │                           │
//!                        └────stop / timeout────▶ Stopped ◀──stop / session lost
//! ```
//!
//! `Stopped` is terminal. A fresh bot is needed to run again.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Idle,
    AwaitingManualReady,
    Monitoring,
    Stopped,
}

impl LifecycleState {
    /// Whether `next` is a legal step from `self`.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Idle, AwaitingManualReady)
                | (AwaitingManualReady, Monitoring)
                | (AwaitingManualReady, Stopped)
                | (Monitoring, Stopped)
        )
    }

    /// A browser is open and the bot owns it.
    pub fn is_running(self) -> bool {
        matches!(
            self,
            LifecycleState::AwaitingManualReady | LifecycleState::Monitoring
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Idle => "idle",
            LifecycleState::AwaitingManualReady => "awaiting_manual_ready",
            LifecycleState::Monitoring => "monitoring",
            LifecycleState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move from {from} to {to}")]
pub struct LifecycleError {
    pub from: LifecycleState,
    pub to: LifecycleState,
}

/// Shared, observable lifecycle state for one bot.
///
/// Every clone sees the same state. Transitions are checked and applied
/// atomically, so the worker and a controller racing to stop the bot
/// cannot both win.
#[derive(Clone)]
pub struct LifecycleCell {
    tx: Arc<watch::Sender<LifecycleState>>,
}

impl Default for LifecycleCell {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Idle);
        Self { tx: Arc::new(tx) }
    }

    pub fn get(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    /// Move to `next` if the state machine allows it.
    pub fn advance(&self, next: LifecycleState) -> Result<(), LifecycleError> {
        let mut result = Ok(());
        self.tx.send_if_modified(|state| {
            if state.can_transition_to(next) {
                *state = next;
                true
            } else {
                result = Err(LifecycleError { from: *state, to: next });
                false
            }
        });
        result
    }

    /// Move to `Stopped` from any running state. Returns `true` if this call
    /// did the stopping.
    pub fn stop(&self) -> bool {
        self.advance(LifecycleState::Stopped).is_ok()
    }

    /// Observe state changes.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleState::*;

    const ALL: [LifecycleState; 4] = [Idle, AwaitingManualReady, Monitoring, Stopped];

    #[test]
    fn happy_path() {
        let cell = LifecycleCell::new();
        assert_eq!(cell.get(), Idle);
        cell.advance(AwaitingManualReady).unwrap();
        cell.advance(Monitoring).unwrap();
        assert!(cell.stop());
        assert_eq!(cell.get(), Stopped);
    }

    #[test]
    fn stopped_is_terminal() {
        for next in ALL {
            assert!(!Stopped.can_transition_to(next), "stopped -> {next}");
        }
    }

    #[test]
    fn cannot_skip_the_ready_wait() {
        assert!(!Idle.can_transition_to(Monitoring));
        let cell = LifecycleCell::new();
        let err = cell.advance(Monitoring).unwrap_err();
        assert_eq!(err, LifecycleError { from: Idle, to: Monitoring });
        assert_eq!(cell.get(), Idle);
    }

    #[test]
    fn no_transition_goes_backwards() {
        assert!(!Monitoring.can_transition_to(AwaitingManualReady));
        assert!(!Monitoring.can_transition_to(Idle));
        assert!(!AwaitingManualReady.can_transition_to(Idle));
    }

    #[test]
    fn stop_only_wins_once() {
        let cell = LifecycleCell::new();
        cell.advance(AwaitingManualReady).unwrap();
        let other = cell.clone();
        assert!(cell.stop());
        assert!(!other.stop());
        assert_eq!(other.get(), Stopped);
    }

    #[test]
    fn idle_cannot_be_stopped() {
        let cell = LifecycleCell::new();
        assert!(!cell.stop());
        assert_eq!(cell.get(), Idle);
    }

    #[test]
    fn running_states() {
        assert!(!Idle.is_running());
        assert!(AwaitingManualReady.is_running());
        assert!(Monitoring.is_running());
        assert!(!Stopped.is_running());
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let cell = LifecycleCell::new();
        let mut rx = cell.subscribe();
        cell.advance(AwaitingManualReady).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), AwaitingManualReady);
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&AwaitingManualReady).unwrap();
        assert_eq!(json, "\"awaiting_manual_ready\"");
    }
}
