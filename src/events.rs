//! Decoupled event bus between the bot and whatever shell is driving it.
//!
//! The poll loop and the registry emit via [`EventBus::emit`]; shells
//! subscribe via [`EventBus::subscribe`] to show live status. Built on
//! [`tokio::sync::broadcast`] so a slow listener never blocks the bot.

use tokio::sync::broadcast;

use crate::config::BotConfig;
use crate::lifecycle::LifecycleState;

/// Events that flow through the system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The bot moved to a new lifecycle state.
    StateChanged { state: LifecycleState },
    /// A message that was not seen before.
    MessageSeen { text: String },
    /// A trigger matched and the reply went out.
    TriggerFired { message: String, reply: String },
    /// Triggers or reply text were changed.
    ConfigChanged { config: BotConfig },
}

/// A broadcast channel that any component can emit to or subscribe from.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all current subscribers.
    /// Returns the number of receivers that will see it.
    pub fn emit(&self, event: Event) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_reaches_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.emit(Event::StateChanged {
            state: LifecycleState::Monitoring,
        });

        assert_eq!(
            rx.recv().await.unwrap(),
            Event::StateChanged {
                state: LifecycleState::Monitoring
            }
        );
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(Event::MessageSeen {
            text: "@team ping".to_string(),
        });

        assert_eq!(rx1.recv().await.unwrap(), rx2.recv().await.unwrap());
    }

    #[test]
    fn emit_without_subscribers_returns_zero() {
        let bus = EventBus::default();
        let count = bus.emit(Event::ConfigChanged {
            config: BotConfig::default(),
        });
        assert_eq!(count, 0);
    }

    #[test]
    fn emit_with_subscriber_returns_count() {
        let bus = EventBus::default();
        let _rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();

        let count = bus.emit(Event::StateChanged {
            state: LifecycleState::Stopped,
        });
        assert_eq!(count, 2);
    }
}
