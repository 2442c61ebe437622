use std::sync::Arc;

use tracing::{error, info, warn};

use super::{EngineError, Selectors, TickOutcome, matches_trigger};
use crate::config::BotConfig;
use crate::session::{Session, SessionError, SessionSlot};

/// Watches the last visible message and answers triggers.
///
/// De-duplication is a single cursor holding the last message text seen.
/// Two different messages arriving between ticks only get the newer one
/// evaluated.
pub struct PollEngine {
    config: BotConfig,
    selectors: Selectors,
    cursor: String,
    session: SessionSlot,
}

impl PollEngine {
    pub fn new(config: BotConfig, selectors: Selectors) -> Self {
        Self {
            config,
            selectors,
            cursor: String::new(),
            session: SessionSlot::new(),
        }
    }

    /// Swap triggers and reply. The next tick uses the new ones.
    pub fn configure(&mut self, config: BotConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Text of the last message seen.
    pub fn cursor(&self) -> &str {
        &self.cursor
    }

    /// A shared handle on the session slot, so a controller can close the
    /// browser without waiting for the poll loop.
    pub fn session_slot(&self) -> SessionSlot {
        self.session.clone()
    }

    pub async fn attach_session(&self, session: Arc<dyn Session>) -> Result<(), EngineError> {
        if self.session.attach(session).await {
            Ok(())
        } else {
            Err(EngineError::NotReady("a session is already attached"))
        }
    }

    /// Close the session (if any) and forget the cursor. Safe to repeat.
    pub async fn release(&mut self) {
        self.session.release().await;
        self.cursor.clear();
    }

    /// One poll: read the newest message, commit it to the cursor, reply if
    /// it matches a trigger.
    pub async fn tick(&mut self) -> Result<TickOutcome, EngineError> {
        let session = self
            .session
            .current()
            .await
            .ok_or(EngineError::NotReady("no session attached"))?;

        let text = match self.latest_message(session.as_ref()).await {
            Ok(Some(text)) => text,
            Ok(None) => return Ok(TickOutcome::NoNewMessage),
            Err(e) if e.is_terminated() => return Ok(self.lose_session(e).await),
            Err(SessionError::ElementNotFound(selector)) => {
                warn!(%selector, "message elements not found, is the page loaded and logged in?");
                return Ok(TickOutcome::NoNewMessage);
            }
            Err(e) => {
                warn!(error = %e, "could not read messages");
                return Ok(TickOutcome::NoNewMessage);
            }
        };

        if text == self.cursor {
            return Ok(TickOutcome::NoNewMessage);
        }

        info!(%text, "new message");
        self.cursor = text;

        if !matches_trigger(&self.config.triggers, &self.cursor) {
            return Ok(TickOutcome::NewMessageIgnored);
        }

        info!(triggers = ?self.config.triggers, "trigger detected");
        match self.reply(session.as_ref()).await {
            Ok(()) => {
                info!(reply = %self.config.reply_text, "reply sent");
                Ok(TickOutcome::TriggerFired)
            }
            Err(e) if e.is_terminated() => Ok(self.lose_session(e).await),
            Err(e) => {
                error!(error = %e, "reply failed");
                Ok(TickOutcome::NewMessageIgnored)
            }
        }
    }

    /// Trimmed text of the last message element, `None` when there is no
    /// message or it is blank.
    async fn latest_message(&self, session: &dyn Session) -> Result<Option<String>, SessionError> {
        let elements = session.find_all(&self.selectors.message).await?;
        let Some(last) = elements.last() else {
            return Ok(None);
        };
        let text = last.text().await?.trim().to_string();
        Ok((!text.is_empty()).then_some(text))
    }

    async fn reply(&self, session: &dyn Session) -> Result<(), SessionError> {
        let compose = session.find_one(&self.selectors.compose).await?;
        compose.click().await?;
        compose.type_text(&self.config.reply_text).await?;
        compose.submit().await
    }

    async fn lose_session(&mut self, cause: SessionError) -> TickOutcome {
        error!(error = %cause, "connection to browser lost");
        self.release().await;
        TickOutcome::SessionLost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::mock::MockSession;

    fn engine() -> PollEngine {
        PollEngine::new(BotConfig::default(), Selectors::default())
    }

    #[tokio::test]
    async fn tick_without_session_is_not_ready() {
        let mut engine = engine();
        assert!(matches!(engine.tick().await, Err(EngineError::NotReady(_))));
    }

    #[tokio::test]
    async fn blank_message_is_not_new() {
        let mut engine = engine();
        engine
            .attach_session(Arc::new(MockSession::with_messages(&["hello", "   "])))
            .await
            .unwrap();
        assert_eq!(engine.tick().await.unwrap(), TickOutcome::NoNewMessage);
        assert_eq!(engine.cursor(), "");
    }

    #[tokio::test]
    async fn cursor_holds_trimmed_text() {
        let mut engine = engine();
        engine
            .attach_session(Arc::new(MockSession::with_messages(&["  hi there \n"])))
            .await
            .unwrap();
        engine.tick().await.unwrap();
        assert_eq!(engine.cursor(), "hi there");
    }

    #[tokio::test]
    async fn release_clears_cursor() {
        let mut engine = engine();
        engine
            .attach_session(Arc::new(MockSession::with_messages(&["hi"])))
            .await
            .unwrap();
        engine.tick().await.unwrap();
        engine.release().await;
        assert_eq!(engine.cursor(), "");
    }
}
