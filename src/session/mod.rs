pub mod chromium;
pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Failures surfaced by the browser layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Nothing matched a selector. Usually the page is still loading or the
    /// user got logged out.
    #[error("no element matches `{0}`")]
    ElementNotFound(String),
    /// The browser is gone. Nothing on this session will work again.
    #[error("session terminated: {0}")]
    Terminated(String),
    /// Any other driver failure on a live session.
    #[error("browser command failed: {0}")]
    Command(String),
}

impl SessionError {
    pub fn is_terminated(&self) -> bool {
        matches!(self, SessionError::Terminated(_))
    }
}

/// A handle to one DOM element.
#[async_trait]
pub trait Element: Send + Sync {
    /// Rendered text of the element (untrimmed).
    async fn text(&self) -> Result<String, SessionError>;
    async fn click(&self) -> Result<(), SessionError>;
    /// Type text into the element as keystrokes.
    async fn type_text(&self, text: &str) -> Result<(), SessionError>;
    /// Submit whatever was typed (Enter).
    async fn submit(&self) -> Result<(), SessionError>;
}

/// A live browser session the bot watches and types into.
#[async_trait]
pub trait Session: Send + Sync {
    /// Navigate to `url`.
    async fn open(&self, url: &str) -> Result<(), SessionError>;
    /// Every element matching `selector`, in document order. Empty when
    /// nothing matches.
    async fn find_all(&self, selector: &str) -> Result<Vec<Box<dyn Element>>, SessionError>;
    /// The first element matching `selector`.
    async fn find_one(&self, selector: &str) -> Result<Box<dyn Element>, SessionError>;
    /// Shut the browser down.
    async fn close(&self) -> Result<(), SessionError>;
}

/// Creates sessions. The browser itself, or a script in tests.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn Session>, SessionError>;
}

/// Holds at most one live session.
///
/// Cloning shares the slot, which lets a controller close the browser
/// immediately while the poll loop still holds its own clone. Releasing
/// takes the session out first, so a second release (from either side)
/// finds the slot empty and does nothing.
#[derive(Clone, Default)]
pub struct SessionSlot {
    inner: Arc<Mutex<Option<Arc<dyn Session>>>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a session in the slot. Returns `false` (and drops `session`) if
    /// the slot is occupied.
    pub async fn attach(&self, session: Arc<dyn Session>) -> bool {
        let mut slot = self.inner.lock().await;
        if slot.is_some() {
            return false;
        }
        *slot = Some(session);
        true
    }

    /// The current session, if any.
    pub async fn current(&self) -> Option<Arc<dyn Session>> {
        self.inner.lock().await.clone()
    }

    pub async fn is_attached(&self) -> bool {
        self.inner.lock().await.is_some()
    }

    /// Take the session out and close it. Returns `true` if there was one.
    pub async fn release(&self) -> bool {
        let Some(session) = self.inner.lock().await.take() else {
            return false;
        };
        info!("closing browser");
        if let Err(e) = session.close().await {
            warn!(error = %e, "browser did not close cleanly");
        }
        true
    }
}
