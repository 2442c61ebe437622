use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{Element, Launcher, Session, SessionError};

/// Selector the mock treats as the compose box. Anything else is a message
/// query.
pub const MOCK_COMPOSE_SELECTOR: &str = "div[role='textbox']";

#[derive(Default)]
struct MockState {
    messages: Vec<String>,
    find_all_errors: VecDeque<SessionError>,
    compose_error: Option<SessionError>,
    typing_error: Option<SessionError>,
    draft: String,
    sent: Vec<String>,
    opened: Vec<String>,
    closes: usize,
    closed: bool,
}

impl MockState {
    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Terminated("mock session closed".to_string()));
        }
        Ok(())
    }
}

/// A scripted chat page for tests. Messages are set by the test; replies
/// typed and submitted into the compose box are recorded.
#[derive(Clone, Default)]
pub struct MockSession {
    state: Arc<Mutex<MockState>>,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages(messages: &[&str]) -> Self {
        let session = Self::new();
        session.set_messages(messages);
        session
    }

    /// Replace the visible channel contents.
    pub fn set_messages(&self, messages: &[&str]) {
        self.state.lock().unwrap().messages = messages.iter().map(|m| m.to_string()).collect();
    }

    /// Append a message to the bottom of the channel.
    pub fn push_message(&self, message: &str) {
        self.state.lock().unwrap().messages.push(message.to_string());
    }

    /// Make the next message query fail with `error`. Queued errors are
    /// consumed one per query.
    pub fn fail_next_query(&self, error: SessionError) {
        self.state.lock().unwrap().find_all_errors.push_back(error);
    }

    /// Make the compose box lookup fail until cleared with `None`.
    pub fn set_compose_error(&self, error: Option<SessionError>) {
        self.state.lock().unwrap().compose_error = error;
    }

    /// Make typing into the compose box fail until cleared with `None`.
    pub fn set_typing_error(&self, error: Option<SessionError>) {
        self.state.lock().unwrap().typing_error = error;
    }

    /// Simulate the browser dying underneath the bot.
    pub fn crash(&self) {
        self.state.lock().unwrap().closed = true;
    }

    /// Every reply submitted so far.
    pub fn sent(&self) -> Vec<String> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.state.lock().unwrap().opened.clone()
    }

    /// How many times `close` was called.
    pub fn close_count(&self) -> usize {
        self.state.lock().unwrap().closes
    }
}

#[async_trait]
impl Session for MockSession {
    async fn open(&self, url: &str) -> Result<(), SessionError> {
        let mut state = self.state.lock().unwrap();
        state.ensure_open()?;
        state.opened.push(url.to_string());
        Ok(())
    }

    async fn find_all(&self, _selector: &str) -> Result<Vec<Box<dyn Element>>, SessionError> {
        let mut state = self.state.lock().unwrap();
        state.ensure_open()?;
        if let Some(error) = state.find_all_errors.pop_front() {
            return Err(error);
        }
        Ok(state
            .messages
            .iter()
            .map(|text| {
                Box::new(MockElement::Message {
                    text: text.clone(),
                    state: Arc::clone(&self.state),
                }) as Box<dyn Element>
            })
            .collect())
    }

    async fn find_one(&self, selector: &str) -> Result<Box<dyn Element>, SessionError> {
        let state = self.state.lock().unwrap();
        state.ensure_open()?;
        if selector != MOCK_COMPOSE_SELECTOR {
            return Err(SessionError::ElementNotFound(selector.to_string()));
        }
        if let Some(error) = &state.compose_error {
            return Err(error.clone());
        }
        Ok(Box::new(MockElement::Compose {
            state: Arc::clone(&self.state),
        }))
    }

    async fn close(&self) -> Result<(), SessionError> {
        let mut state = self.state.lock().unwrap();
        state.closes += 1;
        state.closed = true;
        Ok(())
    }
}

enum MockElement {
    Message {
        text: String,
        state: Arc<Mutex<MockState>>,
    },
    Compose {
        state: Arc<Mutex<MockState>>,
    },
}

impl MockElement {
    fn state(&self) -> &Arc<Mutex<MockState>> {
        match self {
            MockElement::Message { state, .. } | MockElement::Compose { state } => state,
        }
    }
}

#[async_trait]
impl Element for MockElement {
    async fn text(&self) -> Result<String, SessionError> {
        self.state().lock().unwrap().ensure_open()?;
        match self {
            MockElement::Message { text, .. } => Ok(text.clone()),
            MockElement::Compose { state } => Ok(state.lock().unwrap().draft.clone()),
        }
    }

    async fn click(&self) -> Result<(), SessionError> {
        self.state().lock().unwrap().ensure_open()
    }

    async fn type_text(&self, text: &str) -> Result<(), SessionError> {
        let mut state = self.state().lock().unwrap();
        state.ensure_open()?;
        if let Some(error) = &state.typing_error {
            return Err(error.clone());
        }
        state.draft.push_str(text);
        Ok(())
    }

    async fn submit(&self) -> Result<(), SessionError> {
        let mut state = self.state().lock().unwrap();
        state.ensure_open()?;
        let draft = std::mem::take(&mut state.draft);
        state.sent.push(draft);
        Ok(())
    }
}

/// Hands out pre-built sessions in order, like a browser that opens on
/// demand. Errors in the queue simulate a failed launch.
pub struct MockLauncher {
    queue: Mutex<VecDeque<Result<MockSession, SessionError>>>,
    launches: AtomicUsize,
}

impl MockLauncher {
    pub fn new(results: Vec<Result<MockSession, SessionError>>) -> Self {
        Self {
            queue: Mutex::new(results.into()),
            launches: AtomicUsize::new(0),
        }
    }

    /// A launcher that yields the given sessions, one per launch.
    pub fn with_sessions(sessions: Vec<MockSession>) -> Self {
        Self::new(sessions.into_iter().map(Ok).collect())
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Launcher for MockLauncher {
    async fn launch(&self) -> Result<Arc<dyn Session>, SessionError> {
        let i = self.launches.fetch_add(1, Ordering::SeqCst);
        let next = self.queue.lock().unwrap().pop_front().ok_or_else(|| {
            SessionError::Command(format!("MockLauncher: no more sessions (launched {} times)", i + 1))
        })?;
        Ok(Arc::new(next?))
    }
}
