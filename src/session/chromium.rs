//! Chromium over the DevTools protocol.
//!
//! The browser runs headed by default so the operator can log in by hand.
//! A persistent profile directory keeps that login between runs.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{Element, Launcher, Session, SessionError};

/// How to start the browser.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub profile_dir: PathBuf,
}

/// Launches a local Chromium.
pub struct ChromiumLauncher {
    options: BrowserOptions,
}

impl ChromiumLauncher {
    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }

    fn browser_config(&self) -> Result<BrowserConfig, SessionError> {
        let mut builder = BrowserConfig::builder()
            .user_data_dir(self.options.profile_dir.clone())
            .arg("--start-maximized")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-infobars");
        if !self.options.headless {
            builder = builder.with_head();
        }
        builder
            .build()
            .map_err(|e| SessionError::Command(format!("invalid browser config: {e}")))
    }
}

#[async_trait]
impl Launcher for ChromiumLauncher {
    async fn launch(&self) -> Result<Arc<dyn Session>, SessionError> {
        let config = self.browser_config()?;
        info!(profile = %self.options.profile_dir.display(), "launching browser");

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SessionError::Command(format!("could not launch browser: {e}")))?;

        let alive = Arc::new(AtomicBool::new(true));
        let handler_alive = Arc::clone(&alive);
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "devtools handler error");
                }
            }
            handler_alive.store(false, Ordering::SeqCst);
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(SessionError::Command(format!("could not open a tab: {e}")));
            }
        };

        Ok(Arc::new(ChromiumSession {
            browser: Mutex::new(Some(browser)),
            handler: Mutex::new(Some(handler_task)),
            page,
            alive,
        }))
    }
}

/// One browser with one tab.
pub struct ChromiumSession {
    browser: Mutex<Option<Browser>>,
    handler: Mutex<Option<JoinHandle<()>>>,
    page: Page,
    alive: Arc<AtomicBool>,
}

impl ChromiumSession {
    fn ensure_alive(&self) -> Result<(), SessionError> {
        if self.alive.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SessionError::Terminated("browser connection closed".to_string()))
        }
    }
}

/// Lost connections are fatal; everything else is a failed command.
fn classify(err: CdpError) -> SessionError {
    match err {
        CdpError::Ws(_) | CdpError::Io(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
            SessionError::Terminated(err.to_string())
        }
        other => SessionError::Command(other.to_string()),
    }
}

/// A selector query that failed on a live browser found nothing usable.
fn lookup_failed(err: CdpError, selector: &str) -> SessionError {
    match classify(err) {
        SessionError::Terminated(reason) => SessionError::Terminated(reason),
        _ => SessionError::ElementNotFound(selector.to_string()),
    }
}

#[async_trait]
impl Session for ChromiumSession {
    async fn open(&self, url: &str) -> Result<(), SessionError> {
        self.ensure_alive()?;
        self.page.goto(url).await.map_err(classify)?;
        Ok(())
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<Box<dyn Element>>, SessionError> {
        self.ensure_alive()?;
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| lookup_failed(e, selector))?;
        Ok(elements
            .into_iter()
            .map(|inner| Box::new(ChromiumElement { inner }) as Box<dyn Element>)
            .collect())
    }

    async fn find_one(&self, selector: &str) -> Result<Box<dyn Element>, SessionError> {
        self.ensure_alive()?;
        let inner = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| lookup_failed(e, selector))?;
        Ok(Box::new(ChromiumElement { inner }))
    }

    async fn close(&self) -> Result<(), SessionError> {
        let browser = self.browser.lock().await.take();
        let result = match browser {
            Some(mut browser) => {
                let closed = browser.close().await.map(|_| ()).map_err(classify);
                let _ = browser.wait().await;
                closed
            }
            None => Ok(()),
        };
        if let Some(handler) = self.handler.lock().await.take() {
            handler.abort();
        }
        self.alive.store(false, Ordering::SeqCst);
        result
    }
}

struct ChromiumElement {
    inner: chromiumoxide::Element,
}

#[async_trait]
impl Element for ChromiumElement {
    async fn text(&self) -> Result<String, SessionError> {
        Ok(self
            .inner
            .inner_text()
            .await
            .map_err(classify)?
            .unwrap_or_default())
    }

    async fn click(&self) -> Result<(), SessionError> {
        self.inner.click().await.map_err(classify)?;
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<(), SessionError> {
        self.inner.type_str(text).await.map_err(classify)?;
        Ok(())
    }

    async fn submit(&self) -> Result<(), SessionError> {
        self.inner.press_key("Enter").await.map_err(classify)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_response_is_terminal() {
        assert!(classify(CdpError::NoResponse).is_terminated());
    }

    #[test]
    fn failed_lookup_is_not_found() {
        let bad = serde_json::from_str::<u8>("x").unwrap_err();
        assert_eq!(
            lookup_failed(CdpError::Serde(bad), "li.message"),
            SessionError::ElementNotFound("li.message".to_string())
        );
        assert!(lookup_failed(CdpError::NoResponse, "li.message").is_terminated());
    }
}
