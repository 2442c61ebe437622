//! Process-wide home of the bot.
//!
//! Every shell (HTTP service, console, script) drives the bot through one
//! [`BotRegistry`]. It holds at most one [`BotHandle`], so at most one
//! engine polls at a time, and it owns the current trigger/reply settings
//! and their file.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::config::{BotConfig, ConfigError, ConfigStore};
use crate::engine::Selectors;
use crate::engine::poll::PollEngine;
use crate::events::{Event, EventBus};
use crate::lifecycle::{LifecycleCell, LifecycleState};
use crate::monitor::{self, BotHandle, MonitorOptions};
use crate::session::Launcher;

/// Why a control request was refused.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("bot is already running")]
    AlreadyRunning,
    #[error("bot is not running")]
    NotRunning,
    #[error("bot is {0}, not waiting for the ready signal")]
    NotAwaitingReady(LifecycleState),
    #[error("stop the bot before changing settings")]
    Busy,
    #[error("browser setup failed: {0}")]
    SessionSetupFailed(String),
    #[error("invalid settings: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error("failed to save settings: {0}")]
    SaveFailed(String),
}

/// Everything needed to build a bot besides its settings.
#[derive(Debug, Clone)]
pub struct BotOptions {
    pub target_url: String,
    pub selectors: Selectors,
    pub monitor: MonitorOptions,
}

pub struct BotRegistry {
    store: ConfigStore,
    launcher: Arc<dyn Launcher>,
    options: BotOptions,
    events: Arc<EventBus>,
    config: RwLock<BotConfig>,
    active: Mutex<Option<BotHandle>>,
}

impl BotRegistry {
    /// Create the registry and load settings from `store`.
    pub fn new(store: ConfigStore, launcher: Arc<dyn Launcher>, options: BotOptions) -> Self {
        let loaded = store.load();
        Self {
            store,
            launcher,
            options,
            events: Arc::new(EventBus::default()),
            config: RwLock::new(loaded.config),
            active: Mutex::new(None),
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn options(&self) -> &BotOptions {
        &self.options
    }

    /// Settings the next start will use (and the running bot, if any, has).
    pub async fn config(&self) -> BotConfig {
        self.config.read().await.clone()
    }

    pub async fn status(&self) -> LifecycleState {
        self.active
            .lock()
            .await
            .as_ref()
            .map(BotHandle::state)
            .unwrap_or(LifecycleState::Idle)
    }

    /// Lifecycle of the current bot, for shells that want to wait on it.
    pub async fn lifecycle(&self) -> Option<LifecycleCell> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|handle| handle.lifecycle().clone())
    }

    /// Reload settings, open the browser on the chat app and wait for the
    /// operator to log in.
    pub async fn start(&self) -> Result<(), ControlError> {
        let mut active = self.active.lock().await;
        if let Some(handle) = active.as_ref()
            && handle.state().is_running()
        {
            return Err(ControlError::AlreadyRunning);
        }
        if let Some(previous) = active.take() {
            // Already stopped; make sure nothing of it lingers.
            previous.stop().await;
        }

        let config = self.store.load().config;
        *self.config.write().await = config.clone();
        let engine = PollEngine::new(config, self.options.selectors.clone());

        info!(url = %self.options.target_url, "opening browser");
        let session = self.launcher.launch().await.map_err(|e| {
            error!(error = %e, "could not initialize the browser");
            ControlError::SessionSetupFailed(e.to_string())
        })?;
        if let Err(e) = session.open(&self.options.target_url).await {
            error!(error = %e, "could not open the chat app");
            let _ = session.close().await;
            return Err(ControlError::SessionSetupFailed(e.to_string()));
        }
        engine
            .attach_session(session)
            .await
            .map_err(|e| ControlError::SessionSetupFailed(e.to_string()))?;

        let lifecycle = LifecycleCell::new();
        if let Err(e) = lifecycle.advance(LifecycleState::AwaitingManualReady) {
            let mut engine = engine;
            engine.release().await;
            return Err(ControlError::SessionSetupFailed(e.to_string()));
        }
        self.events.emit(Event::StateChanged {
            state: LifecycleState::AwaitingManualReady,
        });
        info!("ACTION REQUIRED: log in manually in the browser window, open the channel, then signal ready");

        *active = Some(monitor::spawn(
            engine,
            lifecycle,
            self.options.monitor.clone(),
            Arc::clone(&self.events),
        ));
        Ok(())
    }

    /// The operator is logged in and the channel is open.
    pub async fn signal_ready(&self) -> Result<(), ControlError> {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(handle) => handle
                .signal_ready()
                .map_err(|e| ControlError::NotAwaitingReady(e.from)),
            None => Err(ControlError::NotAwaitingReady(LifecycleState::Idle)),
        }
    }

    /// Stop the bot and close its browser.
    pub async fn stop(&self) -> Result<(), ControlError> {
        let active = self.active.lock().await;
        let Some(handle) = active.as_ref() else {
            return Err(ControlError::NotRunning);
        };
        if handle.stop().await {
            Ok(())
        } else {
            Err(ControlError::NotRunning)
        }
    }

    /// Validate, persist and apply new settings. Refused while monitoring.
    pub async fn reconfigure(&self, config: BotConfig) -> Result<(), ControlError> {
        config.validate()?;

        let active = self.active.lock().await;
        if let Some(handle) = active.as_ref()
            && handle.state() == LifecycleState::Monitoring
        {
            return Err(ControlError::Busy);
        }

        self.store
            .save(&config)
            .map_err(|e| ControlError::SaveFailed(format!("{e:#}")))?;
        *self.config.write().await = config.clone();

        if let Some(handle) = active.as_ref()
            && handle.state().is_running()
            && !handle.reconfigure(config.clone())
        {
            warn!("bot exited before the new settings reached it");
        }

        self.events.emit(Event::ConfigChanged { config });
        Ok(())
    }

    /// Stop whatever is running and wait for the worker to exit.
    pub async fn shutdown(&self) {
        let handle = self.active.lock().await.take();
        if let Some(handle) = handle {
            handle.stop().await;
            handle.join().await;
        }
    }
}
