//! The background poll loop and the handle used to steer it.
//!
//! One worker task owns the [`PollEngine`] (and with it the cursor). The
//! foreground never touches the engine directly: it sends [`Control`]
//! requests, which the worker applies between ticks, and cancels a token to
//! stop it. Stopping also closes the browser right away through the shared
//! [`SessionSlot`], so the operator does not wait for the next tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::BotConfig;
use crate::consts::DEFAULT_POLL_INTERVAL;
use crate::engine::poll::PollEngine;
use crate::engine::{EngineError, TickOutcome};
use crate::events::{Event, EventBus};
use crate::lifecycle::{LifecycleCell, LifecycleError, LifecycleState};
use crate::session::SessionSlot;

/// Requests the foreground can queue for the worker.
#[derive(Debug, Clone)]
pub enum Control {
    /// The operator finished logging in.
    Ready,
    /// New triggers/reply, applied before the next tick.
    Reconfigure(BotConfig),
}

#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub poll_interval: Duration,
    /// Give up waiting for the ready signal after this long. `None` waits
    /// until stopped.
    pub ready_timeout: Option<Duration>,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            ready_timeout: None,
        }
    }
}

/// Foreground side of a running bot.
pub struct BotHandle {
    control: mpsc::UnboundedSender<Control>,
    cancel: CancellationToken,
    lifecycle: LifecycleCell,
    session: SessionSlot,
    events: Arc<EventBus>,
    task: JoinHandle<()>,
}

impl BotHandle {
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.get()
    }

    pub fn lifecycle(&self) -> &LifecycleCell {
        &self.lifecycle
    }

    /// Tell the worker the login is done. Only valid while it is waiting.
    pub fn signal_ready(&self) -> Result<(), LifecycleError> {
        let state = self.state();
        if state != LifecycleState::AwaitingManualReady {
            return Err(LifecycleError {
                from: state,
                to: LifecycleState::Monitoring,
            });
        }
        // The worker only drops its receiver once stopped; the state check
        // above already covers that.
        let _ = self.control.send(Control::Ready);
        Ok(())
    }

    /// Queue new settings. Returns `false` if the worker is gone.
    pub fn reconfigure(&self, config: BotConfig) -> bool {
        self.control.send(Control::Reconfigure(config)).is_ok()
    }

    /// Stop the worker and close the browser now. Returns `true` if this
    /// call moved the bot to `Stopped`. Safe to call repeatedly.
    pub async fn stop(&self) -> bool {
        self.cancel.cancel();
        let stopped = self.lifecycle.stop();
        if stopped {
            info!("shutdown initiated");
            self.events.emit(Event::StateChanged {
                state: LifecycleState::Stopped,
            });
        }
        self.session.release().await;
        stopped
    }

    /// Wait until the bot reaches `Stopped`.
    pub async fn stopped(&self) {
        let mut rx = self.lifecycle.subscribe();
        // The sender lives as long as `self`, so this only errors if the
        // handle is being torn down anyway.
        let _ = rx.wait_for(|state| *state == LifecycleState::Stopped).await;
    }

    /// Wait for the worker task to exit.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "monitor task ended abnormally");
        }
    }
}

/// Start the worker for an engine that already has its session attached.
/// `lifecycle` must be in `AwaitingManualReady`.
pub fn spawn(
    engine: PollEngine,
    lifecycle: LifecycleCell,
    options: MonitorOptions,
    events: Arc<EventBus>,
) -> BotHandle {
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let session = engine.session_slot();

    let worker = Worker {
        engine,
        control: control_rx,
        cancel: cancel.clone(),
        lifecycle: lifecycle.clone(),
        options,
        events: Arc::clone(&events),
    };
    let task = tokio::spawn(worker.run());

    BotHandle {
        control: control_tx,
        cancel,
        lifecycle,
        session,
        events,
        task,
    }
}

enum ReadyWait {
    Ready,
    Cancelled,
    TimedOut,
}

struct Worker {
    engine: PollEngine,
    control: mpsc::UnboundedReceiver<Control>,
    cancel: CancellationToken,
    lifecycle: LifecycleCell,
    options: MonitorOptions,
    events: Arc<EventBus>,
}

/// Forces `Stopped` if the worker unwinds, announcing it and closing the
/// browser the way an orderly exit would.
struct StopGuard {
    lifecycle: LifecycleCell,
    session: SessionSlot,
    events: Arc<EventBus>,
}

impl Drop for StopGuard {
    fn drop(&mut self) {
        if !self.lifecycle.stop() {
            return;
        }
        warn!("monitor exited without stopping, forcing shutdown");
        self.events.emit(Event::StateChanged {
            state: LifecycleState::Stopped,
        });
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let session = self.session.clone();
            runtime.spawn(async move {
                session.release().await;
            });
        }
    }
}

impl Worker {
    async fn run(mut self) {
        let _guard = StopGuard {
            lifecycle: self.lifecycle.clone(),
            session: self.engine.session_slot(),
            events: Arc::clone(&self.events),
        };

        info!("waiting for the ready signal");
        match self.wait_for_ready().await {
            ReadyWait::Ready => {
                if self.lifecycle.advance(LifecycleState::Monitoring).is_ok() {
                    self.events.emit(Event::StateChanged {
                        state: LifecycleState::Monitoring,
                    });
                    info!("monitoring started, checking for triggers");
                    self.poll().await;
                }
            }
            ReadyWait::TimedOut => warn!("no ready signal before the deadline"),
            ReadyWait::Cancelled => {}
        }

        self.finish().await;
    }

    async fn wait_for_ready(&mut self) -> ReadyWait {
        let timeout = self.options.ready_timeout;
        let deadline = async move {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return ReadyWait::Cancelled,
                _ = &mut deadline => return ReadyWait::TimedOut,
                request = self.control.recv() => match request {
                    Some(Control::Ready) => return ReadyWait::Ready,
                    Some(Control::Reconfigure(config)) => self.apply(config),
                    None => return ReadyWait::Cancelled,
                },
            }
        }
    }

    async fn poll(&mut self) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            while let Ok(request) = self.control.try_recv() {
                if let Control::Reconfigure(config) = request {
                    self.apply(config);
                }
            }

            let outcome = self.engine.tick().await;
            if let Ok(outcome) = &outcome {
                debug!(outcome = outcome.as_str(), "tick");
            }
            match outcome {
                Ok(TickOutcome::NoNewMessage) => {}
                Ok(TickOutcome::NewMessageIgnored) => {
                    self.events.emit(Event::MessageSeen {
                        text: self.engine.cursor().to_string(),
                    });
                }
                Ok(TickOutcome::TriggerFired) => {
                    let message = self.engine.cursor().to_string();
                    self.events.emit(Event::MessageSeen {
                        text: message.clone(),
                    });
                    self.events.emit(Event::TriggerFired {
                        message,
                        reply: self.engine.config().reply_text.clone(),
                    });
                }
                Ok(TickOutcome::SessionLost) => break,
                Err(EngineError::NotReady(reason)) => {
                    info!(reason, "session released, leaving poll loop");
                    break;
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.options.poll_interval) => {}
            }
        }
    }

    fn apply(&mut self, config: BotConfig) {
        info!(triggers = ?config.triggers, reply = %config.reply_text, "settings updated");
        self.engine.configure(config);
    }

    async fn finish(&mut self) {
        self.engine.release().await;
        if self.lifecycle.stop() {
            self.events.emit(Event::StateChanged {
                state: LifecycleState::Stopped,
            });
        }
        info!("monitoring stopped");
    }
}
