//! Dual-mode live-update controller.
//!
//! `start()` opens the task's event stream when the session is eligible and a
//! push transport is available, otherwise it polls. A push channel error
//! switches to polling and ticks immediately. The controller never inspects
//! signal payloads to decide when to stop; handlers call [`stop`] themselves.
//!
//! Signals are handled one at a time: each `on_signal` call is awaited before
//! the next message is read from the channel. Polling ticks never overlap.
//!
//! [`stop`]: LiveUpdateController::stop

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::transport::{PushMessage, PushTransport};
use super::{transition, LiveEvent, LiveMode, TrackingMode};
use crate::api::types::TaskStatusEvent;

/// Callbacks invoked by a running controller.
#[async_trait]
pub trait LiveUpdateHandler: Send + Sync {
    /// A status signal for the tracked task arrived on the push channel.
    async fn on_signal(&self, signal: TaskStatusEvent);

    /// A polling tick is due.
    async fn on_tick(&self);

    /// Fired once each time the controller enters push or pull mode.
    async fn on_mode_change(&self, _mode: TrackingMode) {}
}

#[derive(Debug, Clone)]
pub struct LiveUpdateOptions {
    pub task_id: String,
    /// A static API key is configured; the push transport cannot carry it.
    pub has_api_key: bool,
    pub interval: Duration,
    /// Push channel URL for the task
    pub events_url: String,
}

/// Cheaply clonable handle to one tracking session.
#[derive(Clone)]
pub struct LiveUpdateController {
    inner: Arc<Inner>,
}

struct Inner {
    options: LiveUpdateOptions,
    transport: Option<Arc<dyn PushTransport>>,
    handler: Arc<dyn LiveUpdateHandler>,
    mode: watch::Sender<LiveMode>,
    /// Token of the running session; `None` while idle.
    session: Mutex<Option<CancellationToken>>,
}

enum PushOutcome {
    Stopped,
    Failed,
}

impl LiveUpdateController {
    /// `transport` is `None` when no push transport exists in this runtime.
    pub fn new(
        options: LiveUpdateOptions,
        transport: Option<Arc<dyn PushTransport>>,
        handler: Arc<dyn LiveUpdateHandler>,
    ) -> Self {
        let (mode, _) = watch::channel(LiveMode::Idle);
        Self {
            inner: Arc::new(Inner {
                options,
                transport,
                handler,
                mode,
                session: Mutex::new(None),
            }),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.inner.options.task_id
    }

    pub fn mode(&self) -> LiveMode {
        *self.inner.mode.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.mode().is_active()
    }

    /// Observe mode changes.
    pub fn subscribe(&self) -> watch::Receiver<LiveMode> {
        self.inner.mode.subscribe()
    }

    /// Start tracking. No-op if already active. Must be called within a
    /// tokio runtime.
    pub fn start(&self) {
        let push_available =
            self.inner.transport.is_some() && !self.inner.options.has_api_key;

        let (token, mode) = {
            let mut session = self
                .inner
                .session
                .lock()
                .expect("live controller session lock poisoned");
            if session.is_some() {
                return;
            }
            let token = CancellationToken::new();
            *session = Some(token.clone());
            let mode = transition(
                *self.inner.mode.borrow(),
                LiveEvent::Start { push_available },
            );
            self.inner.mode.send_replace(mode);
            (token, mode)
        };

        debug!(
            task_id = %self.inner.options.task_id,
            has_api_key = self.inner.options.has_api_key,
            mode = ?mode,
            "Starting live tracking"
        );

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run(token, mode).await });
    }

    /// Stop tracking. Idempotent and safe to call from inside handler
    /// callbacks. Work already in flight is not interrupted, but nothing new
    /// is scheduled.
    pub fn stop(&self) {
        let mut session = self
            .inner
            .session
            .lock()
            .expect("live controller session lock poisoned");
        if let Some(token) = session.take() {
            debug!(task_id = %self.inner.options.task_id, "Stopping live tracking");
            token.cancel();
        }
        let mode = transition(*self.inner.mode.borrow(), LiveEvent::Stop);
        self.inner.mode.send_replace(mode);
    }
}

impl Inner {
    async fn run(self: Arc<Self>, token: CancellationToken, mode: LiveMode) {
        if mode == LiveMode::Pushing {
            if token.is_cancelled() {
                return;
            }
            self.handler.on_mode_change(TrackingMode::Push).await;
            match self.push(&token).await {
                PushOutcome::Stopped => return,
                PushOutcome::Failed => {
                    if !self.apply(LiveEvent::ChannelError, &token) {
                        return;
                    }
                    warn!(
                        task_id = %self.options.task_id,
                        interval_ms = self.options.interval.as_millis() as u64,
                        "Event stream unavailable, falling back to polling"
                    );
                }
            }
        }

        if token.is_cancelled() {
            return;
        }
        self.handler.on_mode_change(TrackingMode::Pull).await;
        self.pull(&token).await;
    }

    /// Apply a transition for the session owning `token`. Returns false if
    /// that session has been stopped.
    fn apply(&self, event: LiveEvent, token: &CancellationToken) -> bool {
        let _session = self
            .session
            .lock()
            .expect("live controller session lock poisoned");
        if token.is_cancelled() {
            return false;
        }
        let mode = transition(*self.mode.borrow(), event);
        self.mode.send_replace(mode);
        true
    }

    async fn push(&self, token: &CancellationToken) -> PushOutcome {
        let Some(transport) = &self.transport else {
            return PushOutcome::Failed;
        };

        let opened = tokio::select! {
            _ = token.cancelled() => return PushOutcome::Stopped,
            opened = transport.open(&self.options.events_url) => opened,
        };
        let mut channel = match opened {
            Ok(channel) => channel,
            Err(err) => {
                warn!(task_id = %self.options.task_id, "Failed to open event stream: {}", err);
                return PushOutcome::Failed;
            }
        };

        loop {
            let next = tokio::select! {
                _ = token.cancelled() => return PushOutcome::Stopped,
                next = channel.next() => next,
            };

            match next {
                Some(Ok(PushMessage::Open)) => {
                    debug!(
                        task_id = %self.options.task_id,
                        url = %self.options.events_url,
                        "Event stream opened"
                    );
                }
                Some(Ok(PushMessage::Message(data))) => {
                    let Some(signal) = self.decode_signal(&data) else {
                        continue;
                    };
                    self.handler.on_signal(signal).await;
                    if token.is_cancelled() {
                        return PushOutcome::Stopped;
                    }
                }
                Some(Err(err)) => {
                    warn!(task_id = %self.options.task_id, "Event stream error: {}", err);
                    return PushOutcome::Failed;
                }
                None => {
                    warn!(task_id = %self.options.task_id, "Event stream closed by server");
                    return PushOutcome::Failed;
                }
            }
        }
    }

    /// Parse a raw payload, dropping malformed messages and signals for
    /// other tasks.
    fn decode_signal(&self, data: &str) -> Option<TaskStatusEvent> {
        let signal: TaskStatusEvent = match serde_json::from_str(data) {
            Ok(signal) => signal,
            Err(err) => {
                warn!(
                    task_id = %self.options.task_id,
                    raw = %data,
                    "Discarding malformed status event: {}",
                    err
                );
                return None;
            }
        };

        if let Some(event_task_id) = signal.task_id.as_deref() {
            if event_task_id != self.options.task_id {
                warn!(
                    expected_task_id = %self.options.task_id,
                    event_task_id = %event_task_id,
                    "Ignoring status event for a different task"
                );
                return None;
            }
        }

        debug!(task_id = %self.options.task_id, status = %signal.status, "Status event received");
        Some(signal)
    }

    async fn pull(&self, token: &CancellationToken) {
        loop {
            if token.is_cancelled() {
                return;
            }
            self.handler.on_tick().await;
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(self.options.interval) => {}
            }
        }
    }
}
