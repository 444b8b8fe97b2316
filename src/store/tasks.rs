//! Task orchestration state.
//!
//! Owns the current task snapshot, the history page and its filters, and the
//! single live-update controller tracking the current task. Snapshots are
//! always replaced wholesale; status signals only trigger re-fetches.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::api::client::{events_url, TaskBackend};
use crate::api::types::{
    AgentType, ExecuteTaskRequest, ListTasksParams, PaginationMeta, TaskDetail, TaskLogEntry,
    TaskStatus, TaskStatusEvent, TaskSummary,
};
use crate::config::Config;
use crate::error::ClientError;
use crate::helpers::build_task_logs;
use crate::live::{
    LiveMode, LiveUpdateController, LiveUpdateHandler, LiveUpdateOptions, PushTransport,
    TrackingMode,
};

pub const EMPTY_TASK_MESSAGE: &str = "Task cannot be empty.";

/// Tracking settings shared by every session a store starts.
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    /// A static API key is configured, so the event stream cannot be used.
    pub has_api_key: bool,
    pub poll_interval: Duration,
    pub api_base_url: String,
}

impl TrackingConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            has_api_key: config.has_api_key(),
            poll_interval: config.poll_interval,
            api_base_url: config.api_base_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilters {
    pub status: Option<TaskStatus>,
    pub agent_type: Option<AgentType>,
    /// Applied client-side to the loaded page.
    pub search: String,
}

/// A re-fetched snapshot reported an earlier status than the previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRegression {
    pub task_id: String,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

#[derive(Debug)]
struct TaskState {
    current_task_id: Option<String>,
    current_task: Option<TaskDetail>,
    history: Vec<TaskSummary>,
    pagination: Option<PaginationMeta>,
    loading: bool,
    polling: bool,
    error: Option<String>,
    filters: TaskFilters,
    history_page: u32,
    history_page_size: u32,
    status_anomaly: Option<StatusRegression>,
}

struct Tracking {
    controller: LiveUpdateController,
    generation: u64,
}

struct StoreInner {
    backend: Arc<dyn TaskBackend>,
    transport: Option<Arc<dyn PushTransport>>,
    config: TrackingConfig,
    state: RwLock<TaskState>,
    tracking: Mutex<Option<Tracking>>,
    /// Generation of the running tracking session; 0 when none.
    active_generation: AtomicU64,
    next_generation: AtomicU64,
}

/// Cheaply clonable handle to the task state.
#[derive(Clone)]
pub struct TaskStore {
    inner: Arc<StoreInner>,
}

impl TaskStore {
    /// `transport` is `None` when no push transport is available.
    pub fn new(
        backend: Arc<dyn TaskBackend>,
        transport: Option<Arc<dyn PushTransport>>,
        config: TrackingConfig,
        history_page_size: u32,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                backend,
                transport,
                config,
                state: RwLock::new(TaskState {
                    current_task_id: None,
                    current_task: None,
                    history: Vec::new(),
                    pagination: None,
                    loading: false,
                    polling: false,
                    error: None,
                    filters: TaskFilters::default(),
                    history_page: 1,
                    history_page_size: history_page_size.max(1),
                    status_anomaly: None,
                }),
                tracking: Mutex::new(None),
                active_generation: AtomicU64::new(0),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    // ── Getters ───────────────────────────────────────────────────────

    pub async fn current_task_id(&self) -> Option<String> {
        self.inner.state.read().await.current_task_id.clone()
    }

    pub async fn current_task(&self) -> Option<TaskDetail> {
        self.inner.state.read().await.current_task.clone()
    }

    /// Log timeline derived from the current snapshot.
    pub async fn current_task_logs(&self) -> Vec<TaskLogEntry> {
        build_task_logs(self.inner.state.read().await.current_task.as_ref())
    }

    /// Loaded history page with the search filter applied.
    pub async fn history(&self) -> Vec<TaskSummary> {
        let state = self.inner.state.read().await;
        filter_history(&state.history, &state.filters.search)
    }

    pub async fn raw_history(&self) -> Vec<TaskSummary> {
        self.inner.state.read().await.history.clone()
    }

    pub async fn pagination_meta(&self) -> Option<PaginationMeta> {
        self.inner.state.read().await.pagination.clone()
    }

    pub async fn loading(&self) -> bool {
        self.inner.state.read().await.loading
    }

    /// True while the tracking session is polling.
    pub async fn polling(&self) -> bool {
        self.inner.state.read().await.polling
    }

    pub async fn error(&self) -> Option<String> {
        self.inner.state.read().await.error.clone()
    }

    pub async fn filters(&self) -> TaskFilters {
        self.inner.state.read().await.filters.clone()
    }

    pub async fn history_page(&self) -> u32 {
        self.inner.state.read().await.history_page
    }

    pub async fn history_page_size(&self) -> u32 {
        self.inner.state.read().await.history_page_size
    }

    pub async fn status_anomaly(&self) -> Option<StatusRegression> {
        self.inner.state.read().await.status_anomaly.clone()
    }

    /// Mode of the tracking session, `Idle` when nothing is tracked.
    pub fn tracking_mode(&self) -> LiveMode {
        self.inner
            .tracking
            .lock()
            .expect("tracking lock poisoned")
            .as_ref()
            .map(|t| t.controller.mode())
            .unwrap_or_default()
    }

    /// Resolves once the current tracking session (if any) has stopped.
    pub async fn wait_for_tracking_end(&self) {
        let receiver = self
            .inner
            .tracking
            .lock()
            .expect("tracking lock poisoned")
            .as_ref()
            .map(|t| t.controller.subscribe());
        if let Some(mut receiver) = receiver {
            // An error means the controller was dropped, which also ends tracking.
            let _ = receiver.wait_for(|mode| !mode.is_active()).await;
        }
    }

    // ── Actions ───────────────────────────────────────────────────────

    /// Submit a task, load its detail and start tracking it.
    ///
    /// Returns the new task id.
    pub async fn execute_task(
        &self,
        text: &str,
        session_id: Option<&str>,
    ) -> Result<String, ClientError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            let err = ClientError::Validation(EMPTY_TASK_MESSAGE.to_string());
            self.inner.state.write().await.error = Some(err.to_string());
            return Err(err);
        }

        // Stop the previous task's session even if loading the new one fails.
        self.stop_task_tracking().await;

        {
            let mut state = self.inner.state.write().await;
            state.loading = true;
            state.error = None;
        }

        let result = self.submit(trimmed, session_id).await;

        let mut state = self.inner.state.write().await;
        state.loading = false;
        if let Err(err) = &result {
            error!(code = err.code(), "Failed to execute task: {}", err);
            state.error = Some(err.to_string());
        }
        result
    }

    async fn submit(&self, task: &str, session_id: Option<&str>) -> Result<String, ClientError> {
        let request = ExecuteTaskRequest {
            task: task.to_string(),
            session_id: session_id.map(str::to_string),
        };
        let response = self.inner.backend.execute_task(&request).await?;
        info!(task_id = %response.task_id, status = %response.status, "Task submitted");

        self.inner.state.write().await.current_task_id = Some(response.task_id.clone());
        self.fetch_task_detail(&response.task_id).await?;
        self.start_task_tracking(&response.task_id).await;
        Ok(response.task_id)
    }

    /// Replace the current snapshot with a fresh copy of `task_id`.
    pub async fn fetch_task_detail(&self, task_id: &str) -> Result<(), ClientError> {
        match self.inner.backend.get_task_detail(task_id).await {
            Ok(detail) => {
                let mut state = self.inner.state.write().await;
                apply_detail(&mut state, detail);
                Ok(())
            }
            Err(err) => {
                self.inner.state.write().await.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Track `task_id`, stopping any previous session first.
    pub async fn start_task_tracking(&self, task_id: &str) {
        self.stop_task_tracking().await;

        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst);
        self.inner
            .active_generation
            .store(generation, Ordering::SeqCst);

        let handler = Arc::new(TrackingHandler {
            store: Arc::downgrade(&self.inner),
            task_id: task_id.to_string(),
            generation,
        });
        let options = LiveUpdateOptions {
            task_id: task_id.to_string(),
            has_api_key: self.inner.config.has_api_key,
            interval: self.inner.config.poll_interval,
            events_url: events_url(&self.inner.config.api_base_url, task_id),
        };
        let controller =
            LiveUpdateController::new(options, self.inner.transport.clone(), handler);

        *self.inner.tracking.lock().expect("tracking lock poisoned") = Some(Tracking {
            controller: controller.clone(),
            generation,
        });
        controller.start();
        debug!(task_id, generation, mode = ?controller.mode(), "Task tracking started");
    }

    /// Stop live tracking. Always safe to call.
    pub async fn stop_task_tracking(&self) {
        StoreInner::stop_tracking(&self.inner, None).await;
    }

    /// Load the history page for the current filters and page.
    pub async fn load_history(&self) -> Result<(), ClientError> {
        let params = {
            let mut state = self.inner.state.write().await;
            state.loading = true;
            state.error = None;
            ListTasksParams {
                status: state.filters.status,
                agent_type: state.filters.agent_type,
                page: Some(state.history_page),
                page_size: Some(state.history_page_size),
            }
        };

        let result = self.inner.backend.list_tasks(&params).await;

        let mut state = self.inner.state.write().await;
        state.loading = false;
        match result {
            Ok(response) => {
                debug!(
                    items = response.items.len(),
                    total_items = response.meta.total_items,
                    page = response.meta.page,
                    "History loaded"
                );
                state.history = response.items;
                state.pagination = Some(response.meta);
                Ok(())
            }
            Err(err) => {
                error!(
                    code = err.code(),
                    filters = ?state.filters,
                    page = state.history_page,
                    page_size = state.history_page_size,
                    "Failed to load task history: {}",
                    err
                );
                state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub async fn set_status_filter(&self, status: Option<TaskStatus>) {
        self.inner.state.write().await.filters.status = status;
    }

    pub async fn set_agent_type_filter(&self, agent_type: Option<AgentType>) {
        self.inner.state.write().await.filters.agent_type = agent_type;
    }

    pub async fn set_search_filter(&self, search: &str) {
        self.inner.state.write().await.filters.search = search.to_string();
    }

    /// Pages start at 1; lower values are ignored.
    pub async fn set_history_page(&self, page: u32) {
        if page < 1 {
            return;
        }
        self.inner.state.write().await.history_page = page;
    }

    pub async fn set_history_page_size(&self, page_size: u32) {
        if page_size == 0 {
            return;
        }
        self.inner.state.write().await.history_page_size = page_size;
    }

    /// Advance the page if the last loaded page reported a next one.
    /// Callers still need to `load_history()`.
    pub async fn next_page(&self) -> bool {
        let mut state = self.inner.state.write().await;
        if state.pagination.as_ref().is_some_and(|m| m.has_next) {
            state.history_page += 1;
            true
        } else {
            false
        }
    }

    pub async fn previous_page(&self) -> bool {
        let mut state = self.inner.state.write().await;
        let has_previous = state.pagination.as_ref().is_some_and(|m| m.has_previous);
        if has_previous && state.history_page > 1 {
            state.history_page -= 1;
            true
        } else {
            false
        }
    }
}

impl StoreInner {
    fn is_active_generation(&self, generation: u64) -> bool {
        self.active_generation.load(Ordering::SeqCst) == generation
    }

    /// Stop the running session. With `only_generation`, a newer session is
    /// left alone.
    async fn stop_tracking(this: &Arc<Self>, only_generation: Option<u64>) {
        let stopped = {
            let mut tracking = this.tracking.lock().expect("tracking lock poisoned");
            let matches = match (tracking.as_ref(), only_generation) {
                (Some(t), Some(generation)) => t.generation == generation,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if matches {
                tracking.take()
            } else {
                None
            }
        };

        if only_generation.is_some() && stopped.is_none() {
            return;
        }

        if let Some(tracking) = &stopped {
            this.active_generation.store(0, Ordering::SeqCst);
            tracking.controller.stop();
            debug!(
                task_id = tracking.controller.task_id(),
                generation = tracking.generation,
                "Task tracking stopped"
            );
        }
        this.state.write().await.polling = false;
    }

    /// Re-fetch for a tracking session, discarding the result if the session
    /// ended while the request was in flight or the task is no longer current.
    /// Returns the applied status.
    async fn refresh_tracked(&self, task_id: &str, generation: u64) -> Option<TaskStatus> {
        let result = self.backend.get_task_detail(task_id).await;

        let mut state = self.state.write().await;
        if !self.is_active_generation(generation) {
            debug!(task_id, generation, "Discarding stale task detail response");
            return None;
        }
        if let Some(current) = state.current_task_id.as_deref() {
            if current != task_id {
                debug!(task_id, current, "Discarding detail for a task that is no longer current");
                return None;
            }
        }
        match result {
            Ok(detail) => {
                let status = detail.status;
                apply_detail(&mut state, detail);
                Some(status)
            }
            Err(err) => {
                warn!(task_id, code = err.code(), "Failed to refresh tracked task: {}", err);
                state.error = Some(err.to_string());
                None
            }
        }
    }
}

/// Replace the snapshot, recording any backwards status move.
fn apply_detail(state: &mut TaskState, detail: TaskDetail) {
    if let Some(previous) = &state.current_task {
        if previous.task_id == detail.task_id && detail.status.rank() < previous.status.rank() {
            warn!(
                task_id = %detail.task_id,
                from = %previous.status,
                to = %detail.status,
                "Task status moved backwards"
            );
            state.status_anomaly = Some(StatusRegression {
                task_id: detail.task_id.clone(),
                from: previous.status,
                to: detail.status,
            });
        }
    }
    state.current_task = Some(detail);
}

fn filter_history(history: &[TaskSummary], search: &str) -> Vec<TaskSummary> {
    let needle = search.trim().to_lowercase();
    if needle.is_empty() {
        return history.to_vec();
    }
    history
        .iter()
        .filter(|task| {
            let source = task
                .summary
                .as_deref()
                .filter(|s| !s.is_empty())
                .unwrap_or(&task.task_id);
            source.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

/// Bridges controller callbacks back into the store for one session.
struct TrackingHandler {
    store: Weak<StoreInner>,
    task_id: String,
    generation: u64,
}

#[async_trait]
impl LiveUpdateHandler for TrackingHandler {
    async fn on_signal(&self, signal: TaskStatusEvent) {
        let Some(store) = self.store.upgrade() else {
            return;
        };
        if !store.is_active_generation(self.generation) {
            return;
        }

        let needs_refresh = {
            let state = store.state.read().await;
            match &state.current_task {
                Some(task) => task.task_id != self.task_id || task.status != signal.status,
                None => true,
            }
        };
        if needs_refresh {
            store.refresh_tracked(&self.task_id, self.generation).await;
        }

        if signal.status.is_terminal() {
            info!(task_id = %self.task_id, status = %signal.status, "Task reached terminal status");
            StoreInner::stop_tracking(&store, Some(self.generation)).await;
        }
    }

    async fn on_tick(&self) {
        let Some(store) = self.store.upgrade() else {
            return;
        };
        if !store.is_active_generation(self.generation) {
            return;
        }

        let status = store.refresh_tracked(&self.task_id, self.generation).await;
        if status.is_some_and(TaskStatus::is_terminal) {
            info!(task_id = %self.task_id, "Task reached terminal status");
            StoreInner::stop_tracking(&store, Some(self.generation)).await;
        }
    }

    async fn on_mode_change(&self, mode: TrackingMode) {
        let Some(store) = self.store.upgrade() else {
            return;
        };
        let mut state = store.state.write().await;
        if store.is_active_generation(self.generation) {
            state.polling = mode == TrackingMode::Pull;
            debug!(task_id = %self.task_id, mode = %mode, "Tracking mode changed");
        }
    }
}
