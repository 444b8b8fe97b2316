//! System metrics state with optional auto refresh.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::api::client::TaskBackend;
use crate::api::types::SystemMetrics;
use crate::error::ClientError;
use crate::helpers::{
    agent_usage_breakdown, agent_usage_percentages, daily_task_series, AgentUsageBreakdown,
    AgentUsagePercentages, DailyTaskSeries,
};

#[derive(Debug, Default)]
struct MetricsState {
    metrics: Option<SystemMetrics>,
    health_text: Option<String>,
    loading: bool,
    error: Option<String>,
}

struct MetricsInner {
    backend: Arc<dyn TaskBackend>,
    state: RwLock<MetricsState>,
    /// Token of the running refresh loop
    refresh: Mutex<Option<CancellationToken>>,
}

#[derive(Clone)]
pub struct MetricsStore {
    inner: Arc<MetricsInner>,
}

impl MetricsStore {
    pub fn new(backend: Arc<dyn TaskBackend>) -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                backend,
                state: RwLock::new(MetricsState::default()),
                refresh: Mutex::new(None),
            }),
        }
    }

    pub async fn metrics(&self) -> Option<SystemMetrics> {
        self.inner.state.read().await.metrics.clone()
    }

    /// Raw `/health` body from the last successful refresh.
    pub async fn health_text(&self) -> Option<String> {
        self.inner.state.read().await.health_text.clone()
    }

    pub async fn loading(&self) -> bool {
        self.inner.state.read().await.loading
    }

    pub async fn error(&self) -> Option<String> {
        self.inner.state.read().await.error.clone()
    }

    pub async fn usage_breakdown(&self) -> AgentUsageBreakdown {
        let state = self.inner.state.read().await;
        agent_usage_breakdown(state.metrics.as_ref().map(|m| &m.tasks_per_agent))
    }

    pub async fn usage_percentages(&self) -> AgentUsagePercentages {
        agent_usage_percentages(&self.usage_breakdown().await)
    }

    pub async fn daily_series(&self) -> DailyTaskSeries {
        let state = self.inner.state.read().await;
        state
            .metrics
            .as_ref()
            .map(|m| daily_task_series(&m.last_days))
            .unwrap_or_default()
    }

    /// Replace the metrics snapshot, then refresh the health text best-effort.
    pub async fn fetch_metrics(&self) -> Result<(), ClientError> {
        self.inner.fetch_metrics().await
    }

    pub fn auto_refresh(&self) -> bool {
        self.inner
            .refresh
            .lock()
            .expect("refresh lock poisoned")
            .is_some()
    }

    /// Refresh every `interval`, starting immediately. No-op if already running.
    pub fn start_auto_refresh(&self, interval: Duration) {
        let token = {
            let mut refresh = self.inner.refresh.lock().expect("refresh lock poisoned");
            if refresh.is_some() {
                return;
            }
            let token = CancellationToken::new();
            *refresh = Some(token.clone());
            token
        };

        info!(interval_ms = interval.as_millis() as u64, "Metrics auto refresh started");
        let store = Arc::downgrade(&self.inner);
        tokio::spawn(refresh_loop(store, token, interval));
    }

    pub fn stop_auto_refresh(&self) {
        if let Some(token) = self
            .inner
            .refresh
            .lock()
            .expect("refresh lock poisoned")
            .take()
        {
            token.cancel();
            info!("Metrics auto refresh stopped");
        }
    }
}

impl MetricsInner {
    async fn fetch_metrics(&self) -> Result<(), ClientError> {
        {
            let mut state = self.state.write().await;
            state.loading = true;
            state.error = None;
        }

        let result = self.backend.get_system_metrics().await;

        {
            let mut state = self.state.write().await;
            state.loading = false;
            match result {
                Ok(metrics) => {
                    debug!(date = %metrics.date, total_tasks = metrics.total_tasks, "Metrics loaded");
                    state.metrics = Some(metrics);
                }
                Err(err) => {
                    error!(code = err.code(), "Failed to load metrics: {}", err);
                    state.error = Some(err.to_string());
                    return Err(err);
                }
            }
        }

        match self.backend.get_health_raw().await {
            Ok(text) => self.state.write().await.health_text = Some(text),
            Err(err) => debug!(code = err.code(), "Health check unavailable: {}", err),
        }
        Ok(())
    }
}

async fn refresh_loop(store: Weak<MetricsInner>, token: CancellationToken, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = ticker.tick() => {}
        }
        let Some(store) = store.upgrade() else {
            return;
        };
        // Errors are recorded in state; the loop keeps going.
        let _ = store.fetch_metrics().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{
        DaySnapshot, ExecuteTaskRequest, ExecuteTaskResponse, ListTasksParams, TaskDetail,
        TaskListResponse,
    };
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeBackend {
        metrics_calls: AtomicUsize,
        fail_metrics: AtomicBool,
        fail_health: AtomicBool,
    }

    fn snapshot() -> SystemMetrics {
        SystemMetrics {
            date: "2024-03-01".to_string(),
            total_tasks: 10,
            tasks_per_agent: HashMap::from([
                ("ContentAgent".to_string(), 6.0),
                ("CodeAgent".to_string(), 4.0),
            ]),
            pending_tasks: 1,
            avg_latency_ms: 1200.0,
            p95_latency_ms: 3400.0,
            api_health: HashMap::new(),
            api_version: "v1".to_string(),
            last_days: vec![DaySnapshot {
                date: "2024-02-29".to_string(),
                total_tasks: 7,
            }],
        }
    }

    #[async_trait]
    impl TaskBackend for FakeBackend {
        async fn execute_task(
            &self,
            _request: &ExecuteTaskRequest,
        ) -> Result<ExecuteTaskResponse, ClientError> {
            Err(ClientError::Unknown("unused".to_string()))
        }

        async fn list_tasks(
            &self,
            _params: &ListTasksParams,
        ) -> Result<TaskListResponse, ClientError> {
            Err(ClientError::Unknown("unused".to_string()))
        }

        async fn get_task_detail(&self, _task_id: &str) -> Result<TaskDetail, ClientError> {
            Err(ClientError::Unknown("unused".to_string()))
        }

        async fn get_system_metrics(&self) -> Result<SystemMetrics, ClientError> {
            self.metrics_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_metrics.load(Ordering::SeqCst) {
                return Err(ClientError::Network(
                    crate::error::NETWORK_ERROR_MESSAGE.to_string(),
                ));
            }
            Ok(snapshot())
        }

        async fn get_health_raw(&self) -> Result<String, ClientError> {
            if self.fail_health.load(Ordering::SeqCst) {
                return Err(ClientError::Unknown("down".to_string()));
            }
            Ok("{\"status\":\"ok\"}".to_string())
        }
    }

    #[tokio::test]
    async fn fetch_replaces_snapshot_and_derives_views() {
        let backend = Arc::new(FakeBackend::default());
        let store = MetricsStore::new(backend.clone());

        store.fetch_metrics().await.expect("fetch metrics");

        assert_eq!(store.metrics().await.map(|m| m.total_tasks), Some(10));
        assert_eq!(store.health_text().await.as_deref(), Some("{\"status\":\"ok\"}"));
        assert_eq!(
            store.usage_percentages().await,
            AgentUsagePercentages {
                content_pct: 60,
                code_pct: 40,
                other_pct: 0,
            }
        );
        assert_eq!(store.daily_series().await.labels, vec!["Feb 29"]);
        assert!(!store.loading().await);
        assert_eq!(store.error().await, None);
    }

    #[tokio::test]
    async fn health_failure_is_ignored() {
        let backend = Arc::new(FakeBackend::default());
        backend.fail_health.store(true, Ordering::SeqCst);
        let store = MetricsStore::new(backend.clone());

        store.fetch_metrics().await.expect("fetch metrics");
        assert!(store.metrics().await.is_some());
        assert_eq!(store.health_text().await, None);
        assert_eq!(store.error().await, None);
    }

    #[tokio::test]
    async fn metrics_failure_sets_error_and_keeps_previous_snapshot() {
        let backend = Arc::new(FakeBackend::default());
        let store = MetricsStore::new(backend.clone());
        store.fetch_metrics().await.expect("first fetch");

        backend.fail_metrics.store(true, Ordering::SeqCst);
        let err = store.fetch_metrics().await.expect_err("network error");

        assert_eq!(err.code(), "NETWORK_ERROR");
        assert_eq!(
            store.error().await.as_deref(),
            Some(crate::error::NETWORK_ERROR_MESSAGE)
        );
        assert!(store.metrics().await.is_some());
        assert!(!store.loading().await);
    }

    #[tokio::test]
    async fn empty_store_derives_zeroes() {
        let store = MetricsStore::new(Arc::new(FakeBackend::default()));
        assert_eq!(store.usage_breakdown().await, AgentUsageBreakdown::default());
        assert_eq!(store.daily_series().await, DailyTaskSeries::default());
    }

    #[tokio::test(start_paused = true)]
    async fn auto_refresh_ticks_until_stopped() {
        let backend = Arc::new(FakeBackend::default());
        let store = MetricsStore::new(backend.clone());
        let interval = Duration::from_secs(30);

        store.start_auto_refresh(interval);
        store.start_auto_refresh(interval);
        assert!(store.auto_refresh());
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(backend.metrics_calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(interval).await;
        assert_eq!(backend.metrics_calls.load(Ordering::SeqCst), 2);

        store.stop_auto_refresh();
        store.stop_auto_refresh();
        assert!(!store.auto_refresh());
        tokio::time::sleep(interval * 3).await;
        assert_eq!(backend.metrics_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_refresh_survives_errors() {
        let backend = Arc::new(FakeBackend::default());
        backend.fail_metrics.store(true, Ordering::SeqCst);
        let store = MetricsStore::new(backend.clone());
        let interval = Duration::from_secs(5);

        store.start_auto_refresh(interval);
        tokio::time::sleep(interval * 2 + Duration::from_millis(1)).await;
        assert_eq!(backend.metrics_calls.load(Ordering::SeqCst), 3);
        assert!(store.error().await.is_some());
        store.stop_auto_refresh();
    }
}
