//! HTTP client for the orchestration backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, error};
use uuid::Uuid;

use super::types::{
    ExecuteTaskRequest, ExecuteTaskResponse, ListTasksParams, SystemMetrics, TaskDetail,
    TaskListResponse,
};
use crate::config::Config;
use crate::error::ClientError;

pub const API_KEY_HEADER: &str = "X-API-Key";
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Operations the dashboard consumes from the backend.
#[async_trait]
pub trait TaskBackend: Send + Sync {
    /// `POST /v1/agent/execute`
    async fn execute_task(
        &self,
        request: &ExecuteTaskRequest,
    ) -> Result<ExecuteTaskResponse, ClientError>;

    /// `GET /v1/tasks`
    async fn list_tasks(&self, params: &ListTasksParams) -> Result<TaskListResponse, ClientError>;

    /// `GET /v1/tasks/{id}`
    async fn get_task_detail(&self, task_id: &str) -> Result<TaskDetail, ClientError>;

    /// `GET /v1/system/metrics`
    async fn get_system_metrics(&self) -> Result<SystemMetrics, ClientError>;

    /// `GET /health`, returned as opaque text.
    async fn get_health_raw(&self) -> Result<String, ClientError>;
}

/// `reqwest`-backed implementation of [`TaskBackend`].
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpBackend {
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        Self::with_timeout(&config.api_base_url, config.api_key.clone(), config.http_timeout)
    }

    pub fn with_timeout(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Unknown(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request_id = Uuid::new_v4().to_string();
        debug!(method = %method, path, request_id = %request_id, "Sending request");

        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header(CONTENT_TYPE, "application/json")
            .header(REQUEST_ID_HEADER, request_id);
        if let Some(key) = &self.api_key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        builder
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ClientError> {
        let response = builder.send().await.map_err(|e| {
            let err = ClientError::from_transport(e);
            error!(code = err.code(), "Request failed: {}", err);
            err
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = ClientError::from_response(status.as_u16(), &body);
        error!(
            code = err.code(),
            status = status.as_u16(),
            details = ?err.details(),
            "Request failed: {}",
            err
        );
        Err(err)
    }

    async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let response = self.send(builder).await?;
        let bytes = response.bytes().await.map_err(ClientError::from_transport)?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Parse(e.to_string()))
    }
}

/// Path of a single task, with the id percent-encoded.
pub fn task_path(task_id: &str) -> String {
    format!("/v1/tasks/{}", urlencoding::encode(task_id))
}

/// Absolute URL of the push channel for a task.
pub fn events_url(base_url: &str, task_id: &str) -> String {
    format!("{}{}/events", base_url.trim_end_matches('/'), task_path(task_id))
}

#[async_trait]
impl TaskBackend for HttpBackend {
    async fn execute_task(
        &self,
        request: &ExecuteTaskRequest,
    ) -> Result<ExecuteTaskResponse, ClientError> {
        self.json(self.request(Method::POST, "/v1/agent/execute").json(request))
            .await
    }

    async fn list_tasks(&self, params: &ListTasksParams) -> Result<TaskListResponse, ClientError> {
        self.json(self.request(Method::GET, "/v1/tasks").query(params))
            .await
    }

    async fn get_task_detail(&self, task_id: &str) -> Result<TaskDetail, ClientError> {
        self.json(self.request(Method::GET, &task_path(task_id)))
            .await
    }

    async fn get_system_metrics(&self) -> Result<SystemMetrics, ClientError> {
        self.json(self.request(Method::GET, "/v1/system/metrics"))
            .await
    }

    async fn get_health_raw(&self) -> Result<String, ClientError> {
        let response = self.send(self.request(Method::GET, "/health")).await?;
        response.text().await.map_err(ClientError::from_transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_ids_are_percent_encoded() {
        assert_eq!(task_path("a/b c"), "/v1/tasks/a%2Fb%20c");
    }

    #[test]
    fn events_url_joins_base_without_double_slash() {
        assert_eq!(
            events_url("http://localhost:8000/", "T1"),
            "http://localhost:8000/v1/tasks/T1/events"
        );
    }

    #[test]
    fn backend_strips_trailing_slash() {
        let backend = HttpBackend::with_timeout(
            "http://localhost:8000/",
            None,
            Duration::from_secs(1),
        )
        .expect("build backend");
        assert_eq!(backend.base_url(), "http://localhost:8000");
    }
}
