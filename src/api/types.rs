//! API request and response types.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Task status enumeration.
///
/// Statuses only move forward for a given task: `queued` → `processing` →
/// `completed` | `failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task accepted, waiting for a worker
    Queued,
    /// Task is being routed or executed
    Processing,
    /// Task completed successfully
    Completed,
    /// Task failed with an error
    Failed,
}

impl TaskStatus {
    /// Whether live tracking should end at this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Position in the forward lifecycle. Both terminal statuses share a rank.
    pub fn rank(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Processing => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown task status: {}", other)),
        }
    }
}

/// Agent classification chosen by the router.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Content,
    Code,
}

impl AgentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Code => "code",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "content" => Ok(Self::Content),
            "code" => Ok(Self::Code),
            other => Err(format!("unknown agent type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub source: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Output produced by the executor agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskResult {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub raw_output: Option<String>,
    #[serde(default)]
    pub code_language: Option<String>,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

/// Error information attached to failed tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskErrorInfo {
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub stack: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt: u64,
    #[serde(default)]
    pub completion: u64,
    #[serde(default)]
    pub total: u64,
}

/// Role an agent played within a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AgentRole {
    Router,
    Executor,
    Other(String),
}

impl From<String> for AgentRole {
    fn from(value: String) -> Self {
        match value.as_str() {
            "router" => Self::Router,
            "executor" => Self::Executor,
            _ => Self::Other(value),
        }
    }
}

impl From<AgentRole> for String {
    fn from(value: AgentRole) -> Self {
        match value {
            AgentRole::Router => "router".to_string(),
            AgentRole::Executor => "executor".to_string(),
            AgentRole::Other(other) => other,
        }
    }
}

/// A single agent invocation recorded for a task.
///
/// Runs still in progress have no `finished_at` or `duration_ms`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentRun {
    pub run_id: String,
    pub task_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    pub agent_name: String,
    pub agent_role: AgentRole,
    #[serde(default, deserialize_with = "null_as_default")]
    pub input: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub output: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub model: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tools_used: Vec<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub token_usage: TokenUsage,
}

/// Treat an explicit `null` like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Full task snapshot as returned by `GET /v1/tasks/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskDetail {
    pub task_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub input_text: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub selected_agent: Option<String>,
    #[serde(default)]
    pub agent_type: Option<AgentType>,
    #[serde(default)]
    pub peer_routing_reason: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub queued_at: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub result: Option<TaskResult>,
    #[serde(default)]
    pub error: Option<TaskErrorInfo>,
    #[serde(default)]
    pub agent_runs: Vec<AgentRun>,
    #[serde(default)]
    pub api_version: String,
}

/// Reduced projection used by history listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskSummary {
    pub task_id: String,
    #[serde(default)]
    pub agent_type: Option<AgentType>,
    #[serde(default)]
    pub selected_agent: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Request body for `POST /v1/agent/execute`.
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteTaskRequest {
    pub task: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecuteTaskResponse {
    pub task_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub queued_at: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub api_version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationMeta {
    pub page: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

/// Paginated envelope returned by `GET /v1/tasks`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskListResponse {
    #[serde(default)]
    pub items: Vec<TaskSummary>,
    pub meta: PaginationMeta,
}

/// Query parameters for `GET /v1/tasks`.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ListTasksParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<AgentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

/// One day of the metrics history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaySnapshot {
    pub date: String,
    pub total_tasks: u64,
}

/// System metrics snapshot from `GET /v1/system/metrics`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemMetrics {
    /// Day the snapshot covers (`YYYY-MM-DD`)
    pub date: String,
    pub total_tasks: u64,
    /// Raw per-agent counts, keyed by agent name
    #[serde(default)]
    pub tasks_per_agent: HashMap<String, f64>,
    #[serde(default)]
    pub pending_tasks: u64,
    #[serde(default)]
    pub avg_latency_ms: f64,
    #[serde(default)]
    pub p95_latency_ms: f64,
    /// Health by dependency name
    #[serde(default)]
    pub api_health: HashMap<String, String>,
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub last_days: Vec<DaySnapshot>,
}

/// Status signal delivered over the push channel.
///
/// Signals are never merged into state; they only trigger a re-fetch of the
/// task they reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskStatusEvent {
    pub event: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// A synthetic log line derived from a task snapshot.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TaskLogEntry {
    /// Timestamp (ISO 8601)
    pub timestamp: String,
    pub message: String,
}
