//! Task display helpers: timestamps, durations and the derived log timeline.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

use crate::api::types::{AgentRole, AgentRun, TaskDetail, TaskLogEntry, TaskStatus};

pub const QUEUED_MESSAGE: &str = "Task received and queued";
pub const PROCESSING_MESSAGE: &str = "Processing started";
pub const COMPLETED_MESSAGE: &str = "Task completed successfully";
pub const FAILED_FALLBACK_MESSAGE: &str = "Task failed. Please check details for more information.";

/// Parse an ISO-8601 timestamp. Values without an offset are read as UTC.
pub fn parse_timestamp(iso: &str) -> Option<DateTime<Utc>> {
    let iso = iso.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(iso) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(iso, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// `YYYY-MM-DD h:MM AM` in local time.
pub fn format_date_time(iso: Option<&str>) -> String {
    format_date_time_in(iso, &Local)
}

/// `YYYY-MM-DD h:MM AM` in `tz`. Missing input renders as `-`, unparsable
/// input is returned unchanged.
pub fn format_date_time_in<Tz>(iso: Option<&str>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let Some(iso) = iso.filter(|s| !s.is_empty()) else {
        return "-".to_string();
    };
    match parse_timestamp(iso) {
        Some(ts) => ts.with_timezone(tz).format("%Y-%m-%d %-I:%M %p").to_string(),
        None => iso.to_string(),
    }
}

/// `HH:MM:SS` in local time.
pub fn format_time(iso: Option<&str>) -> String {
    format_time_in(iso, &Local)
}

pub fn format_time_in<Tz>(iso: Option<&str>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    iso.and_then(parse_timestamp)
        .map(|ts| ts.with_timezone(tz).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

/// Elapsed time between two timestamps as `Ns` or `Mm Ss`.
pub fn format_duration(start: Option<&str>, end: Option<&str>) -> String {
    let (Some(start), Some(end)) = (start.and_then(parse_timestamp), end.and_then(parse_timestamp))
    else {
        return "-".to_string();
    };
    if end <= start {
        return "-".to_string();
    }
    let millis = (end - start).num_milliseconds();
    let seconds = (millis as f64 / 1000.0).round() as i64;
    if seconds < 60 {
        format!("{}s", seconds)
    } else {
        format!("{}m {}s", seconds / 60, seconds % 60)
    }
}

fn find_run<'a>(runs: &'a [AgentRun], role: &AgentRole) -> Option<&'a AgentRun> {
    runs.iter().find(|run| &run.agent_role == role)
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

/// First non-empty timestamp, or `""` when none is known.
fn first_present<'a>(candidates: &[&'a Option<String>]) -> &'a str {
    candidates
        .iter()
        .copied()
        .find_map(|value| value.as_deref().and_then(non_empty))
        .unwrap_or("")
}

/// Rebuild the synthetic log timeline for a task snapshot, sorted by
/// timestamp string.
pub fn build_task_logs(task: Option<&TaskDetail>) -> Vec<TaskLogEntry> {
    let Some(task) = task else {
        return Vec::new();
    };
    let mut entries = Vec::new();

    if let Some(queued_at) = task.queued_at.as_deref().and_then(non_empty) {
        entries.push(TaskLogEntry {
            timestamp: queued_at.to_string(),
            message: QUEUED_MESSAGE.to_string(),
        });
    }

    let router = find_run(&task.agent_runs, &AgentRole::Router);
    if let (Some(router), Some(agent)) = (router, task.selected_agent.as_deref()) {
        let timestamp = first_present(&[&router.finished_at, &router.started_at]);
        entries.push(TaskLogEntry {
            timestamp: timestamp.to_string(),
            message: format!("Routed to {}", agent),
        });
    }

    if let Some(executor) = find_run(&task.agent_runs, &AgentRole::Executor) {
        entries.push(TaskLogEntry {
            timestamp: first_present(&[&executor.started_at, &task.started_at]).to_string(),
            message: PROCESSING_MESSAGE.to_string(),
        });

        // An executor still marked running falls back to the task's completion time.
        let finished_at = first_present(&[&executor.finished_at, &task.completed_at]);
        match task.status {
            TaskStatus::Completed => entries.push(TaskLogEntry {
                timestamp: finished_at.to_string(),
                message: COMPLETED_MESSAGE.to_string(),
            }),
            TaskStatus::Failed => {
                let message = task
                    .error
                    .as_ref()
                    .and_then(|e| e.message.as_deref())
                    .and_then(non_empty)
                    .unwrap_or(FAILED_FALLBACK_MESSAGE);
                entries.push(TaskLogEntry {
                    timestamp: finished_at.to_string(),
                    message: message.to_string(),
                });
            }
            TaskStatus::Queued | TaskStatus::Processing => {}
        }
    }

    entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{TaskErrorInfo, TokenUsage};

    fn run(role: AgentRole, started_at: &str, finished_at: &str) -> AgentRun {
        AgentRun {
            run_id: format!("run-{:?}", role),
            task_id: "task-1".to_string(),
            session_id: None,
            agent_name: "agent".to_string(),
            agent_role: role,
            input: String::new(),
            output: String::new(),
            model: "model".to_string(),
            tools_used: Vec::new(),
            started_at: Some(started_at.to_string()).filter(|s| !s.is_empty()),
            finished_at: Some(finished_at.to_string()).filter(|s| !s.is_empty()),
            duration_ms: None,
            token_usage: TokenUsage::default(),
        }
    }

    fn task(status: TaskStatus) -> TaskDetail {
        TaskDetail {
            task_id: "task-1".to_string(),
            session_id: None,
            input_text: "write a haiku".to_string(),
            status,
            selected_agent: Some("ContentAgent".to_string()),
            agent_type: None,
            peer_routing_reason: None,
            created_at: "2024-03-01T10:00:00Z".to_string(),
            queued_at: Some("2024-03-01T10:00:00Z".to_string()),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
            agent_runs: Vec::new(),
            api_version: "v1".to_string(),
        }
    }

    fn messages(entries: &[TaskLogEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.message.as_str()).collect()
    }

    #[test]
    fn no_task_means_no_logs() {
        assert!(build_task_logs(None).is_empty());
    }

    #[test]
    fn completed_task_produces_full_timeline() {
        let mut detail = task(TaskStatus::Completed);
        // Executor listed first to check the output is sorted, not insertion ordered.
        detail.agent_runs = vec![
            run(AgentRole::Executor, "2024-03-01T10:00:03Z", "2024-03-01T10:00:09Z"),
            run(AgentRole::Router, "2024-03-01T10:00:01Z", "2024-03-01T10:00:02Z"),
        ];

        let logs = build_task_logs(Some(&detail));
        assert_eq!(
            messages(&logs),
            vec![
                QUEUED_MESSAGE,
                "Routed to ContentAgent",
                PROCESSING_MESSAGE,
                COMPLETED_MESSAGE
            ]
        );
        assert_eq!(logs[1].timestamp, "2024-03-01T10:00:02Z");
        assert!(logs.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn router_without_finish_uses_start_time() {
        let mut detail = task(TaskStatus::Processing);
        detail.agent_runs = vec![run(AgentRole::Router, "2024-03-01T10:00:01Z", "")];
        let logs = build_task_logs(Some(&detail));
        assert_eq!(logs[1].timestamp, "2024-03-01T10:00:01Z");
    }

    #[test]
    fn routing_requires_selected_agent() {
        let mut detail = task(TaskStatus::Processing);
        detail.selected_agent = None;
        detail.agent_runs = vec![run(AgentRole::Router, "2024-03-01T10:00:01Z", "2024-03-01T10:00:02Z")];
        assert_eq!(messages(&build_task_logs(Some(&detail))), vec![QUEUED_MESSAGE]);
    }

    #[test]
    fn failed_task_uses_error_message_or_fallback() {
        let mut detail = task(TaskStatus::Failed);
        detail.agent_runs = vec![run(AgentRole::Executor, "2024-03-01T10:00:03Z", "2024-03-01T10:00:04Z")];
        detail.error = Some(TaskErrorInfo {
            error_type: Some("Timeout".to_string()),
            message: Some("Executor timed out".to_string()),
            stack: None,
        });
        let logs = build_task_logs(Some(&detail));
        assert_eq!(logs.last().map(|e| e.message.as_str()), Some("Executor timed out"));

        detail.error = None;
        let logs = build_task_logs(Some(&detail));
        assert_eq!(logs.last().map(|e| e.message.as_str()), Some(FAILED_FALLBACK_MESSAGE));
    }

    #[test]
    fn processing_task_has_no_final_entry() {
        let mut detail = task(TaskStatus::Processing);
        detail.agent_runs = vec![run(AgentRole::Executor, "2024-03-01T10:00:03Z", "")];
        assert_eq!(
            messages(&build_task_logs(Some(&detail))),
            vec![QUEUED_MESSAGE, PROCESSING_MESSAGE]
        );
    }

    #[test]
    fn unfinished_executor_uses_task_completion_time() {
        let mut detail = task(TaskStatus::Completed);
        detail.completed_at = Some("2024-03-01T10:00:09Z".to_string());
        detail.agent_runs = vec![run(AgentRole::Executor, "2024-03-01T10:00:03Z", "")];
        let logs = build_task_logs(Some(&detail));
        assert_eq!(
            logs.last().map(|e| (e.timestamp.as_str(), e.message.as_str())),
            Some(("2024-03-01T10:00:09Z", COMPLETED_MESSAGE))
        );
    }

    #[test]
    fn date_time_formatting() {
        assert_eq!(format_date_time_in(None, &Utc), "-");
        assert_eq!(format_date_time_in(Some("garbage"), &Utc), "garbage");
        assert_eq!(
            format_date_time_in(Some("2024-03-01T00:05:00Z"), &Utc),
            "2024-03-01 12:05 AM"
        );
        assert_eq!(
            format_date_time_in(Some("2024-03-01T13:45:10.123+00:00"), &Utc),
            "2024-03-01 1:45 PM"
        );
    }

    #[test]
    fn time_formatting() {
        assert_eq!(format_time_in(Some("2024-03-01T09:03:07Z"), &Utc), "09:03:07");
        assert_eq!(format_time_in(Some("nope"), &Utc), "--:--:--");
        assert_eq!(format_time_in(None, &Utc), "--:--:--");
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(
            format_duration(Some("2024-03-01T10:00:00Z"), Some("2024-03-01T10:00:42.600Z")),
            "43s"
        );
        assert_eq!(
            format_duration(Some("2024-03-01T10:00:00Z"), Some("2024-03-01T10:02:05Z")),
            "2m 5s"
        );
        assert_eq!(
            format_duration(Some("2024-03-01T10:00:05Z"), Some("2024-03-01T10:00:00Z")),
            "-"
        );
        assert_eq!(format_duration(None, Some("2024-03-01T10:00:00Z")), "-");
    }
}
