//! Plain-text renderers for CLI output.

use std::fmt::Write as _;

use crate::api::types::{PaginationMeta, SystemMetrics, TaskDetail, TaskLogEntry, TaskSummary};
use crate::helpers::{
    format_date_time, format_duration, format_time, AgentUsageBreakdown, AgentUsagePercentages,
    DailyTaskSeries,
};
use crate::live::TrackingMode;

const SUMMARY_WIDTH: usize = 60;

fn truncate(text: &str, width: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(width).collect();
    if chars.next().is_some() {
        format!("{}…", head.trim_end())
    } else {
        head
    }
}

fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}

pub fn render_mode(mode: TrackingMode) -> String {
    match mode {
        TrackingMode::Push => "Tracking: live".to_string(),
        TrackingMode::Pull => "Tracking: polling".to_string(),
    }
}

pub fn render_log_line(entry: &TaskLogEntry) -> String {
    format!("[{}] {}", format_time(Some(&entry.timestamp)), entry.message)
}

pub fn render_logs(entries: &[TaskLogEntry]) -> String {
    if entries.is_empty() {
        return "No log entries yet.\n".to_string();
    }
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(out, "{}", render_log_line(entry));
    }
    out
}

pub fn render_task_detail(task: &TaskDetail) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Task      {}", task.task_id);
    let _ = writeln!(out, "Status    {}", task.status);
    let agent = match (task.selected_agent.as_deref(), task.agent_type) {
        (Some(name), Some(kind)) => format!("{} ({})", name, kind),
        (Some(name), None) => name.to_string(),
        (None, Some(kind)) => kind.to_string(),
        (None, None) => "-".to_string(),
    };
    let _ = writeln!(out, "Agent     {}", agent);
    let _ = writeln!(out, "Created   {}", format_date_time(Some(&task.created_at)));
    let _ = writeln!(
        out,
        "Duration  {}",
        format_duration(task.started_at.as_deref(), task.completed_at.as_deref())
    );
    if let Some(session_id) = task.session_id.as_deref() {
        let _ = writeln!(out, "Session   {}", session_id);
    }
    if let Some(reason) = task.peer_routing_reason.as_deref() {
        let _ = writeln!(out, "Routing   {}", reason);
    }

    let _ = writeln!(out, "\nInput\n  {}", task.input_text);

    if let Some(result) = &task.result {
        let _ = writeln!(out, "\nResult");
        if let Some(summary) = result.summary.as_deref() {
            let _ = writeln!(out, "  {}", summary);
        }
        if let Some(raw) = result.raw_output.as_deref() {
            let language = result.code_language.as_deref().unwrap_or("");
            let _ = writeln!(out, "```{}\n{}\n```", language, raw.trim_end());
        }
        for citation in &result.citations {
            let title = or_dash(citation.title.as_deref());
            match citation.url.as_deref() {
                Some(url) => {
                    let _ = writeln!(out, "  - {} [{}] {}", title, citation.source, url);
                }
                None => {
                    let _ = writeln!(out, "  - {} [{}]", title, citation.source);
                }
            }
        }
    }

    if let Some(error) = &task.error {
        let _ = writeln!(
            out,
            "\nError {}: {}",
            or_dash(error.error_type.as_deref()),
            or_dash(error.message.as_deref())
        );
    }
    out
}

pub fn render_history(items: &[TaskSummary], meta: Option<&PaginationMeta>) -> String {
    let mut out = String::new();
    if items.is_empty() {
        out.push_str("No tasks found.\n");
    } else {
        let id_width = items
            .iter()
            .map(|t| t.task_id.chars().count())
            .max()
            .unwrap_or(0)
            .max("TASK".len());
        let _ = writeln!(
            out,
            "{:<id_width$}  {:<10}  {:<8}  {:<19}  SUMMARY",
            "TASK", "STATUS", "AGENT", "CREATED"
        );
        for task in items {
            let agent = task.agent_type.map(|a| a.to_string());
            let _ = writeln!(
                out,
                "{:<id_width$}  {:<10}  {:<8}  {:<19}  {}",
                task.task_id,
                task.status.as_str(),
                or_dash(agent.as_deref()),
                format_date_time(Some(&task.created_at)),
                truncate(or_dash(task.summary.as_deref()), SUMMARY_WIDTH)
            );
        }
    }

    if let Some(meta) = meta {
        let _ = writeln!(
            out,
            "\nPage {} of {} ({} tasks)",
            meta.page,
            meta.total_pages.max(1),
            meta.total_items
        );
    }
    out
}

pub fn render_metrics(
    metrics: &SystemMetrics,
    breakdown: &AgentUsageBreakdown,
    percentages: &AgentUsagePercentages,
    series: &DailyTaskSeries,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Metrics for {}", metrics.date);
    let _ = writeln!(out, "  Total tasks    {}", metrics.total_tasks);
    let _ = writeln!(out, "  Pending        {}", metrics.pending_tasks);
    let _ = writeln!(out, "  Avg latency    {:.0} ms", metrics.avg_latency_ms);
    let _ = writeln!(out, "  p95 latency    {:.0} ms", metrics.p95_latency_ms);

    let _ = writeln!(out, "\nAgent usage");
    let _ = writeln!(
        out,
        "  Content  {:>3}%  ({})",
        percentages.content_pct, breakdown.content
    );
    let _ = writeln!(out, "  Code     {:>3}%  ({})", percentages.code_pct, breakdown.code);
    let _ = writeln!(out, "  Other    {:>3}%  ({})", percentages.other_pct, breakdown.other);

    if !metrics.api_health.is_empty() {
        let _ = writeln!(out, "\nDependencies");
        let mut health: Vec<_> = metrics.api_health.iter().collect();
        health.sort();
        for (name, status) in health {
            let _ = writeln!(out, "  {:<14} {}", name, status);
        }
    }

    if !series.labels.is_empty() {
        let _ = writeln!(out, "\nLast days");
        for (label, value) in series.labels.iter().zip(&series.values) {
            let _ = writeln!(out, "  {:<8} {}", label, value);
        }
    }
    out
}
