//! Pure view-model derivations.

pub mod metrics;
pub mod task;

pub use metrics::{
    agent_usage_breakdown, agent_usage_percentages, daily_task_series, AgentUsageBreakdown,
    AgentUsagePercentages, DailyTaskSeries,
};
pub use task::{build_task_logs, format_date_time, format_duration, format_time};
