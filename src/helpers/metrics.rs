//! Metrics derivations for the usage breakdown and the daily chart.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::api::types::DaySnapshot;

/// Task counts bucketed by agent family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AgentUsageBreakdown {
    pub content: f64,
    pub code: f64,
    pub other: f64,
    pub total: f64,
}

/// Integer shares of [`AgentUsageBreakdown`]; they sum to exactly 100 when
/// the total is positive and are all zero otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AgentUsagePercentages {
    pub content_pct: u8,
    pub code_pct: u8,
    pub other_pct: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailyTaskSeries {
    pub labels: Vec<String>,
    pub values: Vec<u64>,
}

/// Bucket per-agent counts by case-insensitive substring of the agent name.
/// `content` wins over `code`; non-finite and non-positive counts are skipped.
pub fn agent_usage_breakdown(tasks_per_agent: Option<&HashMap<String, f64>>) -> AgentUsageBreakdown {
    let mut breakdown = AgentUsageBreakdown::default();
    let Some(tasks_per_agent) = tasks_per_agent else {
        return breakdown;
    };

    for (key, &count) in tasks_per_agent {
        if !count.is_finite() || count <= 0.0 {
            continue;
        }
        let key = key.trim().to_lowercase();
        if key.contains("content") {
            breakdown.content += count;
        } else if key.contains("code") {
            breakdown.code += count;
        } else {
            breakdown.other += count;
        }
    }

    breakdown.total = breakdown.content + breakdown.code + breakdown.other;
    breakdown
}

pub fn agent_usage_percentages(breakdown: &AgentUsageBreakdown) -> AgentUsagePercentages {
    if breakdown.total.is_nan() || breakdown.total <= 0.0 {
        return AgentUsagePercentages::default();
    }

    let content = rounded_share(breakdown.content, breakdown.total);
    // Two halves can both round up (50.5 + 49.5); code yields the overshoot.
    let code = rounded_share(breakdown.code, breakdown.total).min(100 - content);
    let other = (100 - content - code).max(0);

    AgentUsagePercentages {
        content_pct: content as u8,
        code_pct: code as u8,
        other_pct: other as u8,
    }
}

/// Share in whole percent, rounded half up and clamped to `[0, 100]`.
fn rounded_share(part: f64, total: f64) -> i64 {
    let pct = (part / total * 100.0 + 0.5).floor();
    (pct as i64).clamp(0, 100)
}

/// Chart labels (`Jan 05`) and values for the daily history.
pub fn daily_task_series(last_days: &[DaySnapshot]) -> DailyTaskSeries {
    let mut series = DailyTaskSeries::default();
    for snapshot in last_days {
        let label = NaiveDate::parse_from_str(snapshot.date.trim(), "%Y-%m-%d")
            .map(|date| date.format("%b %d").to_string())
            .unwrap_or_else(|_| snapshot.date.clone());
        series.labels.push(label);
        series.values.push(snapshot.total_tasks);
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(entries: &[(&str, f64)]) -> HashMap<String, f64> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn breakdown_buckets_by_name() {
        let map = counts(&[("ContentBot", 5.0), ("CodeBot", 3.0), ("Other", 2.0)]);
        let breakdown = agent_usage_breakdown(Some(&map));
        assert_eq!(
            breakdown,
            AgentUsageBreakdown {
                content: 5.0,
                code: 3.0,
                other: 2.0,
                total: 10.0
            }
        );
        assert_eq!(
            agent_usage_percentages(&breakdown),
            AgentUsagePercentages {
                content_pct: 50,
                code_pct: 30,
                other_pct: 20
            }
        );
    }

    #[test]
    fn breakdown_skips_invalid_counts() {
        let map = counts(&[
            ("content-writer", f64::NAN),
            ("code-runner", -4.0),
            ("  CODE  ", 0.0),
            ("planner", f64::INFINITY),
            ("ContentCodeHybrid", 1.0),
        ]);
        let breakdown = agent_usage_breakdown(Some(&map));
        assert_eq!(breakdown.content, 1.0);
        assert_eq!(breakdown.code, 0.0);
        assert_eq!(breakdown.total, 1.0);
    }

    #[test]
    fn empty_inputs_are_all_zero() {
        assert_eq!(agent_usage_breakdown(None), AgentUsageBreakdown::default());
        assert_eq!(
            agent_usage_percentages(&AgentUsageBreakdown::default()),
            AgentUsagePercentages::default()
        );
    }

    #[test]
    fn percentages_always_sum_to_hundred() {
        let cases = [
            (1.0, 1.0, 1.0),
            (1.0, 1.0, 0.0),
            (2.0, 1.0, 0.0),
            (1.0, 0.0, 0.0),
            (0.5, 0.5, 0.0),
            (7.0, 3.0, 13.0),
            (997.0, 2.0, 1.0),
        ];
        for (content, code, other) in cases {
            let breakdown = AgentUsageBreakdown {
                content,
                code,
                other,
                total: content + code + other,
            };
            let pct = agent_usage_percentages(&breakdown);
            assert_eq!(
                u32::from(pct.content_pct) + u32::from(pct.code_pct) + u32::from(pct.other_pct),
                100,
                "{:?} -> {:?}",
                breakdown,
                pct
            );
        }
    }

    #[test]
    fn rounding_overshoot_is_taken_from_code() {
        let breakdown = AgentUsageBreakdown {
            content: 101.0,
            code: 99.0,
            other: 0.0,
            total: 200.0,
        };
        let pct = agent_usage_percentages(&breakdown);
        assert_eq!(pct.content_pct, 51);
        assert_eq!(pct.code_pct, 49);
        assert_eq!(pct.other_pct, 0);
    }

    #[test]
    fn daily_series_formats_labels() {
        let days = vec![
            DaySnapshot {
                date: "2024-01-05".to_string(),
                total_tasks: 12,
            },
            DaySnapshot {
                date: "yesterday".to_string(),
                total_tasks: 3,
            },
        ];
        let series = daily_task_series(&days);
        assert_eq!(series.labels, vec!["Jan 05", "yesterday"]);
        assert_eq!(series.values, vec![12, 3]);
        assert_eq!(daily_task_series(&[]), DailyTaskSeries::default());
    }
}
