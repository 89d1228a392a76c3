//! Task bookkeeping: deriving tasks from analysis output and aggregating
//! task statistics.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{NewTask, Task, TaskEffort, TaskPriority, TaskStatus};

pub const MAX_TITLE_CHARS: usize = 200;
pub const HIGH_PRIORITY_DUE_DAYS: i64 = 7;
pub const DEFAULT_DUE_DAYS: i64 = 14;
pub const COMPLETION_TREND_DAYS: i64 = 30;

/// The first items in an analysis are treated as the most important.
const LEADING_HIGH_PRIORITY_ITEMS: usize = 2;
const URGENT_KEYWORDS: [&str; 2] = ["urgent", "critical"];

/// Due date implied by a priority: one week for CRITICAL/HIGH, two weeks
/// otherwise.
pub fn default_due_date(priority: TaskPriority, now: DateTime<Utc>) -> DateTime<Utc> {
    let days = if priority.is_urgent() {
        HIGH_PRIORITY_DUE_DAYS
    } else {
        DEFAULT_DUE_DAYS
    };
    now + Duration::days(days)
}

/// Truncates to at most [`MAX_TITLE_CHARS`] characters. Returns the title and
/// whether anything was cut.
pub fn truncate_title(text: &str) -> (String, bool) {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(MAX_TITLE_CHARS) {
        Some((byte_idx, _)) => (trimmed[..byte_idx].to_string(), true),
        None => (trimmed.to_string(), false),
    }
}

struct ActionItem {
    text: String,
    description: Option<String>,
}

fn action_item(value: &Value) -> Option<ActionItem> {
    let (text, description) = match value {
        Value::String(s) => (s.as_str(), None),
        Value::Object(obj) => {
            let text = ["title", "action", "text"]
                .iter()
                .find_map(|key| obj.get(*key).and_then(Value::as_str))?;
            let description = obj
                .get("description")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string);
            (text, description)
        }
        _ => return None,
    };

    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(ActionItem {
        text: text.to_string(),
        description,
    })
}

fn is_high_priority(index: usize, text: &str) -> bool {
    if index < LEADING_HIGH_PRIORITY_ITEMS {
        return true;
    }
    let lower = text.to_lowercase();
    URGENT_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Builds tasks from an analysis result.
///
/// Items are read from `actionItems` then `recommendations`. Each item is
/// either a string or an object carrying `title`, `action` or `text` and an
/// optional `description`. Position in the combined list counts blank items
/// too, so skipping a blank never promotes a later item.
pub fn derive_tasks_from_analysis(
    company_id: &str,
    analysis_id: &str,
    output_data: &Value,
    now: DateTime<Utc>,
) -> Vec<NewTask> {
    let items = ["actionItems", "recommendations"]
        .iter()
        .filter_map(|key| output_data.get(*key).and_then(Value::as_array))
        .flatten();

    items
        .enumerate()
        .filter_map(|(index, raw)| action_item(raw).map(|item| (index, item)))
        .map(|(index, item)| {
            let priority = if is_high_priority(index, &item.text) {
                TaskPriority::High
            } else {
                TaskPriority::Medium
            };
            let (title, was_truncated) = truncate_title(&item.text);
            let description = if was_truncated {
                Some(item.text.clone())
            } else {
                item.description
            };

            NewTask {
                company_id: company_id.to_string(),
                analysis_id: Some(analysis_id.to_string()),
                title,
                description,
                priority,
                effort: TaskEffort::Medium,
                due_date: Some(default_due_date(priority, now)),
                assigned_to_id: None,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<String, usize>,
    pub overdue: usize,
    pub due_this_week: usize,
    pub due_this_month: usize,
    pub completed: usize,
    /// Percentage of tasks that are DONE, 0 for an empty set
    pub completion_rate: f64,
    /// Tasks completed per UTC day, oldest first, ending today
    pub completion_trend: Vec<DailyCount>,
}

pub fn compute_task_stats(tasks: &[Task], now: DateTime<Utc>) -> TaskStats {
    let mut by_status: BTreeMap<String, usize> = TaskStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    let mut by_priority: BTreeMap<String, usize> = TaskPriority::ALL
        .iter()
        .map(|p| (p.as_str().to_string(), 0))
        .collect();

    let week_end = now + Duration::days(7);
    let month_end = now + Duration::days(30);
    let today = now.date_naive();
    let trend_start = today - Duration::days(COMPLETION_TREND_DAYS - 1);
    let mut completions_by_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();

    let mut overdue = 0;
    let mut due_this_week = 0;
    let mut due_this_month = 0;
    let mut completed = 0;

    for task in tasks {
        *by_status.entry(task.status.as_str().to_string()).or_default() += 1;
        *by_priority
            .entry(task.priority.as_str().to_string())
            .or_default() += 1;

        if task.status == TaskStatus::Done {
            completed += 1;
            if let Some(done_at) = task.completed_at {
                let day = done_at.date_naive();
                if day >= trend_start && day <= today {
                    *completions_by_day.entry(day).or_default() += 1;
                }
            }
        }

        if task.status.is_closed() {
            continue;
        }
        if let Some(due) = task.due_date {
            if due < now {
                overdue += 1;
            } else {
                if due <= week_end {
                    due_this_week += 1;
                }
                if due <= month_end {
                    due_this_month += 1;
                }
            }
        }
    }

    let total = tasks.len();
    let completion_rate = if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64 * 100.0
    };

    let completion_trend = (0..COMPLETION_TREND_DAYS)
        .map(|offset| {
            let date = trend_start + Duration::days(offset);
            DailyCount {
                date,
                count: completions_by_day.get(&date).copied().unwrap_or(0),
            }
        })
        .collect();

    TaskStats {
        total,
        by_status,
        by_priority,
        overdue,
        due_this_week,
        due_this_month,
        completed,
        completion_rate,
        completion_trend,
    }
}
