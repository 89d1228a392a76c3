use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Analysis, KpiEntry};

pub const DEFAULT_TREND_DAYS: i64 = 30;
pub const MAX_TREND_DAYS: i64 = 365;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub module: String,
    /// Mean of the scored analyses that day; `None` when none carried a score
    pub average_score: Option<f64>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub total: usize,
    pub by_module: BTreeMap<String, usize>,
    pub latest_health_score: Option<i32>,
    pub average_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KpiMetricSummary {
    pub metric: String,
    pub latest: f64,
    pub latest_recorded_at: DateTime<Utc>,
    pub previous: Option<f64>,
    /// Percentage change from `previous` to `latest`
    pub change_pct: Option<f64>,
    pub count: usize,
}

/// Clamps a requested trend window into `1..=MAX_TREND_DAYS`.
pub fn clamp_trend_days(days: Option<i64>) -> i64 {
    days.unwrap_or(DEFAULT_TREND_DAYS).clamp(1, MAX_TREND_DAYS)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// First instant of a `days`-day window ending today: midnight UTC of
/// `today - (days - 1)`. Summaries and trends share this bound.
pub fn trend_start(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    let first_day = now.date_naive() - Duration::days(days.max(1) - 1);
    first_day.and_time(NaiveTime::MIN).and_utc()
}

/// Groups analyses from the last `days` days (UTC, today included) by day and
/// module. Days without analyses produce no point.
pub fn analysis_trend(analyses: &[Analysis], now: DateTime<Utc>, days: i64) -> Vec<TrendPoint> {
    let today = now.date_naive();
    let start = trend_start(now, days).date_naive();

    let mut buckets: BTreeMap<(NaiveDate, &str), (usize, Vec<f64>)> = BTreeMap::new();
    for analysis in analyses {
        let day = analysis.created_at.date_naive();
        if day < start || day > today {
            continue;
        }
        let bucket = buckets
            .entry((day, analysis.module.as_str()))
            .or_default();
        bucket.0 += 1;
        if let Some(score) = analysis.score {
            bucket.1.push(score);
        }
    }

    buckets
        .into_iter()
        .map(|((date, module), (count, scores))| TrendPoint {
            date,
            module: module.to_string(),
            average_score: mean(&scores),
            count,
        })
        .collect()
}

pub fn analysis_summary(analyses: &[Analysis]) -> AnalysisSummary {
    let mut by_module: BTreeMap<String, usize> = BTreeMap::new();
    for analysis in analyses {
        *by_module.entry(analysis.module.clone()).or_default() += 1;
    }

    let latest_health_score = analyses
        .iter()
        .filter(|a| a.health_score.is_some())
        .max_by_key(|a| a.created_at)
        .and_then(|a| a.health_score);

    let scores: Vec<f64> = analyses.iter().filter_map(|a| a.score).collect();

    AnalysisSummary {
        total: analyses.len(),
        by_module,
        latest_health_score,
        average_score: mean(&scores),
    }
}

/// Latest and previous value per metric, ordered by metric name.
pub fn kpi_summary(entries: &[KpiEntry]) -> Vec<KpiMetricSummary> {
    let mut by_metric: BTreeMap<&str, Vec<&KpiEntry>> = BTreeMap::new();
    for entry in entries {
        by_metric.entry(entry.metric.as_str()).or_default().push(entry);
    }

    by_metric
        .into_iter()
        .filter_map(|(metric, mut items)| {
            // newest first; ties broken by insertion time
            items.sort_by(|a, b| {
                b.recorded_at
                    .cmp(&a.recorded_at)
                    .then(b.created_at.cmp(&a.created_at))
            });
            let latest = items.first()?;
            let previous = items.get(1).map(|e| e.value);
            let change_pct = previous
                .filter(|p| *p != 0.0)
                .map(|p| (latest.value - p) / p.abs() * 100.0);

            Some(KpiMetricSummary {
                metric: metric.to_string(),
                latest: latest.value,
                latest_recorded_at: latest.recorded_at,
                previous,
                change_pct,
                count: items.len(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 30, 18, 0, 0).unwrap()
    }

    fn analysis(module: &str, days_ago: i64, score: Option<f64>, health: Option<i32>) -> Analysis {
        Analysis {
            id: format!("{module}-{days_ago}"),
            company_id: "c1".into(),
            module: module.into(),
            function_name: "review".into(),
            title: "Review".into(),
            input_data: json!({}),
            output_data: json!({}),
            health_score: health,
            score,
            processing_time_ms: None,
            created_at: now() - Duration::days(days_ago),
        }
    }

    fn kpi(metric: &str, value: f64, days_ago: i64) -> KpiEntry {
        let at = now() - Duration::days(days_ago);
        KpiEntry {
            id: format!("{metric}-{days_ago}"),
            company_id: "c1".into(),
            metric: metric.into(),
            value,
            period: None,
            note: None,
            recorded_at: at,
            created_at: at,
        }
    }

    #[test]
    fn clamp_trend_days_bounds() {
        assert_eq!(clamp_trend_days(None), 30);
        assert_eq!(clamp_trend_days(Some(0)), 1);
        assert_eq!(clamp_trend_days(Some(10_000)), 365);
        assert_eq!(clamp_trend_days(Some(90)), 90);
    }

    #[test]
    fn trend_groups_by_day_and_module() {
        let analyses = vec![
            analysis("finance", 0, Some(80.0), None),
            analysis("finance", 0, Some(60.0), None),
            analysis("finance", 0, None, None),
            analysis("operations", 2, None, None),
            analysis("finance", 45, Some(10.0), None),
        ];

        let trend = analysis_trend(&analyses, now(), 30);
        assert_eq!(trend.len(), 2);
        assert_eq!(trend[0].module, "operations");
        assert_eq!(trend[0].average_score, None);
        assert_eq!(trend[1].module, "finance");
        assert_eq!(trend[1].count, 3);
        assert_eq!(trend[1].average_score, Some(70.0));
    }

    #[test]
    fn trend_and_window_start_agree() {
        let start = trend_start(now(), 30);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(
            trend_start(now(), 1),
            Utc.with_ymd_and_hms(2025, 6, 30, 0, 0, 0).unwrap()
        );

        // 30 days back at 18:00 falls before the window's first midnight
        let analyses = vec![
            analysis("finance", 29, Some(50.0), None),
            analysis("finance", 30, Some(10.0), None),
        ];
        let in_window: Vec<Analysis> = analyses
            .iter()
            .filter(|a| a.created_at >= start)
            .cloned()
            .collect();
        let trend = analysis_trend(&analyses, now(), 30);
        let counted: usize = trend.iter().map(|p| p.count).sum();
        assert_eq!(counted, in_window.len());
        assert_eq!(analysis_summary(&in_window).total, 1);
    }

    #[test]
    fn summary_reports_latest_health_score() {
        let analyses = vec![
            analysis("finance", 5, Some(50.0), Some(40)),
            analysis("finance", 1, Some(70.0), Some(72)),
            analysis("sales", 0, None, None),
        ];
        let summary = analysis_summary(&analyses);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.by_module["finance"], 2);
        assert_eq!(summary.latest_health_score, Some(72));
        assert_eq!(summary.average_score, Some(60.0));

        let empty = analysis_summary(&[]);
        assert_eq!(empty.total, 0);
        assert_eq!(empty.average_score, None);
    }

    #[test]
    fn kpi_summary_computes_change() {
        let entries = vec![
            kpi("revenue", 100.0, 30),
            kpi("revenue", 125.0, 0),
            kpi("churn", 0.0, 10),
            kpi("churn", 2.0, 1),
            kpi("nps", 42.0, 3),
        ];
        let summary = kpi_summary(&entries);
        let names: Vec<&str> = summary.iter().map(|s| s.metric.as_str()).collect();
        assert_eq!(names, vec!["churn", "nps", "revenue"]);

        assert_eq!(summary[0].previous, Some(0.0));
        assert_eq!(summary[0].change_pct, None);
        assert_eq!(summary[1].previous, None);
        assert_eq!(summary[1].change_pct, None);
        assert_eq!(summary[2].latest, 125.0);
        assert_eq!(summary[2].change_pct, Some(25.0));
        assert_eq!(summary[2].count, 2);
    }
}
