use crate::advisor::{GoalBrief, ProgressReview};

/// Persona for every advisor call.
pub const SYSTEM_PROMPT: &str = "You are Jim, a seasoned virtual executive and business advisor \
for small and mid-sized companies. You give direct, practical advice grounded in the numbers \
you are shown. When asked for JSON you reply with a single JSON object and nothing else.";

const BREAKDOWN_PROMPT: &str = r#"Company: {{COMPANY}}
Industry: {{INDUSTRY}}
Today: {{TODAY}}

Goal: {{TITLE}}
Target: {{TARGET}}
Deadline: {{DEADLINE}}

Break this goal down into monthly milestones from now until the deadline
(at most 12). For each month give a measurable target and two to four concrete
actions. Finish with the main risks.

Reply with JSON only, in this shape:
{"summary": "...", "milestones": [{"month": "YYYY-MM", "target": "...", "actions": ["..."]}], "risks": ["..."]}"#;

const REVIEW_PROMPT: &str = r#"Goal: {{TITLE}}
Target: {{TARGET}}
Deadline: {{DEADLINE}}

Planned breakdown:
{{BREAKDOWN}}

Earlier months:
{{HISTORY}}

Actuals for {{MONTH}}:
{{ACTUALS}}

Judge whether the goal is on track given the plan and the actuals. Keep the
feedback to a short paragraph with one concrete next step.

Reply with JSON only, in this shape:
{"feedback": "...", "onTrack": true}"#;

const NOT_SET: &str = "not set";

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

pub fn build_breakdown_prompt(brief: &GoalBrief) -> String {
    BREAKDOWN_PROMPT
        .replace("{{COMPANY}}", &brief.company_name)
        .replace("{{INDUSTRY}}", brief.industry.as_deref().unwrap_or("unknown"))
        .replace("{{TODAY}}", &brief.today.to_string())
        .replace("{{TITLE}}", &brief.title)
        .replace("{{TARGET}}", &brief.target)
        .replace(
            "{{DEADLINE}}",
            &brief
                .deadline
                .map_or_else(|| NOT_SET.to_string(), |d| d.to_string()),
        )
}

pub fn build_review_prompt(review: &ProgressReview) -> String {
    let history = if review.history.is_empty() {
        "none".to_string()
    } else {
        review
            .history
            .iter()
            .map(|p| format!("- {}: {}", p.month, p.actual_data))
            .collect::<Vec<_>>()
            .join("\n")
    };

    REVIEW_PROMPT
        .replace("{{TITLE}}", &review.goal_title)
        .replace("{{TARGET}}", &review.target)
        .replace(
            "{{DEADLINE}}",
            &review
                .deadline
                .map_or_else(|| NOT_SET.to_string(), |d| d.to_string()),
        )
        .replace(
            "{{BREAKDOWN}}",
            &review
                .breakdown
                .as_ref()
                .map_or_else(|| "none".to_string(), pretty),
        )
        .replace("{{HISTORY}}", &history)
        .replace("{{MONTH}}", &review.month)
        .replace("{{ACTUALS}}", &pretty(&review.actual_data))
}
