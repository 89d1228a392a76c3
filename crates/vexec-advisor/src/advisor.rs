use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors raised while asking the advisor for advice.
#[derive(Debug, thiserror::Error)]
pub enum AdvisorError {
    #[error("advisor request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("advisor API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("advisor returned no text content")]
    EmptyResponse,

    #[error("advisor reply is not valid JSON: {0}")]
    InvalidReply(String),
}

/// What the advisor needs to know to plan a goal.
#[derive(Debug, Clone, Serialize)]
pub struct GoalBrief {
    pub company_name: String,
    pub industry: Option<String>,
    pub title: String,
    pub target: String,
    pub deadline: Option<NaiveDate>,
    /// Reference date for "months remaining"
    pub today: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    /// `YYYY-MM`
    pub month: String,
    pub target: String,
    #[serde(default)]
    pub actions: Vec<String>,
}

/// Milestone plan for a goal, stored verbatim as the goal's breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalBreakdown {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    #[serde(default)]
    pub risks: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressPoint {
    pub month: String,
    pub actual_data: Value,
}

/// A month of actuals to be judged against the goal's plan.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressReview {
    pub goal_title: String,
    pub target: String,
    pub deadline: Option<NaiveDate>,
    pub breakdown: Option<Value>,
    pub month: String,
    pub actual_data: Value,
    /// Earlier months, oldest first
    pub history: Vec<ProgressPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressFeedback {
    pub feedback: String,
    pub on_track: bool,
}

/// Advisor backend (one implementation per LLM provider).
#[async_trait]
pub trait Advisor: Send + Sync {
    fn provider(&self) -> &str;

    fn model_name(&self) -> &str;

    /// Breaks a goal down into monthly milestones.
    async fn breakdown_goal(&self, brief: &GoalBrief) -> Result<GoalBreakdown, AdvisorError>;

    /// Judges a month of actuals against the goal.
    async fn review_progress(
        &self,
        review: &ProgressReview,
    ) -> Result<ProgressFeedback, AdvisorError>;
}
