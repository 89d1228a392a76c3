pub mod advisor;
pub mod models;
pub mod parse;
pub mod prompt;
pub mod providers;

pub use advisor::{
    Advisor, AdvisorError, GoalBreakdown, GoalBrief, Milestone, ProgressFeedback, ProgressPoint,
    ProgressReview,
};
pub use providers::anthropic::{AnthropicAdvisor, AnthropicConfig};
