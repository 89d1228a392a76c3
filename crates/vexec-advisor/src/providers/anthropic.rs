use async_trait::async_trait;
use reqwest::Client;

use crate::advisor::{
    Advisor, AdvisorError, GoalBreakdown, GoalBrief, ProgressFeedback, ProgressReview,
};
use crate::models::{Message, MessagesRequest, MessagesResponse};
use crate::parse::parse_reply;
use crate::prompt::{build_breakdown_prompt, build_review_prompt, SYSTEM_PROMPT};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const API_VERSION: &str = "2023-06-01";

/// Connection settings for [`AnthropicAdvisor`]. `None` fields fall back to
/// the defaults above.
#[derive(Debug, Clone, Default)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Advisor backed by the Anthropic Messages API.
#[derive(Clone)]
pub struct AnthropicAdvisor {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl AnthropicAdvisor {
    pub fn new(config: AnthropicConfig) -> Result<Self, AdvisorError> {
        let timeout = config.timeout_secs.unwrap_or(60);
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout))
            .build()?;

        Ok(Self {
            api_key: config.api_key,
            model: config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: config
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            client,
            max_tokens: config.max_tokens.unwrap_or(2048),
            temperature: config.temperature,
        })
    }

    async fn call_api(&self, prompt: String) -> Result<String, AdvisorError> {
        let req = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt,
            }],
            temperature: self.temperature,
        };

        tracing::debug!(model = %self.model, "Calling Anthropic Messages API");

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&req)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(status, body = %body, "Anthropic API request failed");
            return Err(AdvisorError::Api { status, body });
        }

        let parsed: MessagesResponse = resp.json().await?;
        tracing::debug!(usage = ?parsed.usage, stop_reason = ?parsed.stop_reason, "Anthropic API response received");

        let text = parsed.text();
        if text.trim().is_empty() {
            return Err(AdvisorError::EmptyResponse);
        }
        Ok(text)
    }
}

#[async_trait]
impl Advisor for AnthropicAdvisor {
    fn provider(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn breakdown_goal(&self, brief: &GoalBrief) -> Result<GoalBreakdown, AdvisorError> {
        let reply = self.call_api(build_breakdown_prompt(brief)).await?;
        parse_reply(&reply)
    }

    async fn review_progress(
        &self,
        review: &ProgressReview,
    ) -> Result<ProgressFeedback, AdvisorError> {
        let reply = self.call_api(build_review_prompt(review)).await?;
        parse_reply(&reply)
    }
}
