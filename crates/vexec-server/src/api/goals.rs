use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use vexec_advisor::{GoalBrief, ProgressPoint, ProgressReview};
use vexec_common::types::{
    is_valid_month, Company, CreateGoalRequest, Goal, GoalProgress, GoalWithProgress,
    RecordProgressRequest, UpdateGoalRequest,
};
use vexec_storage::ProgressEntry;

use crate::api::{
    bad_request, is_blank, json_body, not_found, query_params, require_company_id, store_error,
    success_response, ApiError, ApiResult,
};
use crate::logging::TraceId;
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct GoalListParams {
    #[param(required = true)]
    pub company_id: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct GoalListResponse {
    pub goals: Vec<GoalWithProgress>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateGoalResponse {
    pub goal: Goal,
    /// Whether the advisor produced a milestone breakdown
    pub breakdown_generated: bool,
}

#[derive(Serialize, ToSchema)]
pub struct GoalResponse {
    pub goal: Goal,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub progress: GoalProgress,
    pub feedback_generated: bool,
}

/// Asks the advisor for a milestone plan. Any failure yields `None`.
async fn request_breakdown(
    state: &AppState,
    trace_id: &str,
    company: &Company,
    req: &CreateGoalRequest,
) -> Option<Value> {
    let advisor = state.advisor.as_ref()?;
    let brief = GoalBrief {
        company_name: company.name.clone(),
        industry: company.industry.clone(),
        title: req.title.trim().to_string(),
        target: req.target.trim().to_string(),
        deadline: req.deadline,
        today: Utc::now().date_naive(),
    };

    match advisor.breakdown_goal(&brief).await {
        Ok(breakdown) => match serde_json::to_value(&breakdown) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(trace_id = %trace_id, error = %e, "Failed to encode goal breakdown");
                None
            }
        },
        Err(e) => {
            tracing::warn!(
                trace_id = %trace_id,
                provider = advisor.provider(),
                error = %e,
                "Goal breakdown failed; saving goal without one"
            );
            None
        }
    }
}

/// Asks the advisor to judge a month of actuals. Any failure yields `None`.
async fn request_feedback(
    state: &AppState,
    trace_id: &str,
    goal: &Goal,
    month: &str,
    actual_data: &Value,
    history: Vec<ProgressPoint>,
) -> Option<(String, bool)> {
    let advisor = state.advisor.as_ref()?;
    let review = ProgressReview {
        goal_title: goal.title.clone(),
        target: goal.target.clone(),
        deadline: goal.deadline,
        breakdown: goal.breakdown.clone(),
        month: month.to_string(),
        actual_data: actual_data.clone(),
        history,
    };

    match advisor.review_progress(&review).await {
        Ok(fb) => Some((fb.feedback, fb.on_track)),
        Err(e) => {
            tracing::warn!(
                trace_id = %trace_id,
                provider = advisor.provider(),
                error = %e,
                "Progress review failed; saving progress without feedback"
            );
            None
        }
    }
}

/// Goals of a company with their monthly progress.
#[utoipa::path(
    get,
    path = "/api/goals",
    tag = "Goals",
    security(("bearer_auth" = [])),
    params(GoalListParams),
    responses(
        (status = 200, description = "Goals", body = GoalListResponse),
        (status = 400, description = "companyId missing", body = ApiError)
    )
)]
pub async fn list_goals(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    query: Result<Query<GoalListParams>, QueryRejection>,
) -> ApiResult {
    let params = query_params(&trace_id, query)?;
    let company_id = require_company_id(&trace_id, params.company_id)?;
    let goals = state
        .store
        .list_goals(&company_id)
        .await
        .map_err(|e| store_error(&trace_id, "Failed to list goals", e))?;
    Ok(success_response(
        StatusCode::OK,
        &trace_id,
        GoalListResponse { goals },
    ))
}

/// Creates a goal. When an advisor is configured it is asked for a monthly
/// milestone breakdown; if that fails the goal is saved without one.
#[utoipa::path(
    post,
    path = "/api/goals",
    tag = "Goals",
    security(("bearer_auth" = [])),
    request_body = CreateGoalRequest,
    responses(
        (status = 201, description = "Goal created", body = CreateGoalResponse),
        (status = 400, description = "Missing fields", body = ApiError),
        (status = 404, description = "Unknown company", body = ApiError)
    )
)]
pub async fn create_goal(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    payload: Result<Json<CreateGoalRequest>, JsonRejection>,
) -> ApiResult {
    let mut req = json_body(&trace_id, payload)?;
    req.company_id = require_company_id(&trace_id, Some(req.company_id))?;
    if is_blank(&req.title) || is_blank(&req.target) {
        return Err(bad_request(&trace_id, "title and target are required"));
    }

    let company = state
        .store
        .get_company(&req.company_id)
        .await
        .map_err(|e| store_error(&trace_id, "Failed to load company", e))?
        .ok_or_else(|| not_found(&trace_id, "company not found"))?;

    let breakdown = request_breakdown(&state, &trace_id, &company, &req).await;
    let goal = state
        .store
        .create_goal(&req, breakdown.as_ref())
        .await
        .map_err(|e| store_error(&trace_id, "Failed to create goal", e))?;

    tracing::info!(
        trace_id = %trace_id.0,
        goal_id = %goal.id,
        breakdown = breakdown.is_some(),
        "Goal created"
    );
    Ok(success_response(
        StatusCode::CREATED,
        &trace_id,
        CreateGoalResponse {
            breakdown_generated: breakdown.is_some(),
            goal,
        },
    ))
}

fn is_empty_patch(patch: &UpdateGoalRequest) -> bool {
    patch.title.is_none()
        && patch.target.is_none()
        && patch.deadline.is_none()
        && patch.status.is_none()
        && patch.breakdown.is_none()
}

#[utoipa::path(
    patch,
    path = "/api/goals/{id}",
    tag = "Goals",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Goal id")),
    request_body = UpdateGoalRequest,
    responses(
        (status = 200, description = "Goal updated", body = GoalResponse),
        (status = 400, description = "Empty or invalid patch", body = ApiError),
        (status = 404, description = "Unknown goal", body = ApiError)
    )
)]
pub async fn update_goal(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateGoalRequest>, JsonRejection>,
) -> ApiResult {
    let patch = json_body(&trace_id, payload)?;
    if is_empty_patch(&patch) {
        return Err(bad_request(&trace_id, "no fields to update"));
    }
    if patch.title.as_deref().is_some_and(is_blank) || patch.target.as_deref().is_some_and(is_blank)
    {
        return Err(bad_request(&trace_id, "title and target cannot be blank"));
    }

    let goal = state
        .store
        .update_goal(&id, &patch)
        .await
        .map_err(|e| store_error(&trace_id, "Failed to update goal", e))?
        .ok_or_else(|| not_found(&trace_id, "goal not found"))?;
    Ok(success_response(
        StatusCode::OK,
        &trace_id,
        GoalResponse { goal },
    ))
}

/// Records actuals for one month, replacing an earlier entry for the same
/// month. The advisor's verdict is stored alongside when available.
#[utoipa::path(
    post,
    path = "/api/goals/{id}/progress",
    tag = "Goals",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Goal id")),
    request_body = RecordProgressRequest,
    responses(
        (status = 201, description = "Progress recorded", body = ProgressResponse),
        (status = 400, description = "Invalid month", body = ApiError),
        (status = 404, description = "Unknown goal", body = ApiError)
    )
)]
pub async fn record_progress(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<RecordProgressRequest>, JsonRejection>,
) -> ApiResult {
    let req = json_body(&trace_id, payload)?;
    let month = req.month.trim().to_string();
    if !is_valid_month(&month) {
        return Err(bad_request(&trace_id, "month must be formatted as YYYY-MM"));
    }

    let goal = state
        .store
        .get_goal(&id)
        .await
        .map_err(|e| store_error(&trace_id, "Failed to load goal", e))?
        .ok_or_else(|| not_found(&trace_id, "goal not found"))?;

    let history = if state.advisor.is_some() {
        state
            .store
            .list_goal_progress(&goal.id)
            .await
            .map_err(|e| store_error(&trace_id, "Failed to load goal progress", e))?
            .into_iter()
            .filter(|p| p.month != month)
            .map(|p| ProgressPoint {
                month: p.month,
                actual_data: p.actual_data,
            })
            .collect()
    } else {
        Vec::new()
    };

    let verdict =
        request_feedback(&state, &trace_id, &goal, &month, &req.actual_data, history).await;
    let (feedback, on_track) = match verdict {
        Some((feedback, on_track)) => (Some(feedback), Some(on_track)),
        None => (None, None),
    };

    let progress = state
        .store
        .record_goal_progress(
            &goal.id,
            &ProgressEntry {
                month,
                actual_data: req.actual_data,
                feedback,
                on_track,
            },
        )
        .await
        .map_err(|e| store_error(&trace_id, "Failed to record goal progress", e))?;

    Ok(success_response(
        StatusCode::CREATED,
        &trace_id,
        ProgressResponse {
            feedback_generated: progress.jim_feedback.is_some(),
            progress,
        },
    ))
}
