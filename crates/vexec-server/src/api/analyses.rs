use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use vexec_common::analytics::{
    analysis_summary, analysis_trend, clamp_trend_days, trend_start, AnalysisSummary, TrendPoint,
};
use vexec_common::tasks::derive_tasks_from_analysis;
use vexec_common::types::{Analysis, CreateAnalysisRequest, Task};

use crate::api::pagination::{deserialize_optional_u64, PaginationParams};
use crate::api::{
    bad_request, is_blank, json_body, not_found, query_params, require_company_id, store_error,
    success_response, ApiError, ApiResult,
};
use crate::logging::TraceId;
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AnalysisListParams {
    /// Company to list (required)
    #[param(required = true)]
    pub company_id: Option<String>,
    /// Only this module, e.g. `finance`
    pub module: Option<String>,
    #[param(required = false, value_type = Option<u64>)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub limit: Option<u64>,
    #[param(required = false, value_type = Option<u64>)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub offset: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AnalysisTrendParams {
    #[param(required = true)]
    pub company_id: Option<String>,
    pub module: Option<String>,
    /// Window in days (default 30, max 365)
    pub days: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct AnalysisListResponse {
    pub analyses: Vec<Analysis>,
    pub total: u64,
    pub limit: usize,
    pub offset: usize,
}

/// An analysis with the tasks derived from it.
#[derive(Serialize, ToSchema)]
pub struct AnalysisResponse {
    pub analysis: Analysis,
    pub tasks: Vec<Task>,
}

#[derive(Serialize, ToSchema)]
pub struct AnalysisTrendResponse {
    pub days: i64,
    pub summary: AnalysisSummary,
    pub trend: Vec<TrendPoint>,
}

fn non_blank_module(module: Option<String>) -> Option<String> {
    module
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
}

/// Stored analyses of a company, newest first.
#[utoipa::path(
    get,
    path = "/api/analyses",
    tag = "Analyses",
    security(("bearer_auth" = [])),
    params(AnalysisListParams),
    responses(
        (status = 200, description = "Analysis page", body = AnalysisListResponse),
        (status = 400, description = "companyId missing", body = ApiError)
    )
)]
pub async fn list_analyses(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    query: Result<Query<AnalysisListParams>, QueryRejection>,
) -> ApiResult {
    let params = query_params(&trace_id, query)?;
    let company_id = require_company_id(&trace_id, params.company_id)?;
    let module = non_blank_module(params.module);
    let limit = PaginationParams::resolve_limit(params.limit);
    let offset = PaginationParams::resolve_offset(params.offset);

    let analyses = state
        .store
        .list_analyses(&company_id, module.as_deref(), limit, offset)
        .await
        .map_err(|e| store_error(&trace_id, "Failed to list analyses", e))?;
    let total = state
        .store
        .count_analyses(&company_id, module.as_deref())
        .await
        .map_err(|e| store_error(&trace_id, "Failed to count analyses", e))?;

    Ok(success_response(
        StatusCode::OK,
        &trace_id,
        AnalysisListResponse {
            analyses,
            total,
            limit,
            offset,
        },
    ))
}

/// Saves an analysis result. Unless `generateTasks` is false, the action
/// items and recommendations in `outputData` become tasks.
#[utoipa::path(
    post,
    path = "/api/analyses",
    tag = "Analyses",
    security(("bearer_auth" = [])),
    request_body = CreateAnalysisRequest,
    responses(
        (status = 201, description = "Analysis saved", body = AnalysisResponse),
        (status = 400, description = "Missing fields", body = ApiError),
        (status = 404, description = "Unknown company", body = ApiError)
    )
)]
pub async fn create_analysis(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    payload: Result<Json<CreateAnalysisRequest>, JsonRejection>,
) -> ApiResult {
    let req = json_body(&trace_id, payload)?;
    for (field, value) in [
        ("companyId", &req.company_id),
        ("module", &req.module),
        ("functionName", &req.function_name),
        ("title", &req.title),
    ] {
        if is_blank(value) {
            return Err(bad_request(&trace_id, &format!("{field} is required")));
        }
    }

    let analysis = state
        .store
        .create_analysis(&req)
        .await
        .map_err(|e| store_error(&trace_id, "Failed to save analysis", e))?;

    let tasks = if req.generate_tasks.unwrap_or(true) {
        let derived = derive_tasks_from_analysis(
            &analysis.company_id,
            &analysis.id,
            &analysis.output_data,
            Utc::now(),
        );
        if derived.is_empty() {
            Vec::new()
        } else {
            state
                .store
                .insert_tasks(&derived)
                .await
                .map_err(|e| store_error(&trace_id, "Failed to create analysis tasks", e))?
        }
    } else {
        Vec::new()
    };

    tracing::info!(
        trace_id = %trace_id.0,
        analysis_id = %analysis.id,
        module = %analysis.module,
        tasks = tasks.len(),
        "Analysis saved"
    );
    Ok(success_response(
        StatusCode::CREATED,
        &trace_id,
        AnalysisResponse { analysis, tasks },
    ))
}

#[utoipa::path(
    get,
    path = "/api/analyses/{id}",
    tag = "Analyses",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Analysis id")),
    responses(
        (status = 200, description = "Analysis with derived tasks", body = AnalysisResponse),
        (status = 404, description = "Unknown analysis", body = ApiError)
    )
)]
pub async fn get_analysis(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult {
    let analysis = state
        .store
        .get_analysis(&id)
        .await
        .map_err(|e| store_error(&trace_id, "Failed to load analysis", e))?
        .ok_or_else(|| not_found(&trace_id, "analysis not found"))?;
    let tasks = state
        .store
        .list_tasks_for_analysis(&analysis.id)
        .await
        .map_err(|e| store_error(&trace_id, "Failed to load analysis tasks", e))?;
    Ok(success_response(
        StatusCode::OK,
        &trace_id,
        AnalysisResponse { analysis, tasks },
    ))
}

/// Score trend and summary over the last `days` days.
#[utoipa::path(
    get,
    path = "/api/analyses/trends",
    tag = "Analyses",
    security(("bearer_auth" = [])),
    params(AnalysisTrendParams),
    responses(
        (status = 200, description = "Trend points and summary", body = AnalysisTrendResponse),
        (status = 400, description = "companyId missing", body = ApiError),
        (status = 404, description = "Unknown company", body = ApiError)
    )
)]
pub async fn analysis_trends(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    query: Result<Query<AnalysisTrendParams>, QueryRejection>,
) -> ApiResult {
    let params = query_params(&trace_id, query)?;
    let company_id = require_company_id(&trace_id, params.company_id)?;
    let module = non_blank_module(params.module);
    let days = clamp_trend_days(params.days);

    state
        .store
        .ensure_company(&company_id)
        .await
        .map_err(|e| store_error(&trace_id, "Failed to load company", e))?;

    let now = Utc::now();
    let analyses = state
        .store
        .list_analyses_since(&company_id, module.as_deref(), trend_start(now, days))
        .await
        .map_err(|e| store_error(&trace_id, "Failed to load analyses", e))?;

    Ok(success_response(
        StatusCode::OK,
        &trace_id,
        AnalysisTrendResponse {
            days,
            summary: analysis_summary(&analyses),
            trend: analysis_trend(&analyses, now, days),
        },
    ))
}
