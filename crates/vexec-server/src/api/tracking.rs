use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use vexec_common::analytics::{kpi_summary, KpiMetricSummary};
use vexec_common::types::{CreateKpiRequest, KpiEntry};

use crate::api::pagination::deserialize_optional_u64;
use crate::api::{
    bad_request, is_blank, json_body, query_params, require_company_id, store_error,
    success_response, ApiError, ApiResult,
};
use crate::logging::TraceId;
use crate::state::AppState;

const DEFAULT_ENTRY_LIMIT: u64 = 500;
const MAX_ENTRY_LIMIT: u64 = 5000;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TrackingParams {
    #[param(required = true)]
    pub company_id: Option<String>,
    /// Only this metric
    pub metric: Option<String>,
    /// Newest entries to return (default 500)
    #[param(required = false, value_type = Option<u64>)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub limit: Option<u64>,
}

/// `summary` is computed over the returned entries.
#[derive(Serialize, ToSchema)]
pub struct TrackingResponse {
    pub entries: Vec<KpiEntry>,
    pub summary: Vec<KpiMetricSummary>,
}

#[derive(Serialize, ToSchema)]
pub struct KpiEntryResponse {
    pub entry: KpiEntry,
}

/// Recorded KPI values, newest first, with a per-metric summary.
#[utoipa::path(
    get,
    path = "/api/tracking",
    tag = "Tracking",
    security(("bearer_auth" = [])),
    params(TrackingParams),
    responses(
        (status = 200, description = "KPI entries and summary", body = TrackingResponse),
        (status = 400, description = "companyId missing", body = ApiError)
    )
)]
pub async fn list_tracking(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    query: Result<Query<TrackingParams>, QueryRejection>,
) -> ApiResult {
    let params = query_params(&trace_id, query)?;
    let company_id = require_company_id(&trace_id, params.company_id)?;
    let metric = params
        .metric
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());
    let limit = params
        .limit
        .unwrap_or(DEFAULT_ENTRY_LIMIT)
        .clamp(1, MAX_ENTRY_LIMIT) as usize;

    let entries = state
        .store
        .list_kpi_entries(&company_id, metric.as_deref(), limit)
        .await
        .map_err(|e| store_error(&trace_id, "Failed to list KPI entries", e))?;
    let summary = kpi_summary(&entries);

    Ok(success_response(
        StatusCode::OK,
        &trace_id,
        TrackingResponse { entries, summary },
    ))
}

#[utoipa::path(
    post,
    path = "/api/tracking",
    tag = "Tracking",
    security(("bearer_auth" = [])),
    request_body = CreateKpiRequest,
    responses(
        (status = 201, description = "KPI value recorded", body = KpiEntryResponse),
        (status = 400, description = "Invalid entry", body = ApiError),
        (status = 404, description = "Unknown company", body = ApiError)
    )
)]
pub async fn create_tracking(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    payload: Result<Json<CreateKpiRequest>, JsonRejection>,
) -> ApiResult {
    let mut req = json_body(&trace_id, payload)?;
    req.company_id = require_company_id(&trace_id, Some(req.company_id))?;
    if is_blank(&req.metric) {
        return Err(bad_request(&trace_id, "metric is required"));
    }
    req.metric = req.metric.trim().to_string();
    if !req.value.is_finite() {
        return Err(bad_request(&trace_id, "value must be a finite number"));
    }

    let entry = state
        .store
        .create_kpi_entry(&req)
        .await
        .map_err(|e| store_error(&trace_id, "Failed to record KPI value", e))?;
    Ok(success_response(
        StatusCode::CREATED,
        &trace_id,
        KpiEntryResponse { entry },
    ))
}
