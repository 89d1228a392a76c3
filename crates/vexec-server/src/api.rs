pub mod analyses;
pub mod companies;
pub mod files;
pub mod goals;
pub mod pagination;
pub mod tasks;
pub mod team;
pub mod tracking;

use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use vexec_storage::StorageError;

/// Error envelope: `{ success: false, error, traceId }`.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub success: bool,
    pub error: String,
    pub trace_id: String,
}

/// Success envelope. The payload's fields sit next to `success` and
/// `traceId`, so `T` must serialize as a struct or map.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    pub success: bool,
    pub trace_id: String,
    #[serde(flatten)]
    pub data: T,
}

/// Handlers return the error envelope as `Err` so `?` can short-circuit.
pub type ApiResult = Result<Response, Response>;

pub fn success_response<T>(status: StatusCode, trace_id: &str, data: T) -> Response
where
    T: Serialize,
{
    (
        status,
        Json(ApiResponse {
            success: true,
            trace_id: trace_id.to_string(),
            data,
        }),
    )
        .into_response()
}

pub fn error_response(status: StatusCode, trace_id: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiError {
            success: false,
            error: msg.to_string(),
            trace_id: trace_id.to_string(),
        }),
    )
        .into_response()
}

pub fn bad_request(trace_id: &str, msg: &str) -> Response {
    error_response(StatusCode::BAD_REQUEST, trace_id, msg)
}

pub fn not_found(trace_id: &str, msg: &str) -> Response {
    error_response(StatusCode::NOT_FOUND, trace_id, msg)
}

/// Maps a store failure to 404 for missing records and 500 otherwise.
pub fn store_error(trace_id: &str, context: &str, err: anyhow::Error) -> Response {
    if let Some(storage_err) = err.downcast_ref::<StorageError>() {
        if storage_err.is_not_found() {
            return not_found(trace_id, &storage_err.to_string());
        }
    }
    tracing::error!(trace_id = %trace_id, error = %err, "{context}");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, trace_id, "internal error")
}

/// Unwraps a JSON body, turning extractor rejections into the 400 envelope.
pub fn json_body<T>(
    trace_id: &str,
    payload: Result<Json<T>, JsonRejection>,
) -> Result<T, Response> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(bad_request(trace_id, &rejection.body_text())),
    }
}

/// Same as [`json_body`] for query strings.
pub fn query_params<T>(
    trace_id: &str,
    query: Result<Query<T>, QueryRejection>,
) -> Result<T, Response> {
    match query {
        Ok(Query(value)) => Ok(value),
        Err(rejection) => Err(bad_request(trace_id, &rejection.body_text())),
    }
}

pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Read endpoints are scoped to one company and require `companyId`.
pub fn require_company_id(
    trace_id: &str,
    company_id: Option<String>,
) -> Result<String, Response> {
    match company_id {
        Some(id) if !is_blank(&id) => Ok(id.trim().to_string()),
        _ => Err(bad_request(trace_id, "companyId is required")),
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    version: String,
    uptime_secs: i64,
    /// `ok` or `error`
    database: String,
    /// Advisor provider and model, absent when advice is disabled
    advisor: Option<String>,
}

/// Service health. No authentication required.
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service health", body = HealthResponse)
    )
)]
async fn health(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let uptime = (Utc::now() - state.start_time).num_seconds();
    let database = match state.store.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::error!(trace_id = %trace_id.0, error = %e, "Database ping failed");
            "error"
        }
    };
    let advisor = state
        .advisor
        .as_ref()
        .map(|a| format!("{}/{}", a.provider(), a.model_name()));

    success_response(
        StatusCode::OK,
        &trace_id,
        HealthResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: uptime,
            database: database.to_string(),
            advisor,
        },
    )
}

pub fn public_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(health))
}

pub fn auth_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(crate::auth::login))
        .routes(routes!(crate::auth::logout))
}

pub fn protected_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(crate::auth::me))
        .routes(routes!(companies::list_companies, companies::create_company))
        .routes(routes!(companies::get_company))
        .routes(routes!(analyses::list_analyses, analyses::create_analysis))
        .routes(routes!(analyses::analysis_trends))
        .routes(routes!(analyses::get_analysis))
        .routes(routes!(tasks::list_tasks, tasks::create_task))
        .routes(routes!(tasks::task_stats))
        .routes(routes!(tasks::update_task))
        .routes(routes!(goals::list_goals, goals::create_goal))
        .routes(routes!(goals::update_goal))
        .routes(routes!(goals::record_progress))
        .routes(routes!(team::list_team, team::create_team_member))
        .routes(routes!(team::delete_team_member))
        .routes(routes!(files::parse_file))
        .routes(routes!(tracking::list_tracking, tracking::create_tracking))
}
