use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use vexec_common::tasks::{compute_task_stats, default_due_date, TaskStats, MAX_TITLE_CHARS};
use vexec_common::types::{CreateTaskRequest, NewTask, Task, UpdateTaskRequest};
use vexec_storage::TaskFilter;

use crate::api::{
    bad_request, is_blank, json_body, not_found, query_params, require_company_id, store_error,
    success_response, ApiError, ApiResult,
};
use crate::logging::TraceId;
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TaskListParams {
    #[param(required = true)]
    pub company_id: Option<String>,
    /// TODO, IN_PROGRESS, DONE or CANCELLED
    pub status: Option<String>,
    /// CRITICAL, HIGH, MEDIUM or LOW
    pub priority: Option<String>,
    pub assigned_to_id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TaskStatsParams {
    #[param(required = true)]
    pub company_id: Option<String>,
}

/// `stats` always covers every task of the company, whatever the filters.
#[derive(Serialize, ToSchema)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
    pub total: usize,
    pub stats: TaskStats,
}

#[derive(Serialize, ToSchema)]
pub struct TaskStatsResponse {
    pub stats: TaskStats,
}

#[derive(Serialize, ToSchema)]
pub struct TaskResponse {
    pub task: Task,
}

fn parse_filter<T>(trace_id: &str, raw: Option<String>) -> Result<Option<T>, Response>
where
    T: std::str::FromStr<Err = String>,
{
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|msg: String| bad_request(trace_id, &msg)),
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_title(trace_id: &str, title: &str) -> Result<(), Response> {
    if is_blank(title) {
        return Err(bad_request(trace_id, "title is required"));
    }
    if title.trim().chars().count() > MAX_TITLE_CHARS {
        return Err(bad_request(
            trace_id,
            &format!("title must be at most {MAX_TITLE_CHARS} characters"),
        ));
    }
    Ok(())
}

/// Tasks of a company, newest first, with company-wide statistics.
#[utoipa::path(
    get,
    path = "/api/tasks",
    tag = "Tasks",
    security(("bearer_auth" = [])),
    params(TaskListParams),
    responses(
        (status = 200, description = "Tasks and statistics", body = TaskListResponse),
        (status = 400, description = "Bad filter or companyId missing", body = ApiError)
    )
)]
pub async fn list_tasks(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    query: Result<Query<TaskListParams>, QueryRejection>,
) -> ApiResult {
    let params = query_params(&trace_id, query)?;
    let filter = TaskFilter {
        company_id: require_company_id(&trace_id, params.company_id)?,
        status: parse_filter(&trace_id, params.status)?,
        priority: parse_filter(&trace_id, params.priority)?,
        assigned_to_id: blank_to_none(params.assigned_to_id),
    };
    let filtered = filter.status.is_some()
        || filter.priority.is_some()
        || filter.assigned_to_id.is_some();

    let tasks = state
        .store
        .list_tasks(&filter)
        .await
        .map_err(|e| store_error(&trace_id, "Failed to list tasks", e))?;

    let stats = if filtered {
        let all = state
            .store
            .list_tasks(&TaskFilter {
                company_id: filter.company_id.clone(),
                ..Default::default()
            })
            .await
            .map_err(|e| store_error(&trace_id, "Failed to list tasks", e))?;
        compute_task_stats(&all, Utc::now())
    } else {
        compute_task_stats(&tasks, Utc::now())
    };

    Ok(success_response(
        StatusCode::OK,
        &trace_id,
        TaskListResponse {
            total: tasks.len(),
            tasks,
            stats,
        },
    ))
}

#[utoipa::path(
    get,
    path = "/api/tasks/stats",
    tag = "Tasks",
    security(("bearer_auth" = [])),
    params(TaskStatsParams),
    responses(
        (status = 200, description = "Task statistics", body = TaskStatsResponse),
        (status = 400, description = "companyId missing", body = ApiError)
    )
)]
pub async fn task_stats(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    query: Result<Query<TaskStatsParams>, QueryRejection>,
) -> ApiResult {
    let params = query_params(&trace_id, query)?;
    let company_id = require_company_id(&trace_id, params.company_id)?;
    let tasks = state
        .store
        .list_tasks(&TaskFilter {
            company_id,
            ..Default::default()
        })
        .await
        .map_err(|e| store_error(&trace_id, "Failed to list tasks", e))?;
    Ok(success_response(
        StatusCode::OK,
        &trace_id,
        TaskStatsResponse {
            stats: compute_task_stats(&tasks, Utc::now()),
        },
    ))
}

/// Creates a task. Priority and effort default to MEDIUM; without a due
/// date one is derived from the priority.
#[utoipa::path(
    post,
    path = "/api/tasks",
    tag = "Tasks",
    security(("bearer_auth" = [])),
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = TaskResponse),
        (status = 400, description = "Invalid task", body = ApiError),
        (status = 404, description = "Unknown company, assignee or analysis", body = ApiError)
    )
)]
pub async fn create_task(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> ApiResult {
    let req = json_body(&trace_id, payload)?;
    let company_id = require_company_id(&trace_id, Some(req.company_id))?;
    check_title(&trace_id, &req.title)?;

    let priority = req.priority.unwrap_or_default();
    let new_task = NewTask {
        company_id,
        analysis_id: blank_to_none(req.analysis_id),
        title: req.title.trim().to_string(),
        description: blank_to_none(req.description),
        priority,
        effort: req.effort.unwrap_or_default(),
        due_date: Some(
            req.due_date
                .unwrap_or_else(|| default_due_date(priority, Utc::now())),
        ),
        assigned_to_id: blank_to_none(req.assigned_to_id),
    };

    let task = state
        .store
        .create_task(&new_task)
        .await
        .map_err(|e| store_error(&trace_id, "Failed to create task", e))?;
    tracing::info!(
        trace_id = %trace_id.0,
        task_id = %task.id,
        priority = %task.priority,
        "Task created"
    );
    Ok(success_response(
        StatusCode::CREATED,
        &trace_id,
        TaskResponse { task },
    ))
}

/// Partial update. Any status may move to any other; moving to DONE stamps
/// `completedAt`.
#[utoipa::path(
    patch,
    path = "/api/tasks/{id}",
    tag = "Tasks",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Task id")),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Task updated", body = TaskResponse),
        (status = 400, description = "Empty or invalid patch", body = ApiError),
        (status = 404, description = "Unknown task or assignee", body = ApiError)
    )
)]
pub async fn update_task(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> ApiResult {
    let patch = json_body(&trace_id, payload)?;
    if patch.is_empty() {
        return Err(bad_request(&trace_id, "no fields to update"));
    }
    if let Some(title) = &patch.title {
        check_title(&trace_id, title)?;
    }

    let task = state
        .store
        .update_task(&id, &patch, Utc::now())
        .await
        .map_err(|e| store_error(&trace_id, "Failed to update task", e))?
        .ok_or_else(|| not_found(&trace_id, "task not found"))?;
    tracing::info!(
        trace_id = %trace_id.0,
        task_id = %task.id,
        status = %task.status,
        "Task updated"
    );
    Ok(success_response(
        StatusCode::OK,
        &trace_id,
        TaskResponse { task },
    ))
}
