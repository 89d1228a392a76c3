use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use vexec_common::types::{CreateTeamMemberRequest, TeamMember};

use crate::api::{
    bad_request, is_blank, json_body, not_found, query_params, require_company_id, store_error,
    success_response, ApiError, ApiResult,
};
use crate::logging::TraceId;
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TeamListParams {
    #[param(required = true)]
    pub company_id: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct TeamListResponse {
    pub members: Vec<TeamMember>,
}

#[derive(Serialize, ToSchema)]
pub struct TeamMemberResponse {
    pub member: TeamMember,
}

#[derive(Serialize, ToSchema)]
pub struct DeleteResponse {
    pub deleted: bool,
}

/// `local@domain.tld`: one `@`, and a dotted domain with no empty labels.
fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

#[utoipa::path(
    get,
    path = "/api/team",
    tag = "Team",
    security(("bearer_auth" = [])),
    params(TeamListParams),
    responses(
        (status = 200, description = "Team members", body = TeamListResponse),
        (status = 400, description = "companyId missing", body = ApiError)
    )
)]
pub async fn list_team(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    query: Result<Query<TeamListParams>, QueryRejection>,
) -> ApiResult {
    let params = query_params(&trace_id, query)?;
    let company_id = require_company_id(&trace_id, params.company_id)?;
    let members = state
        .store
        .list_team_members(&company_id)
        .await
        .map_err(|e| store_error(&trace_id, "Failed to list team members", e))?;
    Ok(success_response(
        StatusCode::OK,
        &trace_id,
        TeamListResponse { members },
    ))
}

#[utoipa::path(
    post,
    path = "/api/team",
    tag = "Team",
    security(("bearer_auth" = [])),
    request_body = CreateTeamMemberRequest,
    responses(
        (status = 201, description = "Member added", body = TeamMemberResponse),
        (status = 400, description = "Name or email missing", body = ApiError),
        (status = 404, description = "Unknown company", body = ApiError)
    )
)]
pub async fn create_team_member(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    payload: Result<Json<CreateTeamMemberRequest>, JsonRejection>,
) -> ApiResult {
    let mut req = json_body(&trace_id, payload)?;
    req.company_id = require_company_id(&trace_id, Some(req.company_id))?;
    if is_blank(&req.name) || is_blank(&req.email) {
        return Err(bad_request(&trace_id, "name and email are required"));
    }
    if !looks_like_email(req.email.trim()) {
        return Err(bad_request(&trace_id, "email is not valid"));
    }

    let member = state
        .store
        .create_team_member(&req)
        .await
        .map_err(|e| store_error(&trace_id, "Failed to add team member", e))?;
    tracing::info!(trace_id = %trace_id.0, member_id = %member.id, "Team member added");
    Ok(success_response(
        StatusCode::CREATED,
        &trace_id,
        TeamMemberResponse { member },
    ))
}

/// Removes a member. Tasks assigned to them become unassigned.
#[utoipa::path(
    delete,
    path = "/api/team/{id}",
    tag = "Team",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Team member id")),
    responses(
        (status = 200, description = "Member removed", body = DeleteResponse),
        (status = 404, description = "Unknown member", body = ApiError)
    )
)]
pub async fn delete_team_member(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult {
    let deleted = state
        .store
        .delete_team_member(&id)
        .await
        .map_err(|e| store_error(&trace_id, "Failed to delete team member", e))?;
    if !deleted {
        return Err(not_found(&trace_id, "team member not found"));
    }
    tracing::info!(trace_id = %trace_id.0, member_id = %id, "Team member removed");
    Ok(success_response(
        StatusCode::OK,
        &trace_id,
        DeleteResponse { deleted },
    ))
}
