use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;
use vexec_common::types::{Company, CreateCompanyRequest};

use crate::api::pagination::PaginationParams;
use crate::api::{
    bad_request, is_blank, json_body, not_found, query_params, store_error, success_response,
    ApiError, ApiResult,
};
use crate::logging::TraceId;
use crate::state::AppState;

#[derive(Serialize, ToSchema)]
pub struct CompanyListResponse {
    pub companies: Vec<Company>,
    pub total: u64,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Serialize, ToSchema)]
pub struct CompanyResponse {
    pub company: Company,
}

/// Companies ordered by name.
#[utoipa::path(
    get,
    path = "/api/companies",
    tag = "Companies",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "Company page", body = CompanyListResponse),
        (status = 401, description = "Not authenticated", body = ApiError)
    )
)]
pub async fn list_companies(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    query: Result<Query<PaginationParams>, QueryRejection>,
) -> ApiResult {
    let pagination = query_params(&trace_id, query)?;
    let limit = pagination.limit();
    let offset = pagination.offset();
    let companies = state
        .store
        .list_companies(limit, offset)
        .await
        .map_err(|e| store_error(&trace_id, "Failed to list companies", e))?;
    let total = state
        .store
        .count_companies()
        .await
        .map_err(|e| store_error(&trace_id, "Failed to count companies", e))?;

    Ok(success_response(
        StatusCode::OK,
        &trace_id,
        CompanyListResponse {
            companies,
            total,
            limit,
            offset,
        },
    ))
}

#[utoipa::path(
    post,
    path = "/api/companies",
    tag = "Companies",
    security(("bearer_auth" = [])),
    request_body = CreateCompanyRequest,
    responses(
        (status = 201, description = "Company created", body = CompanyResponse),
        (status = 400, description = "Name missing", body = ApiError)
    )
)]
pub async fn create_company(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    payload: Result<Json<CreateCompanyRequest>, JsonRejection>,
) -> ApiResult {
    let req = json_body(&trace_id, payload)?;
    if is_blank(&req.name) {
        return Err(bad_request(&trace_id, "name is required"));
    }

    let company = state
        .store
        .create_company(&req)
        .await
        .map_err(|e| store_error(&trace_id, "Failed to create company", e))?;
    tracing::info!(trace_id = %trace_id.0, company_id = %company.id, "Company created");
    Ok(success_response(
        StatusCode::CREATED,
        &trace_id,
        CompanyResponse { company },
    ))
}

#[utoipa::path(
    get,
    path = "/api/companies/{id}",
    tag = "Companies",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Company id")),
    responses(
        (status = 200, description = "Company", body = CompanyResponse),
        (status = 404, description = "Unknown company", body = ApiError)
    )
)]
pub async fn get_company(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult {
    let company = state
        .store
        .get_company(&id)
        .await
        .map_err(|e| store_error(&trace_id, "Failed to load company", e))?
        .ok_or_else(|| not_found(&trace_id, "company not found"))?;
    Ok(success_response(
        StatusCode::OK,
        &trace_id,
        CompanyResponse { company },
    ))
}
