use axum::extract::multipart::MultipartRejection;
use axum::extract::{Extension, Multipart, State};
use axum::http::StatusCode;
use serde::Serialize;
use utoipa::ToSchema;
use vexec_ingest::{parse_file as parse_upload, ParsedFile};

use crate::api::{bad_request, error_response, success_response, ApiError, ApiResult};
use crate::logging::TraceId;
use crate::state::AppState;

pub const FILE_FIELD: &str = "file";

/// Multipart form accepted by `/api/parse-file`.
#[allow(dead_code)]
#[derive(ToSchema)]
struct FileUpload {
    /// CSV, XLSX/XLS/ODS, PDF or plain text
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

#[derive(Serialize, ToSchema)]
pub struct ParseFileResponse {
    pub file: ParsedFile,
}

/// Extracts columns, preview rows and text from an uploaded document.
#[utoipa::path(
    post,
    path = "/api/parse-file",
    tag = "Files",
    security(("bearer_auth" = [])),
    request_body(content = FileUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Parsed file", body = ParseFileResponse),
        (status = 400, description = "Missing, oversized or unreadable file", body = ApiError),
        (status = 500, description = "Parser crashed", body = ApiError)
    )
)]
pub async fn parse_file(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult {
    let mut multipart = multipart.map_err(|e| bad_request(&trace_id, &e.body_text()))?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| error_response(e.status(), &trace_id, &e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("upload")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| error_response(e.status(), &trace_id, &e.body_text()))?;
        upload = Some((file_name, bytes));
        break;
    }

    let Some((file_name, bytes)) = upload else {
        return Err(bad_request(
            &trace_id,
            &format!("multipart field `{FILE_FIELD}` is required"),
        ));
    };

    let max_bytes = state.config.upload.max_file_bytes;
    if bytes.len() > max_bytes {
        return Err(bad_request(
            &trace_id,
            &format!("file exceeds the {max_bytes} byte limit"),
        ));
    }

    let parsed = tokio::task::spawn_blocking(move || parse_upload(&file_name, &bytes))
        .await
        .map_err(|e| {
            tracing::error!(trace_id = %trace_id.0, error = %e, "File parser task failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "file parsing failed",
            )
        })?
        .map_err(|e| {
            tracing::warn!(trace_id = %trace_id.0, error = %e, "Rejected uploaded file");
            bad_request(&trace_id, &e.to_string())
        })?;

    tracing::info!(
        trace_id = %trace_id.0,
        file_name = %parsed.file_name,
        size_bytes = parsed.size_bytes,
        rows = parsed.row_count,
        truncated = parsed.truncated,
        "File parsed"
    );
    Ok(success_response(
        StatusCode::OK,
        &trace_id,
        ParseFileResponse { file: parsed },
    ))
}
