use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use vexec_common::types::{LoginRequest, User};
use vexec_storage::auth::verify_password;

use crate::api::{
    bad_request, error_response, is_blank, json_body, store_error, success_response, ApiError,
    ApiResult,
};
use crate::config::AuthConfig;
use crate::logging::TraceId;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub email: String,
    pub iat: u64,
    pub exp: u64,
}

pub fn create_token(
    secret: &str,
    user_id: &str,
    email: &str,
    expire_secs: u64,
) -> anyhow::Result<String> {
    let now = chrono::Utc::now().timestamp() as u64;
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        iat: now,
        exp: now + expire_secs,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

pub fn validate_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn cookie_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn session_cookie(auth: &AuthConfig, value: &str, max_age_secs: u64) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; Path=/; Max-Age={}; SameSite=Lax",
        auth.cookie_name, value, max_age_secs
    );
    if auth.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn with_cookie(mut response: Response, cookie: &str) -> Response {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!(error = %e, "Session cookie is not a valid header value"),
    }
    response
}

fn unauthorized(trace_id: &str, msg: &str) -> Response {
    error_response(StatusCode::UNAUTHORIZED, trace_id, msg)
}

/// Accepts `Authorization: Bearer <jwt>` or the session cookie and stores the
/// decoded [`Claims`] in request extensions.
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let trace_id = req
        .extensions()
        .get::<TraceId>()
        .map(|t| t.0.clone())
        .unwrap_or_default();

    let token = bearer_token(req.headers())
        .or_else(|| cookie_token(req.headers(), &state.config.auth.cookie_name));
    let Some(token) = token else {
        return unauthorized(&trace_id, "authentication required");
    };

    match validate_token(&state.jwt_secret, &token) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) if matches!(e.kind(), jsonwebtoken::errors::ErrorKind::ExpiredSignature) => {
            unauthorized(&trace_id, "token expired")
        }
        Err(_) => unauthorized(&trace_id, "invalid token"),
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    /// Token lifetime in seconds
    pub expires_in: u64,
    pub user: User,
}

#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub user: User,
}

#[derive(Serialize, ToSchema)]
pub struct LogoutResponse {
    pub message: String,
}

/// Runs a bcrypt check off the async runtime. A failed worker thread is a
/// server error, not a credential mismatch.
async fn run_password_check<F>(trace_id: &str, check: F) -> Result<bool, Response>
where
    F: FnOnce() -> bool + Send + 'static,
{
    tokio::task::spawn_blocking(check).await.map_err(|e| {
        tracing::error!(trace_id = %trace_id, error = %e, "Password check task failed");
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            trace_id,
            "internal error",
        )
    })
}

/// Exchanges email and password for a session token. The token is returned
/// in the body and set as an httpOnly cookie.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Email or password missing", body = ApiError),
        (status = 401, description = "Invalid credentials", body = ApiError)
    )
)]
pub async fn login(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult {
    let req = json_body(&trace_id, payload)?;
    if is_blank(&req.email) || req.password.is_empty() {
        return Err(bad_request(&trace_id, "email and password are required"));
    }

    let user = state
        .store
        .get_user_by_email(req.email.trim())
        .await
        .map_err(|e| store_error(&trace_id, "Failed to query user", e))?;
    let Some(user) = user else {
        tracing::warn!(trace_id = %trace_id.0, "Login attempt for unknown email");
        return Err(unauthorized(&trace_id, "invalid credentials"));
    };

    let password = req.password;
    let hash = user.password_hash.clone();
    let matched = run_password_check(&trace_id, move || verify_password(&password, &hash)).await?;
    if !matched {
        tracing::warn!(trace_id = %trace_id.0, user_id = %user.id, "Login failed: wrong password");
        return Err(unauthorized(&trace_id, "invalid credentials"));
    }

    let token = create_token(
        &state.jwt_secret,
        &user.id,
        &user.email,
        state.token_expire_secs,
    )
    .map_err(|e| {
        tracing::error!(trace_id = %trace_id.0, error = %e, "Failed to create token");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, &trace_id, "internal error")
    })?;

    tracing::info!(trace_id = %trace_id.0, user_id = %user.id, "User logged in");
    let cookie = session_cookie(&state.config.auth, &token, state.token_expire_secs);
    let response = success_response(
        StatusCode::OK,
        &trace_id,
        LoginResponse {
            token,
            expires_in: state.token_expire_secs,
            user,
        },
    );
    Ok(with_cookie(response, &cookie))
}

/// Clears the session cookie. Bearer tokens stay valid until they expire.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    responses(
        (status = 200, description = "Logged out", body = LogoutResponse)
    )
)]
pub async fn logout(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> Response {
    let cookie = session_cookie(&state.config.auth, "", 0);
    let response = success_response(
        StatusCode::OK,
        &trace_id,
        LogoutResponse {
            message: "logged out".to_string(),
        },
    );
    with_cookie(response, &cookie)
}

/// The authenticated user.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated", body = ApiError)
    )
)]
pub async fn me(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> ApiResult {
    let user = state
        .store
        .get_user_by_id(&claims.sub)
        .await
        .map_err(|e| store_error(&trace_id, "Failed to load current user", e))?
        .ok_or_else(|| unauthorized(&trace_id, "user no longer exists"))?;
    Ok(success_response(StatusCode::OK, &trace_id, UserResponse { user }))
}
