#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Request, StatusCode};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;
use vexec_advisor::{
    Advisor, AdvisorError, GoalBreakdown, GoalBrief, Milestone, ProgressFeedback, ProgressReview,
};
use vexec_server::app;
use vexec_server::config::{SeedUser, ServerConfig};
use vexec_server::seed;
use vexec_server::state::AppState;
use vexec_storage::Store;

pub const ADMIN_EMAIL: &str = "jim@example.com";
pub const ADMIN_PASSWORD: &str = "changeme";
pub const JWT_SECRET: &str = "test-secret";
pub const TOKEN_EXPIRE_SECS: u64 = 3600;

pub struct TestContext {
    pub temp_dir: TempDir,
    pub state: AppState,
    pub app: axum::Router,
}

/// Answers every request with a fixed plan and verdict.
pub struct StubAdvisor;

#[async_trait]
impl Advisor for StubAdvisor {
    fn provider(&self) -> &str {
        "stub"
    }

    fn model_name(&self) -> &str {
        "stub-model"
    }

    async fn breakdown_goal(&self, brief: &GoalBrief) -> Result<GoalBreakdown, AdvisorError> {
        Ok(GoalBreakdown {
            summary: format!("Plan for {}", brief.title),
            milestones: vec![Milestone {
                month: "2026-01".into(),
                target: brief.target.clone(),
                actions: vec!["Raise prices 5%".into()],
            }],
            risks: vec!["Churn".into()],
        })
    }

    async fn review_progress(
        &self,
        review: &ProgressReview,
    ) -> Result<ProgressFeedback, AdvisorError> {
        Ok(ProgressFeedback {
            feedback: format!("{} looks fine for {}", review.goal_title, review.month),
            on_track: true,
        })
    }
}

/// Fails every request, like an unreachable provider.
pub struct FailingAdvisor;

#[async_trait]
impl Advisor for FailingAdvisor {
    fn provider(&self) -> &str {
        "failing"
    }

    fn model_name(&self) -> &str {
        "none"
    }

    async fn breakdown_goal(&self, _brief: &GoalBrief) -> Result<GoalBreakdown, AdvisorError> {
        Err(AdvisorError::EmptyResponse)
    }

    async fn review_progress(
        &self,
        _review: &ProgressReview,
    ) -> Result<ProgressFeedback, AdvisorError> {
        Err(AdvisorError::Api {
            status: 529,
            body: "overloaded".into(),
        })
    }
}

pub async fn build_test_context() -> Result<TestContext> {
    build_test_context_with(None).await
}

pub async fn build_test_context_with(advisor: Option<Arc<dyn Advisor>>) -> Result<TestContext> {
    let temp_dir = tempfile::tempdir()?;

    let mut config = ServerConfig::default();
    config.database.data_dir = temp_dir.path().to_string_lossy().to_string();
    config.auth.jwt_secret = Some(JWT_SECRET.to_string());
    config.auth.token_expire_secs = TOKEN_EXPIRE_SECS;
    config.auth.bcrypt_cost = 4;
    config.auth.users = vec![SeedUser {
        email: ADMIN_EMAIL.to_string(),
        name: "Jim".to_string(),
        role: "admin".to_string(),
        company_id: None,
        password: Some(ADMIN_PASSWORD.to_string()),
        password_hash: None,
    }];

    let store = Arc::new(Store::new(&config.database.connection_url(), temp_dir.path()).await?);
    seed::seed_users(&store, &config.auth).await?;

    let state = AppState {
        store,
        advisor,
        start_time: Utc::now(),
        jwt_secret: Arc::new(JWT_SECRET.to_string()),
        token_expire_secs: TOKEN_EXPIRE_SECS,
        config: Arc::new(config),
    };

    let app = app::build_http_app(state.clone());

    Ok(TestContext {
        temp_dir,
        state,
        app,
    })
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn trace_id(&self) -> Option<String> {
        self.headers
            .get("x-trace-id")
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string())
    }

    pub fn set_cookie(&self) -> Option<String> {
        self.headers
            .get("set-cookie")
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string())
    }
}

pub async fn send(app: &axum::Router, req: Request<Body>) -> TestResponse {
    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value, Option<String>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder = builder.header("Content-Type", "application/json");

    let req_body = body.unwrap_or(Value::Null).to_string();
    let req = builder
        .body(Body::from(req_body))
        .expect("request should build");

    let resp = send(app, req).await;
    let trace_id = resp.trace_id();
    (resp.status, resp.body, trace_id)
}

pub async fn request_no_body(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
) -> (StatusCode, Value, Option<String>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }

    let req = builder.body(Body::empty()).expect("request should build");
    let resp = send(app, req).await;
    let trace_id = resp.trace_id();
    (resp.status, resp.body, trace_id)
}

pub const MULTIPART_BOUNDARY: &str = "vexec-test-boundary";

/// Uploads one file under `field` as `multipart/form-data`.
pub async fn upload_file(
    app: &axum::Router,
    token: &str,
    field: &str,
    file_name: &str,
    content: &[u8],
) -> (StatusCode, Value) {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());

    let req = Request::builder()
        .method("POST")
        .uri("/api/parse-file")
        .header("Authorization", format!("Bearer {token}"))
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request should build");

    let resp = send(app, req).await;
    (resp.status, resp.body)
}

pub async fn login_and_get_token(app: &axum::Router) -> String {
    let (status, body, _) = request_json(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"email": ADMIN_EMAIL, "password": ADMIN_PASSWORD})),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    assert_eq!(body["success"], true);
    body["token"]
        .as_str()
        .expect("token should exist")
        .to_string()
}

pub async fn create_company(app: &axum::Router, token: &str, name: &str) -> String {
    let (status, body, _) = request_json(
        app,
        "POST",
        "/api/companies",
        Some(token),
        Some(json!({"name": name, "industry": "Retail"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create company failed: {body}");
    body["company"]["id"]
        .as_str()
        .expect("company id should exist")
        .to_string()
}

pub fn assert_ok_envelope(body: &Value) {
    assert_eq!(body["success"], true, "expected success envelope: {body}");
    assert!(body["traceId"].is_string(), "traceId missing: {body}");
}

pub fn assert_err_envelope(body: &Value) {
    assert_eq!(body["success"], false, "expected error envelope: {body}");
    assert!(
        body["error"].as_str().is_some_and(|e| !e.is_empty()),
        "error message missing: {body}"
    );
    assert!(body["traceId"].is_string(), "traceId missing: {body}");
}

/// Whole days between now and an RFC 3339 timestamp, rounded.
pub fn days_from_now(timestamp: &Value) -> i64 {
    let at = timestamp
        .as_str()
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .expect("timestamp should be RFC 3339");
    let secs = (at.with_timezone(&Utc) - Utc::now()).num_seconds();
    (secs as f64 / 86_400.0).round() as i64
}
