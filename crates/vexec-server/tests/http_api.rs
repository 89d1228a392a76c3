mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use serde_json::{json, Value};
use std::sync::Arc;

#[tokio::test]
async fn health_is_public_and_echoes_trace_id() {
    let ctx = build_test_context().await.expect("context should build");
    let (status, body, trace_id) = request_no_body(&ctx.app, "GET", "/api/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);
    assert_eq!(body["database"], "ok");
    assert!(body["advisor"].is_null());
    let trace_id = trace_id.expect("X-Trace-Id header should be set");
    assert_eq!(trace_id.len(), 16);
    assert_eq!(body["traceId"], trace_id.as_str());
}

#[tokio::test]
async fn protected_routes_reject_missing_or_bad_tokens() {
    let ctx = build_test_context().await.expect("context should build");

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/api/companies", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_err_envelope(&body);

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/api/companies", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid token");
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let ctx = build_test_context().await.expect("context should build");

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"email": "", "password": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body);

    for (email, password) in [
        (ADMIN_EMAIL, "wrong"),
        ("nobody@example.com", ADMIN_PASSWORD),
    ] {
        let (status, body, _) = request_json(
            &ctx.app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": email, "password": password})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid credentials");
    }
}

#[tokio::test]
async fn login_issues_token_and_cookie() {
    let ctx = build_test_context().await.expect("context should build");

    let req = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header("Content-Type", "application/json")
        .body(Body::from(
            json!({"email": "JIM@example.com", "password": ADMIN_PASSWORD}).to_string(),
        ))
        .unwrap();
    let resp = send(&ctx.app, req).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_ok_envelope(&resp.body);
    assert_eq!(resp.body["expiresIn"], TOKEN_EXPIRE_SECS);
    assert_eq!(resp.body["user"]["email"], ADMIN_EMAIL);
    assert!(resp.body["user"].get("passwordHash").is_none());
    let token = resp.body["token"].as_str().unwrap().to_string();

    let cookie = resp.set_cookie().expect("login should set a cookie");
    assert!(cookie.starts_with(&format!("vexec_token={token}")));
    assert!(cookie.contains("HttpOnly"));

    // the cookie alone authenticates
    let req = Request::builder()
        .uri("/api/auth/me")
        .header("Cookie", format!("vexec_token={token}"))
        .body(Body::empty())
        .unwrap();
    let me = send(&ctx.app, req).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["user"]["name"], "Jim");

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/api/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], ADMIN_EMAIL);

    let req = Request::builder()
        .method("POST")
        .uri("/api/auth/logout")
        .body(Body::empty())
        .unwrap();
    let logout = send(&ctx.app, req).await;
    assert_eq!(logout.status, StatusCode::OK);
    assert!(logout.set_cookie().unwrap().contains("Max-Age=0"));
}

#[tokio::test]
async fn companies_create_get_and_list() {
    let ctx = build_test_context().await.expect("context should build");
    let token = login_and_get_token(&ctx.app).await;

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/companies",
        Some(&token),
        Some(json!({"name": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body);

    let id = create_company(&ctx.app, &token, "Acme Bakery").await;
    create_company(&ctx.app, &token, "Zeta Tools").await;

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", &format!("/api/companies/{id}"), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["company"]["name"], "Acme Bakery");
    assert_eq!(body["company"]["industry"], "Retail");

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/api/companies/404404", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_err_envelope(&body);

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/api/companies?limit=1", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["limit"], 1);
    assert_eq!(body["companies"].as_array().unwrap().len(), 1);

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/api/companies?limit=abc", Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body);
}

#[tokio::test]
async fn task_creation_applies_defaults() {
    let ctx = build_test_context().await.expect("context should build");
    let token = login_and_get_token(&ctx.app).await;
    let company_id = create_company(&ctx.app, &token, "Acme").await;

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/tasks",
        Some(&token),
        Some(json!({"companyId": company_id, "title": "Update price list"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ok_envelope(&body);
    let task = &body["task"];
    assert_eq!(task["priority"], "MEDIUM");
    assert_eq!(task["effort"], "MEDIUM");
    assert_eq!(task["status"], "TODO");
    assert_eq!(days_from_now(&task["dueDate"]), 14);

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/tasks",
        Some(&token),
        Some(json!({"companyId": company_id, "title": "Fix cash leak", "priority": "HIGH"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["task"]["priority"], "HIGH");
    assert_eq!(days_from_now(&body["task"]["dueDate"]), 7);

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/tasks",
        Some(&token),
        Some(json!({"companyId": "999", "title": "Orphan"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_err_envelope(&body);

    let (status, _, _) = request_json(
        &ctx.app,
        "POST",
        "/api/tasks",
        Some(&token),
        Some(json!({"companyId": company_id, "title": " "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/tasks",
        Some(&token),
        Some(json!({"companyId": company_id, "title": "Bad", "priority": "URGENT"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body);
}

#[tokio::test]
async fn analysis_output_becomes_tasks() {
    let ctx = build_test_context().await.expect("context should build");
    let token = login_and_get_token(&ctx.app).await;
    let company_id = create_company(&ctx.app, &token, "Acme").await;

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/analyses",
        Some(&token),
        Some(json!({
            "companyId": company_id,
            "module": "finance",
            "functionName": "cash_flow",
            "title": "Cash flow review",
            "inputData": {"revenue": 12000},
            "outputData": {
                "actionItems": [
                    "Renegotiate supplier contracts",
                    "Chase overdue invoices",
                    "Review menu pricing",
                    "Critical: plug the delivery fee leak"
                ],
                "recommendations": [
                    {"title": "Hire a part-time bookkeeper", "description": "10 hours a week"}
                ]
            },
            "healthScore": 62,
            "score": 71.5
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let analysis_id = body["analysis"]["id"].as_str().unwrap().to_string();
    let tasks = body["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 5);

    let expected = [
        ("Renegotiate supplier contracts", "HIGH", 7),
        ("Chase overdue invoices", "HIGH", 7),
        ("Review menu pricing", "MEDIUM", 14),
        ("Critical: plug the delivery fee leak", "HIGH", 7),
        ("Hire a part-time bookkeeper", "MEDIUM", 14),
    ];
    for (title, priority, days) in expected {
        let task = tasks
            .iter()
            .find(|t| t["title"] == title)
            .unwrap_or_else(|| panic!("missing task {title}"));
        assert_eq!(task["priority"], priority, "{title}");
        assert_eq!(days_from_now(&task["dueDate"]), days, "{title}");
        assert_eq!(task["analysisId"], analysis_id.as_str());
    }
    let bookkeeper = tasks
        .iter()
        .find(|t| t["title"] == "Hire a part-time bookkeeper")
        .unwrap();
    assert_eq!(bookkeeper["description"], "10 hours a week");

    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/api/analyses/{analysis_id}"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["analysis"]["healthScore"], 62);
    assert_eq!(body["tasks"].as_array().unwrap().len(), 5);

    // opting out of task generation
    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/analyses",
        Some(&token),
        Some(json!({
            "companyId": company_id,
            "module": "operations",
            "functionName": "staffing",
            "title": "Staffing review",
            "outputData": {"actionItems": ["Cross-train staff"]},
            "generateTasks": false
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["tasks"].as_array().unwrap().is_empty());

    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/api/analyses?companyId={company_id}&module=finance"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/api/analyses/trends?companyId={company_id}&days=7"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["days"], 7);
    assert_eq!(body["summary"]["total"], 2);
    assert_eq!(body["summary"]["byModule"]["finance"], 1);
    assert_eq!(body["summary"]["latestHealthScore"], 62);
    assert_eq!(body["trend"].as_array().unwrap().len(), 2);

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/api/analyses", Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "companyId is required");
}

#[tokio::test]
async fn analysis_for_unknown_company_is_404() {
    let ctx = build_test_context().await.expect("context should build");
    let token = login_and_get_token(&ctx.app).await;

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/analyses",
        Some(&token),
        Some(json!({
            "companyId": "123",
            "module": "finance",
            "functionName": "cash_flow",
            "title": "Ghost"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_err_envelope(&body);
}

async fn post_task(
    app: &axum::Router,
    token: &str,
    company_id: &str,
    title: &str,
    priority: &str,
) -> String {
    let (status, body, _) = request_json(
        app,
        "POST",
        "/api/tasks",
        Some(token),
        Some(json!({"companyId": company_id, "title": title, "priority": priority})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["task"]["id"].as_str().unwrap().to_string()
}

fn sum_counts(map: &Value) -> u64 {
    map.as_object()
        .unwrap()
        .values()
        .map(|v| v.as_u64().unwrap())
        .sum()
}

#[tokio::test]
async fn task_stats_and_updates() {
    let ctx = build_test_context().await.expect("context should build");
    let token = login_and_get_token(&ctx.app).await;
    let company_id = create_company(&ctx.app, &token, "Acme").await;

    let first = post_task(&ctx.app, &token, &company_id, "Call the bank", "CRITICAL").await;
    post_task(&ctx.app, &token, &company_id, "Order stock", "LOW").await;
    post_task(&ctx.app, &token, &company_id, "Post on social", "MEDIUM").await;
    let fourth = post_task(&ctx.app, &token, &company_id, "Count inventory", "HIGH").await;

    let (status, body, _) = request_json(
        &ctx.app,
        "PATCH",
        &format!("/api/tasks/{first}"),
        Some(&token),
        Some(json!({"status": "DONE", "completionNote": "Loan approved"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"]["status"], "DONE");
    assert!(body["task"]["completedAt"].is_string());

    let (status, body, _) = request_json(
        &ctx.app,
        "PATCH",
        &format!("/api/tasks/{fourth}"),
        Some(&token),
        Some(json!({"status": "CANCELLED"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"]["status"], "CANCELLED");

    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/api/tasks?companyId={company_id}"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 4);
    let stats = &body["stats"];
    assert_eq!(stats["total"], 4);
    assert_eq!(sum_counts(&stats["byStatus"]), 4);
    assert_eq!(sum_counts(&stats["byPriority"]), 4);
    assert_eq!(stats["completed"], 1);
    assert_eq!(stats["completionRate"].as_f64(), Some(25.0));

    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/api/tasks?companyId={company_id}&status=done"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["stats"]["total"], 4);

    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/api/tasks?companyId={company_id}&status=STUCK"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body);

    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/api/tasks/stats?companyId={company_id}"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["total"], 4);

    let (status, _, _) = request_json(
        &ctx.app,
        "PATCH",
        &format!("/api/tasks/{first}"),
        Some(&token),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = request_json(
        &ctx.app,
        "PATCH",
        "/api/tasks/424242",
        Some(&token),
        Some(json!({"status": "TODO"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_company_has_zero_completion_rate() {
    let ctx = build_test_context().await.expect("context should build");
    let token = login_and_get_token(&ctx.app).await;
    let company_id = create_company(&ctx.app, &token, "Quiet Co").await;

    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/api/tasks/stats?companyId={company_id}"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["total"], 0);
    assert_eq!(body["stats"]["completionRate"].as_f64(), Some(0.0));
}

#[tokio::test]
async fn goals_use_advisor_breakdown_and_feedback() {
    let ctx = build_test_context_with(Some(Arc::new(StubAdvisor)))
        .await
        .expect("context should build");
    let token = login_and_get_token(&ctx.app).await;
    let company_id = create_company(&ctx.app, &token, "Acme").await;

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/goals",
        Some(&token),
        Some(json!({
            "companyId": company_id,
            "title": "Grow revenue",
            "target": "$20k MRR",
            "deadline": "2026-12-31"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["breakdownGenerated"], true);
    let goal = &body["goal"];
    assert_eq!(goal["status"], "ACTIVE");
    assert_eq!(goal["breakdown"]["summary"], "Plan for Grow revenue");
    assert_eq!(goal["breakdown"]["milestones"][0]["target"], "$20k MRR");
    let goal_id = goal["id"].as_str().unwrap().to_string();

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        &format!("/api/goals/{goal_id}/progress"),
        Some(&token),
        Some(json!({"month": "2026-01", "actualData": {"mrr": 15000}})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["feedbackGenerated"], true);
    assert_eq!(body["progress"]["jimFeedback"], "Grow revenue looks fine for 2026-01");
    assert_eq!(body["progress"]["onTrack"], true);

    let (status, _, _) = request_json(
        &ctx.app,
        "POST",
        &format!("/api/goals/{goal_id}/progress"),
        Some(&token),
        Some(json!({"month": "January", "actualData": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = request_json(
        &ctx.app,
        "POST",
        "/api/goals/31337/progress",
        Some(&token),
        Some(json!({"month": "2026-01", "actualData": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body, _) = request_json(
        &ctx.app,
        "PATCH",
        &format!("/api/goals/{goal_id}"),
        Some(&token),
        Some(json!({"status": "ACHIEVED"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["goal"]["status"], "ACHIEVED");

    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/api/goals?companyId={company_id}"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let goals = body["goals"].as_array().unwrap();
    assert_eq!(goals.len(), 1);
    assert_eq!(goals[0]["title"], "Grow revenue");
    assert_eq!(goals[0]["progress"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn goals_are_saved_when_advisor_fails() {
    let ctx = build_test_context_with(Some(Arc::new(FailingAdvisor)))
        .await
        .expect("context should build");
    let token = login_and_get_token(&ctx.app).await;
    let company_id = create_company(&ctx.app, &token, "Acme").await;

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/goals",
        Some(&token),
        Some(json!({"companyId": company_id, "title": "Open second shop", "target": "By Q4"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["breakdownGenerated"], false);
    assert!(body["goal"]["breakdown"].is_null());
    let goal_id = body["goal"]["id"].as_str().unwrap().to_string();

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        &format!("/api/goals/{goal_id}/progress"),
        Some(&token),
        Some(json!({"month": "2026-02", "actualData": {"leasesViewed": 3}})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["feedbackGenerated"], false);
    assert!(body["progress"]["jimFeedback"].is_null());
    assert!(body["progress"]["onTrack"].is_null());
    assert_eq!(body["progress"]["actualData"]["leasesViewed"], 3);

    let (status, _, _) = request_json(
        &ctx.app,
        "POST",
        "/api/goals",
        Some(&token),
        Some(json!({"companyId": "777", "title": "Ghost", "target": "None"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_team_member_unassigns_tasks() {
    let ctx = build_test_context().await.expect("context should build");
    let token = login_and_get_token(&ctx.app).await;
    let company_id = create_company(&ctx.app, &token, "Acme").await;

    let (status, _, _) = request_json(
        &ctx.app,
        "POST",
        "/api/team",
        Some(&token),
        Some(json!({"companyId": company_id, "name": "", "email": "pat@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/team",
        Some(&token),
        Some(json!({"companyId": company_id, "name": "Pat", "email": "pat@localhost"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body);

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/team",
        Some(&token),
        Some(json!({"companyId": company_id, "name": "Pat", "email": "pat@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["member"]["role"], "member");
    let member_id = body["member"]["id"].as_str().unwrap().to_string();

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/tasks",
        Some(&token),
        Some(json!({"companyId": company_id, "title": "Deep clean", "assignedToId": member_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["task"]["assignedToId"], member_id.as_str());

    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/api/tasks?companyId={company_id}&assignedToId={member_id}"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let (status, body, _) = request_no_body(
        &ctx.app,
        "DELETE",
        &format!("/api/team/{member_id}"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (status, _, _) = request_no_body(
        &ctx.app,
        "DELETE",
        &format!("/api/team/{member_id}"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/api/tasks?companyId={company_id}"),
        Some(&token),
    )
    .await;
    assert!(body["tasks"][0]["assignedToId"].is_null());

    let (_, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/api/team?companyId={company_id}"),
        Some(&token),
    )
    .await;
    assert!(body["members"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn parse_file_extracts_and_caps_text() {
    let ctx = build_test_context().await.expect("context should build");
    let token = login_and_get_token(&ctx.app).await;

    let csv = b"month,revenue,cost\n2025-01,1200,800\n2025-02,1300,820\n";
    let (status, body) = upload_file(&ctx.app, &token, "file", "pnl.csv", csv).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_ok_envelope(&body);
    assert_eq!(body["file"]["format"], "csv");
    assert_eq!(body["file"]["columns"], json!(["month", "revenue", "cost"]));
    assert_eq!(body["file"]["rowCount"], 2);
    assert_eq!(body["file"]["preview"][1]["revenue"], 1300);

    let big = "x".repeat(60_000);
    let (status, body) = upload_file(&ctx.app, &token, "file", "notes.txt", big.as_bytes()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["file"]["truncated"], true);
    assert_eq!(
        body["file"]["extractedText"].as_str().unwrap().chars().count(),
        50_000
    );
    assert_eq!(body["file"]["sizeBytes"], 60_000);

    let (status, body) = upload_file(&ctx.app, &token, "file", "logo.png", b"\x89PNG").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unsupported file type: .png");

    let (status, body) = upload_file(&ctx.app, &token, "attachment", "pnl.csv", csv).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body);
}

#[tokio::test]
async fn tracking_records_and_summarises_kpis() {
    let ctx = build_test_context().await.expect("context should build");
    let token = login_and_get_token(&ctx.app).await;
    let company_id = create_company(&ctx.app, &token, "Acme").await;

    for (value, recorded_at) in [
        (100.0, "2025-05-01T00:00:00Z"),
        (125.0, "2025-06-01T00:00:00Z"),
    ] {
        let (status, body, _) = request_json(
            &ctx.app,
            "POST",
            "/api/tracking",
            Some(&token),
            Some(json!({
                "companyId": company_id,
                "metric": "revenue",
                "value": value,
                "recordedAt": recorded_at
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    let (status, _, _) = request_json(
        &ctx.app,
        "POST",
        "/api/tracking",
        Some(&token),
        Some(json!({"companyId": company_id, "metric": " ", "value": 1.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/api/tracking?companyId={company_id}"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["value"].as_f64(), Some(125.0));
    let summary = &body["summary"][0];
    assert_eq!(summary["metric"], "revenue");
    assert_eq!(summary["previous"].as_f64(), Some(100.0));
    assert_eq!(summary["changePct"].as_f64(), Some(25.0));
}

#[tokio::test]
async fn tasks_reject_references_outside_their_company() {
    let ctx = build_test_context().await.expect("context should build");
    let token = login_and_get_token(&ctx.app).await;
    let acme = create_company(&ctx.app, &token, "Acme").await;
    let other = create_company(&ctx.app, &token, "Other").await;

    let (_, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/team",
        Some(&token),
        Some(json!({"companyId": other, "name": "Sam", "email": "sam@other.com"})),
    )
    .await;
    let outsider = body["member"]["id"].as_str().unwrap().to_string();

    let (_, body, _) = request_json(
        &ctx.app,
        "POST",
        "/api/analyses",
        Some(&token),
        Some(json!({
            "companyId": other,
            "module": "finance",
            "functionName": "cash_flow",
            "title": "Other's review",
            "generateTasks": false
        })),
    )
    .await;
    let foreign_analysis = body["analysis"]["id"].as_str().unwrap().to_string();

    for payload in [
        json!({"companyId": acme, "title": "Borrowed", "assignedToId": outsider}),
        json!({"companyId": acme, "title": "Borrowed", "analysisId": foreign_analysis}),
        json!({"companyId": acme, "title": "Ghost", "assignedToId": "does-not-exist"}),
    ] {
        let (status, body, _) =
            request_json(&ctx.app, "POST", "/api/tasks", Some(&token), Some(payload)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{body}");
        assert_err_envelope(&body);
    }

    let task_id = post_task(&ctx.app, &token, &acme, "Plain", "LOW").await;
    let (status, _, _) = request_json(
        &ctx.app,
        "PATCH",
        &format!("/api/tasks/{task_id}"),
        Some(&token),
        Some(json!({"assignedToId": outsider})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body, _) = request_json(
        &ctx.app,
        "PATCH",
        &format!("/api/tasks/{task_id}"),
        Some(&token),
        Some(json!({"assignedToId": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["task"]["assignedToId"].is_null());

    let (_, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/api/tasks?companyId={acme}"),
        Some(&token),
    )
    .await;
    assert_eq!(body["total"], 1);
}
