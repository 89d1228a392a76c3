use crate::config::{AdvisorConfig, ServerConfig};
use crate::state::AppState;
use crate::{api, auth, logging, openapi};
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::middleware;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use vexec_advisor::{Advisor, AnthropicAdvisor, AnthropicConfig};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Virtual Executive API",
        description = "Business analyses, tasks, goals and KPI tracking for small companies",
    ),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Auth", description = "Login and session"),
        (name = "Companies", description = "Tenant companies"),
        (name = "Analyses", description = "Stored analysis results and score trends"),
        (name = "Tasks", description = "Action items and task statistics"),
        (name = "Goals", description = "Goals, milestone breakdowns and monthly progress"),
        (name = "Team", description = "Team members"),
        (name = "Files", description = "Document parsing"),
        (name = "Tracking", description = "KPI tracking")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(utoipa::openapi::security::Http::new(
                utoipa::openapi::security::HttpAuthScheme::Bearer,
            )),
        );
    }
}

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    // Cookies need credentials, which rule out wildcards.
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([header::HeaderName::from_static("x-trace-id")])
        .allow_credentials(true)
}

/// Builds the Anthropic-backed advisor, or `None` when advice is disabled or
/// no API key is available.
pub fn build_advisor(config: &AdvisorConfig) -> Option<Arc<dyn Advisor>> {
    if !config.enabled {
        tracing::info!("Advisor disabled by configuration");
        return None;
    }
    let Some(api_key) = config.resolved_api_key() else {
        tracing::warn!(
            "No advisor API key configured; goals will be saved without breakdowns"
        );
        return None;
    };

    match AnthropicAdvisor::new(AnthropicConfig {
        api_key,
        model: config.model.clone(),
        base_url: config.base_url.clone(),
        timeout_secs: Some(config.timeout_secs),
        max_tokens: Some(config.max_tokens),
        temperature: None,
    }) {
        Ok(advisor) => {
            tracing::info!(
                provider = advisor.provider(),
                model = advisor.model_name(),
                "Advisor ready"
            );
            Some(Arc::new(advisor))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to build advisor client; advice disabled");
            None
        }
    }
}

pub fn build_http_app(state: AppState) -> Router {
    let (public_router, public_spec) = api::public_routes().split_for_parts();
    let (login_router, login_spec) = api::auth_routes().split_for_parts();
    let (protected_router, protected_spec) = api::protected_routes().split_for_parts();

    let mut merged_spec = ApiDoc::openapi();
    merged_spec.merge(public_spec);
    merged_spec.merge(login_spec);
    merged_spec.merge(protected_spec);
    let spec = Arc::new(merged_spec);

    let config: &ServerConfig = &state.config;
    let cors = cors_layer(&config.cors_allowed_origins);
    let body_limit = DefaultBodyLimit::max(config.upload.max_file_bytes + MULTIPART_OVERHEAD);

    public_router
        .merge(login_router)
        .merge(protected_router.layer(middleware::from_fn_with_state(
            state.clone(),
            auth::jwt_auth_middleware,
        )))
        .with_state(state)
        .merge(openapi::json_route(spec))
        .layer(body_limit)
        .layer(cors)
        .layer(middleware::from_fn(logging::request_logging))
}
