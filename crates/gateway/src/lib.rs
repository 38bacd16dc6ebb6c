//! HTTP API gateway for pmassist.
//!
//! Exposes the chat pipeline under `/api/chat` and a `/health` check.
//! Authentication happens upstream; this layer only trusts the
//! `X-Tenant-Id` / `X-User-Id` headers the authenticating proxy sets.
//!
//! Built on Axum.

pub mod chat;
pub mod error;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{Json, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use pmassist_assistant::QueryOrchestrator;
use pmassist_config::AppConfig;
use pmassist_core::ids::{TenantId, UserId};
use pmassist_core::model::Principal;

pub const TENANT_HEADER: &str = "X-Tenant-Id";
pub const USER_HEADER: &str = "X-User-Id";

/// Request bodies larger than this are rejected.
const BODY_LIMIT: usize = 64 * 1024;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub orchestrator: QueryOrchestrator,
}

pub type SharedState = Arc<GatewayState>;

/// Build the full router.
///
/// Layers applied:
/// - principal extraction on every `/api/chat` route (401 when missing)
/// - CORS
/// - request body size limit (64 KiB)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let chat = chat::chat_router(state.clone()).layer(middleware::from_fn(principal_middleware));

    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
        .nest("/api/chat", chat)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Open storage, pick a generator, and serve until the process exits.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let storage = pmassist_store::open(&config.storage).await?;
    let generator = pmassist_providers::build_from_config(&config.generation);
    let orchestrator = QueryOrchestrator::from_config(storage, generator, &config);

    info!(
        storage = %orchestrator.storage().name(),
        generator = %orchestrator.generator_name(),
        "Chat pipeline ready"
    );

    let app = build_router(Arc::new(GatewayState { orchestrator }));

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Principal ---

fn header_id<T: FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Resolve the caller from the upstream identity headers and attach it to
/// the request as a [`Principal`] extension.
async fn principal_middleware(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let tenant = header_id::<TenantId>(req.headers(), TENANT_HEADER);
    let user = header_id::<UserId>(req.headers(), USER_HEADER);

    match (tenant, user) {
        (Some(tenant_id), Some(user_id)) => {
            req.extensions_mut()
                .insert(Principal::new(tenant_id, user_id));
            Ok(next.run(req).await)
        }
        _ => {
            warn!(path = %req.uri().path(), "Rejected request without a valid principal");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

// --- Handlers ---

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub storage: String,
    pub generator: String,
}

async fn health_handler(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    let storage = state.orchestrator.storage();
    let healthy = match storage.health_check().await {
        Ok(ok) => ok,
        Err(e) => {
            warn!(error = %e, "Storage health check failed");
            false
        }
    };
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthResponse {
            status: if healthy { "ok" } else { "degraded" }.into(),
            version: env!("CARGO_PKG_VERSION").into(),
            storage: storage.name().into(),
            generator: state.orchestrator.generator_name().into(),
        }),
    )
}
