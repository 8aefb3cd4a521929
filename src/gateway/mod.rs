pub mod auth;
pub mod extract;
pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

#[cfg(test)]
mod router_tests;

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::GatewayConfig;
use state::AppState;

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.is_empty() {
        return base.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(origins)
}

/// Assemble every route around `state`
pub fn build_router(state: Arc<AppState>, allowed_origins: &[String]) -> Router {
    // ==========================================================================
    // Protected Routes (JWT when auth is enabled)
    // ==========================================================================
    let protected = Router::new()
        .route("/handover/init", post(handlers::init_handover))
        .route("/handover/process", post(handlers::process_handover))
        .route(
            "/shipments/outstanding/cancel",
            post(handlers::cancel_outstanding),
        )
        .route("/shipments/outstanding", get(handlers::list_outstanding))
        .route(
            "/shipments/{shipment_id}/events",
            get(handlers::shipment_events),
        )
        .route(
            "/shipments/edit/driver-vehicle",
            post(handlers::edit_driver_vehicle),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            auth::jwt_auth_middleware,
        ));

    Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        .nest("/api/v1", protected)
        .with_state(state)
        // stateless, added after with_state
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
        .layer(cors_layer(allowed_origins))
}

/// Serve until `shutdown` resolves, then finish in-flight requests
pub async fn run_server<F>(config: &GatewayConfig, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(Arc::new(state), &config.allowed_origins);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    tracing::info!(%addr, "Gateway listening");
    tracing::info!("API Docs: http://{}/docs", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")?;

    tracing::info!("Gateway stopped");
    Ok(())
}
