//! HTTP surface for the resolver

use crate::api::errors::{ResolverError, Result};
use crate::registry::{self, RegistryGateway};
use crate::resolver::Resolver;
use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Reserved address that skips the registry and resolves the sentinel hash
/// directly, so a deployment can be exercised without an on-chain
/// registration.
pub const TEST_SENTINEL: &str = "test";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RegistryGateway>,
    pub resolver: Arc<Resolver>,
}

// API Router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // The one real endpoint; the method fallback catches non-GET verbs
        // on matched paths, the router fallback everything else.
        .route("/:address", get(resolve_agent).fallback(not_found))
        .fallback(not_found)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET])
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn resolve_agent(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Response> {
    let hash = if address == TEST_SENTINEL {
        TEST_SENTINEL.to_string()
    } else {
        let locator = state.registry.resolve_locator(&address).await?;
        registry::hash_from_locator(&locator).to_string()
    };
    let bytes = state.resolver.resolve(&hash).await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        bytes,
    )
        .into_response())
}

async fn not_found(method: Method, uri: Uri) -> Response {
    ResolverError::not_found(format!("{} {} not found", method, uri.path())).into_response()
}

// Server startup
pub async fn start_server(port: u16, state: AppState) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    log::info!("resolver listening on http://{}", addr);
    log::info!("  GET /:address - resolve an agent's interface descriptor");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
