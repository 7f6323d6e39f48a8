//! HTTP server initialization and routing.

use axum::routing::get;
use axum::Router;
use log::info;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api_router::{configure_api_routes, configure_public_routes};
use crate::core::middleware::authentication_middleware;
use crate::core::shared::state::AppState;

use super::{health_check, shutdown_signal};

pub async fn run_server(app_state: Arc<AppState>) -> std::io::Result<()> {
    let guarded = configure_api_routes().route_layer(axum::middleware::from_fn_with_state(
        Arc::clone(&app_state),
        authentication_middleware,
    ));

    let app = Router::new()
        .route("/health", get(health_check))
        .merge(configure_public_routes())
        .merge(guarded)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::clone(&app_state));

    let host = app_state.config.server.host.clone();
    let port = app_state.config.server.port;
    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    info!("Starting HTTP server on {}:{}", host, port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
}
