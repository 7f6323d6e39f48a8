//! API route configuration.
//!
//! Combines the per-resource routers into the public surface (reachable
//! without a token) and the guarded surface (everything else).

use axum::Router;
use std::sync::Arc;

use crate::core::shared::state::AppState;

/// Routes served without authentication.
pub fn configure_public_routes() -> Router<Arc<AppState>> {
    crate::auth::configure_auth_routes()
}

/// Routes behind the bearer-token middleware.
pub fn configure_api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(crate::auth::configure_session_routes())
        .merge(crate::tickets::configure_tickets_routes())
        .merge(crate::tickets::comments::configure_comments_routes())
        .merge(crate::tickets::messages::configure_messages_routes())
}
