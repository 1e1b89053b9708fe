use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session: health, credential exchange and the menu API.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers. Not wrapped in an envelope.
        .route("/health", get(|| async { "ok" }))
        // POST /user/login
        // Verifies credentials, issues a token and caches it as the user's session.
        .route("/user/login", post(handlers::login))
        // POST /user/register
        .route("/user/register", post(handlers::register))
        // POST /menu/create
        // Inserts one node; the closure table is extended in the same transaction.
        .route("/menu/create", post(handlers::create_menu))
        // GET /menu/list
        // Rebuilds the full tree from the node and closure tables.
        .route("/menu/list", get(handlers::list_menus))
}
