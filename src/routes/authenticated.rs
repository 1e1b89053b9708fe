use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Every route here sits behind the `auth_middleware` layer applied in `create_router`,
/// and each handler also receives the resolved `AuthUser`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /user/me
        .route("/user/me", get(handlers::current_user))
        // POST /user/logout
        // Deletes the cached session; the token stops working immediately.
        .route("/user/logout", post(handlers::logout))
}
