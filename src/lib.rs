use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use std::sync::Arc;
use std::time::Duration;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core services and their collaborators.
pub mod auth;
pub mod cache;
pub mod config;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod handlers;
pub mod hierarchy;
pub mod models;
pub mod repository;
pub mod token;

// Routing split by access level (Public, Authenticated).
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use auth::AuthService;
pub use cache::{CacheState, MemoryCache};
pub use config::AppConfig;
pub use envelope::{Envelope, Operation};
pub use error::{AppError, AppResult, ConflictKind};
pub use hierarchy::{HierarchyStore, MenuStoreState};
pub use repository::{
    MemoryMenuStore, MemoryUserRepository, PostgresMenuStore, PostgresUserRepository,
    UserRepositoryState,
};

/// ApiDoc
///
/// OpenAPI document for every handler and payload schema, served at `/api-docs/openapi.json`.
/// Each response body shown here travels inside the `{ code, message, data }` envelope.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login, handlers::register, handlers::current_user, handlers::logout,
        handlers::create_menu, handlers::list_menus
    ),
    components(
        schemas(
            models::MenuNode, models::ClosureEdge, models::MenuTree, models::CreateMenuRequest,
            models::LoginRequest, models::LoginResponse, models::RegisterRequest,
            models::RegisterResponse, models::SessionProfile,
        )
    ),
    tags(
        (name = "menu-portal", description = "Authentication and menu hierarchy API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, cheaply cloneable container for every service a handler may need.
#[derive(Clone)]
pub struct AppState {
    /// Auth orchestrator with its credential, token and cache collaborators.
    pub auth: AuthService,
    /// Closure-table menu store.
    pub hierarchy: HierarchyStore,
}

impl AppState {
    /// Wires the production collaborators (Argon2 hashing, HS256 tokens) around the given
    /// datastore and cache handles. The token secret and lifetime come from `config`.
    pub fn new(
        config: &AppConfig,
        menus: MenuStoreState,
        users: UserRepositoryState,
        cache: CacheState,
    ) -> Self {
        let auth = AuthService::new(
            users,
            cache,
            Arc::new(credentials::Argon2Hasher),
            Arc::new(token::JwtIssuer::new(&config.jwt_secret)),
            Duration::from_secs(config.token_ttl_secs),
        );
        Self {
            auth,
            hierarchy: HierarchyStore::new(menus),
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for AuthService {
    fn from_ref(app_state: &AppState) -> AuthService {
        app_state.auth.clone()
    }
}

/// auth_middleware
///
/// Rejects requests to the authenticated routes before the handler runs. The `AuthUser`
/// extractor does the work; its rejection is an enveloped `Unauthenticated` fault.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routes, the scoped auth layer and the global observability layers.
/// Every request gets an `x-request-id`, echoed back on the response and recorded on its span.
pub fn create_router(state: AppState) -> Router {
    let protected = authenticated::authenticated_routes()
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(protected)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(request_span)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER.clone())),
        )
        .layer(
            CorsLayer::new()
                .allow_methods(Any)
                .allow_origin(Any)
                .allow_headers(Any),
        )
}

static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

fn request_span(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        req_id = %request_id,
    )
}
