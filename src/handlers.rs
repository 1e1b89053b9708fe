use crate::{
    AppState,
    auth::AuthUser,
    envelope::{Envelope, Operation, normalize},
    error::{AppError, AppResult},
    models::{
        CreateMenuRequest, LoginRequest, LoginResponse, MenuTree, RegisterRequest,
        RegisterResponse, SessionProfile,
    },
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde_json::Value;

/// Request bodies that fail to parse are validation faults like any other bad input.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

// --- Handlers ---

/// login
///
/// [Public Route] Exchanges username and password for a session token.
#[utoipa::path(
    post,
    path = "/user/login",
    request_body = LoginRequest,
    responses((status = 200, description = "Envelope with { username, token }", body = LoginResponse))
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Envelope<Value> {
    let outcome = match json_body(payload) {
        Ok(req) => state.auth.login(req).await,
        Err(err) => Err(err),
    };
    normalize(Operation::Login, outcome)
}

/// register
///
/// [Public Route] Creates a credential record.
#[utoipa::path(
    post,
    path = "/user/register",
    request_body = RegisterRequest,
    responses((status = 200, description = "Envelope with { username }", body = RegisterResponse))
)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Envelope<Value> {
    let outcome = match json_body(payload) {
        Ok(req) => state.auth.register(req).await,
        Err(err) => Err(err),
    };
    normalize(Operation::Register, outcome)
}

/// current_user
///
/// [Authenticated Route] Identity behind the presented token.
#[utoipa::path(
    get,
    path = "/user/me",
    responses((status = 200, description = "Envelope with the session profile", body = SessionProfile))
)]
pub async fn current_user(AuthUser { id, username }: AuthUser) -> Envelope<Value> {
    normalize(
        Operation::CurrentUser,
        Ok::<_, AppError>(SessionProfile { id, username }),
    )
}

/// logout
///
/// [Authenticated Route] Revokes the caller's cached session.
#[utoipa::path(
    post,
    path = "/user/logout",
    responses((status = 200, description = "Envelope with a confirmation string", body = String))
)]
pub async fn logout(user: AuthUser, State(state): State<AppState>) -> Envelope<Value> {
    let outcome = state.auth.logout(&user.username).await;
    normalize(Operation::Logout, outcome)
}

/// create_menu
///
/// [Public Route] Inserts a menu node and its closure edges in one transaction.
#[utoipa::path(
    post,
    path = "/menu/create",
    request_body = CreateMenuRequest,
    responses((status = 200, description = "Envelope with a confirmation string", body = String))
)]
pub async fn create_menu(
    State(state): State<AppState>,
    payload: Result<Json<CreateMenuRequest>, JsonRejection>,
) -> Envelope<Value> {
    let outcome = match json_body(payload) {
        Ok(req) => state.hierarchy.insert(req).await,
        Err(err) => Err(err),
    };
    normalize(Operation::CreateMenu, outcome)
}

/// list_menus
///
/// [Public Route] The whole menu forest, roots first, children nested.
#[utoipa::path(
    get,
    path = "/menu/list",
    responses((status = 200, description = "Envelope with the menu forest", body = [MenuTree]))
)]
pub async fn list_menus(State(state): State<AppState>) -> Envelope<Value> {
    let outcome = state.hierarchy.list_all().await;
    normalize(Operation::ListMenus, outcome)
}
