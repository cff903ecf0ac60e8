use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AuthResponse, Identity, LoginRequest, MessageResponse, RefreshRequest,
            RegisterRequest, TokenPair,
        },
        errors::{AuthError, AuthResult, DenyReason},
        extractors::{AuthUser, CurrentUser, JsonBody},
        repo_types::UserProfile,
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(get_me))
        .route("/auth/profile", get(get_profile))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> AuthResult<(StatusCode, Json<AuthResponse>)> {
    let resp = state.auth.register(payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> AuthResult<Json<AuthResponse>> {
    Ok(Json(state.auth.login(payload).await?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RefreshRequest>,
) -> AuthResult<Json<TokenPair>> {
    if payload.refresh_token.is_empty() {
        return Err(AuthError::AccessDenied(DenyReason::TokenInvalid));
    }
    Ok(Json(state.auth.refresh(&payload.refresh_token).await?))
}

#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> AuthResult<Json<MessageResponse>> {
    state.auth.logout(identity.id).await?;
    Ok(Json(MessageResponse {
        message: "logged out",
    }))
}

pub async fn get_me(AuthUser(identity): AuthUser) -> Json<Identity> {
    Json(identity)
}

pub async fn get_profile(CurrentUser(profile): CurrentUser) -> Json<UserProfile> {
    Json(profile)
}
