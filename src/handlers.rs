//! Account HTTP Handlers
//!
//! REST API endpoints for registration, login and the profile.

use crate::error::AuthError;
use crate::extractors::{BearerToken, JsonBody};
use crate::models::*;
use crate::service::AccountService;

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Shared account service state
pub type AccountState = Arc<AccountService>;

// ============================================
// Route Builder
// ============================================

/// Create the service router
pub fn create_routes(accounts: Arc<AccountService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let api = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/profile", get(get_profile).put(update_profile));

    Router::new()
        .nest("/api", api)
        .route("/health", get(health))
        .with_state(accounts)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// ============================================
// Registration / Login
// ============================================

/// POST /api/auth/register
pub async fn register(
    State(accounts): State<AccountState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let session = accounts.register(req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::session(session))))
}

/// POST /api/auth/login
pub async fn login(
    State(accounts): State<AccountState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<ApiResponse>, AuthError> {
    let session = accounts.login(req).await?;
    Ok(Json(ApiResponse::session(session)))
}

// ============================================
// Profile
// ============================================

/// GET /api/auth/profile
pub async fn get_profile(
    State(accounts): State<AccountState>,
    BearerToken(token): BearerToken,
) -> Result<Json<ApiResponse>, AuthError> {
    let user = accounts.get_profile(&token).await?;
    Ok(Json(ApiResponse::user(user)))
}

/// PUT /api/auth/profile
pub async fn update_profile(
    State(accounts): State<AccountState>,
    BearerToken(token): BearerToken,
    JsonBody(req): JsonBody<UpdateProfileRequest>,
) -> Result<Json<ApiResponse>, AuthError> {
    let user = accounts.update_profile(&token, req).await?;
    Ok(Json(ApiResponse::user(user)))
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
