use axum::{
    extract::{Extension, State},
    Json,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{LoginRequest, LoginResponse, User, UserResponse, VerifyResponse},
    state::AppState,
    utils::{jwt::create_access_token, password::verify_password},
};

const INVALID_CREDENTIALS: &str = "Invalid username or password";

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    payload.validate()?;

    let user = state
        .users
        .find_by_username(payload.username.trim())
        .await?
        .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    let matches = verify_password(&payload.password, &user.password_hash)?;
    if !matches {
        tracing::info!(username = %user.username, "Rejected login with wrong password");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let (token, claims) = create_access_token(
        user.id.clone(),
        user.username.clone(),
        user.role.as_str().to_string(),
        &state.config.jwt_secret,
        state.config.jwt_expiration_hours,
    )?;
    tracing::info!(user_id = %user.id, jti = %claims.jti, "User logged in");

    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from(user),
    }))
}

/// Reached only through the auth middleware, so the token is already valid.
pub async fn verify(Extension(user): Extension<User>) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        valid: true,
        user: UserResponse::from(user),
    })
}
