use crate::auth::{verify_password, CurrentUser};
use crate::error::{AppError, Result};
use crate::extract::JsonBody;
use crate::routes::AppState;
use crate::user_models::{LoginRequest, TokenResponse};
use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

const INVALID_CREDENTIALS: &str = "Unable to log in with provided credentials.";

pub async fn login(
    State(state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<TokenResponse>> {
    let user = state
        .storage
        .find_user_by_email(&payload.email)
        .await
        .ok_or_else(|| AppError::non_field(INVALID_CREDENTIALS))?;

    if !verify_password(payload.password, user.password_hash.clone()).await? {
        tracing::info!(user_id = user.id, "rejected login attempt");
        return Err(AppError::non_field(INVALID_CREDENTIALS));
    }

    let auth_token = state.storage.issue_token(user.id).await?;
    tracing::info!(user_id = user.id, "token issued");
    Ok(Json(TokenResponse { auth_token }))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> Result<StatusCode> {
    state.storage.revoke_token(&current.token).await?;
    tracing::info!(user_id = current.user.id, "token revoked");
    Ok(StatusCode::NO_CONTENT)
}
