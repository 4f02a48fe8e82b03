//! Token authentication: `Authorization: Token <key>`.

use crate::error::AppError;
use crate::routes::AppState;
use crate::user_models::User;
use anyhow::Context;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;

const SCHEME: &str = "token";

/// An authenticated request. Rejects anonymous requests with 401.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

/// The requesting user, if any. A malformed or unknown token is still a 401.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|u| u.id)
    }
}

/// Extracts the key from a `Token` authorization header. Other schemes are ignored.
pub fn token_from_header(value: &str) -> Result<Option<&str>, AppError> {
    let Some((scheme, key)) = value.trim().split_once(' ') else {
        return Ok(None);
    };
    if !scheme.eq_ignore_ascii_case(SCHEME) {
        return Ok(None);
    }
    let key = key.trim();
    if key.is_empty() || key.contains(' ') {
        return Err(AppError::Unauthorized(
            "Invalid token header.".to_string(),
        ));
    }
    Ok(Some(key))
}

async fn authenticate(parts: &Parts, state: &AppState) -> Result<Option<CurrentUser>, AppError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let header = header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid token header.".to_string()))?;
    let Some(key) = token_from_header(header)? else {
        return Ok(None);
    };

    match state.storage.user_by_token(key).await {
        Some(user) => Ok(Some(CurrentUser {
            user,
            token: key.to_string(),
        })),
        None => Err(AppError::Unauthorized("Invalid token.".to_string())),
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state)
            .await?
            .ok_or_else(AppError::not_authenticated)
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let current = authenticate(parts, state).await?;
        Ok(MaybeUser(current.map(|c| c.user)))
    }
}

/// Hashes a password off the async runtime.
pub async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .context("Password hashing task failed")?
        .context("Failed to hash password")?;
    Ok(hash)
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .context("Password verification task failed")?
        .context("Failed to verify password")?;
    Ok(valid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_token_scheme() {
        assert_eq!(token_from_header("Token abc123").unwrap(), Some("abc123"));
        assert_eq!(token_from_header("token   abc123 ").unwrap(), Some("abc123"));
    }

    #[test]
    fn ignores_other_schemes() {
        assert_eq!(token_from_header("Bearer abc").unwrap(), None);
        assert_eq!(token_from_header("Token").unwrap(), None);
    }

    #[test]
    fn rejects_keys_with_spaces() {
        assert!(token_from_header("Token abc def").is_err());
    }

    #[tokio::test]
    async fn hashes_and_verifies() {
        let hash = hash_password("Secret123".to_string(), 4).await.unwrap();
        assert!(verify_password("Secret123".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password("secret123".to_string(), hash).await.unwrap());
    }
}
