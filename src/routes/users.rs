use crate::auth::{hash_password, verify_password, CurrentUser, MaybeUser};
use crate::error::{AppError, FieldErrors, Result};
use crate::extract::{JsonBody, QueryParams};
use crate::images::AVATARS_FOLDER;
use crate::pagination::{Page, PageParams};
use crate::routes::AppState;
use crate::user_models::{
    AvatarRequest, AvatarResponse, CreateUserRequest, CreateUserResponse, RecipesLimit,
    SetPasswordRequest, SubscriptionResponse, UserResponse,
};
use crate::validation;
use axum::{
    extract::{OriginalUri, Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    viewer: MaybeUser,
    OriginalUri(uri): OriginalUri,
    QueryParams(page): QueryParams<PageParams>,
) -> Json<Page<UserResponse>> {
    let window = page.window(state.settings.page_size);
    let (count, results) = state.storage.list_users(viewer.id(), window).await;
    Json(Page::new(
        count,
        results,
        window,
        &state.settings.public_url,
        &uri,
    ))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreateUserResponse>)> {
    let mut new_user = payload.validate()?;
    let password = std::mem::take(&mut new_user.password);
    let password_hash = hash_password(password, state.settings.bcrypt_cost).await?;
    let user = state.storage.create_user(new_user, password_hash).await?;
    Ok((StatusCode::CREATED, Json(CreateUserResponse::from(&user))))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    viewer: MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>> {
    Ok(Json(state.storage.get_user(id, viewer.id()).await?))
}

pub async fn me(current: CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::new(&current.user, false))
}

pub async fn set_avatar(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    JsonBody(payload): JsonBody<AvatarRequest>,
) -> Result<Json<AvatarResponse>> {
    let data = payload
        .avatar
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::field("avatar", "This field is required."))?;
    let url = state
        .media
        .save_data_url(AVATARS_FOLDER, "avatar", &data)
        .await?;

    match state.storage.set_avatar(current.user.id, Some(url.clone())).await {
        Ok(previous) => {
            if let Some(old) = previous {
                state.media.remove(&old).await;
            }
            Ok(Json(AvatarResponse { avatar: Some(url) }))
        }
        Err(e) => {
            state.media.remove(&url).await;
            Err(e)
        }
    }
}

pub async fn delete_avatar(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> Result<StatusCode> {
    if let Some(old) = state.storage.set_avatar(current.user.id, None).await? {
        state.media.remove(&old).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_password(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    JsonBody(payload): JsonBody<SetPasswordRequest>,
) -> Result<StatusCode> {
    let mut errors = FieldErrors::new();
    validation::check_password(&mut errors, "new_password", &payload.new_password);
    let current_ok = verify_password(
        payload.current_password,
        current.user.password_hash.clone(),
    )
    .await?;
    if !current_ok {
        errors.add("current_password", "Invalid password.");
    }
    errors.into_result()?;

    let password_hash = hash_password(payload.new_password, state.settings.bcrypt_cost).await?;
    state
        .storage
        .set_password_hash(current.user.id, password_hash)
        .await?;
    tracing::info!(user_id = current.user.id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}

/// Authors the current user follows, each with a preview of their recipes.
pub async fn subscriptions(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    OriginalUri(uri): OriginalUri,
    QueryParams(page): QueryParams<PageParams>,
    QueryParams(limit): QueryParams<RecipesLimit>,
) -> Json<Page<SubscriptionResponse>> {
    let window = page.window(state.settings.page_size);
    let (count, results) = state
        .storage
        .subscriptions(current.user.id, window, limit.recipes_limit)
        .await;
    Json(Page::new(
        count,
        results,
        window,
        &state.settings.public_url,
        &uri,
    ))
}

pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<i64>,
    QueryParams(limit): QueryParams<RecipesLimit>,
) -> Result<(StatusCode, Json<SubscriptionResponse>)> {
    let author = state
        .storage
        .subscribe(current.user.id, id, limit.recipes_limit)
        .await?;
    tracing::info!(user_id = current.user.id, following_id = id, "subscribed");
    Ok((StatusCode::CREATED, Json(author)))
}

pub async fn unsubscribe(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.storage.unsubscribe(current.user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
