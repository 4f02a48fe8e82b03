use crate::auth::{CurrentUser, MaybeUser};
use crate::error::{AppError, Result};
use crate::extract::{JsonBody, QueryParams};
use crate::images::RECIPES_FOLDER;
use crate::models::{
    RecipeListQuery, RecipeRequest, RecipeResponse, ShortLinkResponse, ShortRecipe,
};
use crate::pagination::{Page, PageParams};
use crate::routes::AppState;
use crate::shopping_cart::attachment_name;
use axum::{
    extract::{OriginalUri, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect},
    Json,
};
use std::sync::Arc;

const BASE62: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

pub fn encode_short_code(mut id: u64) -> String {
    if id == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while id > 0 {
        digits.push(BASE62[(id % 62) as usize]);
        id /= 62;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

pub fn decode_short_code(code: &str) -> Option<u64> {
    if code.is_empty() {
        return None;
    }
    code.bytes().try_fold(0u64, |acc, byte| {
        let digit = BASE62.iter().position(|b| *b == byte)? as u64;
        acc.checked_mul(62)?.checked_add(digit)
    })
}

pub async fn list_recipes(
    State(state): State<Arc<AppState>>,
    viewer: MaybeUser,
    OriginalUri(uri): OriginalUri,
    QueryParams(page): QueryParams<PageParams>,
    QueryParams(query): QueryParams<RecipeListQuery>,
) -> Result<Json<Page<RecipeResponse>>> {
    let window = page.window(state.settings.page_size);
    let filter = query.into_filter(viewer.id());
    let (count, results) = state
        .storage
        .list_recipes(&filter, viewer.id(), window)
        .await?;
    Ok(Json(Page::new(
        count,
        results,
        window,
        &state.settings.public_url,
        &uri,
    )))
}

pub async fn create_recipe(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    JsonBody(mut payload): JsonBody<RecipeRequest>,
) -> Result<(StatusCode, Json<RecipeResponse>)> {
    let image = payload.image.take();
    let draft = payload.validate_create()?;

    let image_url = match image.as_deref().filter(|s| !s.is_empty()) {
        Some(data) => Some(
            state
                .media
                .save_data_url(RECIPES_FOLDER, "image", data)
                .await?,
        ),
        None => None,
    };

    match state
        .storage
        .create_recipe(current.user.id, draft, image_url.clone())
        .await
    {
        Ok(recipe) => Ok((StatusCode::CREATED, Json(recipe))),
        Err(e) => {
            if let Some(url) = image_url {
                state.media.remove(&url).await;
            }
            Err(e)
        }
    }
}

pub async fn get_recipe(
    State(state): State<Arc<AppState>>,
    viewer: MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<RecipeResponse>> {
    Ok(Json(state.storage.get_recipe(id, viewer.id()).await?))
}

pub async fn update_recipe(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<i64>,
    JsonBody(mut payload): JsonBody<RecipeRequest>,
) -> Result<Json<RecipeResponse>> {
    // Non-authors get 403 before any validation runs.
    if state.storage.recipe_author(id).await? != current.user.id {
        return Err(AppError::Forbidden);
    }

    let image = payload.image.take();
    let mut changes = payload.validate_update()?;
    if let Some(data) = image.as_deref().filter(|s| !s.is_empty()) {
        changes.image = Some(
            state
                .media
                .save_data_url(RECIPES_FOLDER, "image", data)
                .await?,
        );
    }
    let new_image = changes.image.clone();

    match state.storage.update_recipe(id, current.user.id, changes).await {
        Ok((recipe, replaced)) => {
            if let Some(old) = replaced {
                state.media.remove(&old).await;
            }
            tracing::info!(recipe_id = id, "recipe updated");
            Ok(Json(recipe))
        }
        Err(e) => {
            if let Some(url) = new_image {
                state.media.remove(&url).await;
            }
            Err(e)
        }
    }
}

pub async fn delete_recipe(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    if let Some(image) = state.storage.delete_recipe(id, current.user.id).await? {
        state.media.remove(&image).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_link(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ShortLinkResponse>> {
    if !state.storage.recipe_exists(id).await {
        return Err(AppError::NotFound);
    }
    let code = u64::try_from(id).map_err(|_| AppError::NotFound)?;
    Ok(Json(ShortLinkResponse {
        short_link: format!("{}/s/{}", state.settings.public_url, encode_short_code(code)),
    }))
}

pub async fn resolve_short_link(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Redirect> {
    let id = decode_short_code(&code)
        .and_then(|id| i64::try_from(id).ok())
        .ok_or(AppError::NotFound)?;
    if !state.storage.recipe_exists(id).await {
        return Err(AppError::NotFound);
    }
    Ok(Redirect::temporary(&format!("/recipes/{id}/")))
}

pub async fn add_favorite(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<ShortRecipe>)> {
    let recipe = state.storage.add_favorite(current.user.id, id).await?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

pub async fn remove_favorite(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.storage.remove_favorite(current.user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<ShortRecipe>)> {
    let recipe = state.storage.add_to_cart(current.user.id, id).await?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

pub async fn remove_from_cart(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.storage.remove_from_cart(current.user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The cart's summed ingredients as a plain-text attachment.
pub async fn download_shopping_cart(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> impl IntoResponse {
    let report = state.storage.shopping_cart_report(current.user.id).await;
    let disposition = format!(
        "attachment; filename={}",
        attachment_name(&current.user.username)
    );
    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        report,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_codes_are_base62() {
        assert_eq!(encode_short_code(0), "0");
        assert_eq!(encode_short_code(61), "Z");
        assert_eq!(encode_short_code(62), "10");
        assert_eq!(decode_short_code("10"), Some(62));
        assert_eq!(decode_short_code(&encode_short_code(123_456)), Some(123_456));
    }

    #[test]
    fn rejects_bad_short_codes() {
        assert_eq!(decode_short_code(""), None);
        assert_eq!(decode_short_code("a-b"), None);
        assert_eq!(decode_short_code("zzzzzzzzzzzzzzzzzzzz"), None);
    }
}
