//! Read-only catalogs: tags and ingredients.

use crate::error::Result;
use crate::extract::QueryParams;
use crate::models::{Ingredient, IngredientSearch, Tag};
use crate::routes::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

pub async fn list_tags(State(state): State<Arc<AppState>>) -> Json<Vec<Tag>> {
    Json(state.storage.list_tags().await)
}

pub async fn get_tag(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Tag>> {
    Ok(Json(state.storage.get_tag(id).await?))
}

pub async fn list_ingredients(
    State(state): State<Arc<AppState>>,
    QueryParams(search): QueryParams<IngredientSearch>,
) -> Json<Vec<Ingredient>> {
    Json(state.storage.list_ingredients(search.name.as_deref()).await)
}

pub async fn get_ingredient(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Ingredient>> {
    Ok(Json(state.storage.get_ingredient(id).await?))
}
