//! HTTP surface: the `/api` resources, short links and media files.

pub mod recipes;
pub mod tags;
pub mod tokens;
pub mod users;

use crate::config::Settings;
use crate::images::MediaStore;
use crate::storage::Storage;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub struct AppState {
    pub storage: Arc<Storage>,
    pub media: MediaStore,
    pub settings: Settings,
}

pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/tags/", get(tags::list_tags))
        .route("/tags/:id/", get(tags::get_tag))
        .route("/ingredients/", get(tags::list_ingredients))
        .route("/ingredients/:id/", get(tags::get_ingredient))
        .route(
            "/recipes/",
            get(recipes::list_recipes).post(recipes::create_recipe),
        )
        .route(
            "/recipes/download_shopping_cart/",
            get(recipes::download_shopping_cart),
        )
        .route(
            "/recipes/:id/",
            get(recipes::get_recipe)
                .patch(recipes::update_recipe)
                .delete(recipes::delete_recipe),
        )
        .route("/recipes/:id/get-link/", get(recipes::get_link))
        .route(
            "/recipes/:id/favorite/",
            post(recipes::add_favorite).delete(recipes::remove_favorite),
        )
        .route(
            "/recipes/:id/shopping_cart/",
            post(recipes::add_to_cart).delete(recipes::remove_from_cart),
        )
        .route("/users/", get(users::list_users).post(users::create_user))
        .route("/users/me/", get(users::me))
        .route(
            "/users/me/avatar/",
            put(users::set_avatar).delete(users::delete_avatar),
        )
        .route("/users/set_password/", post(users::set_password))
        .route("/users/subscriptions/", get(users::subscriptions))
        .route("/users/:id/", get(users::get_user))
        .route(
            "/users/:id/subscribe/",
            post(users::subscribe).delete(users::unsubscribe),
        )
        .route("/auth/token/login/", post(tokens::login))
        .route("/auth/token/logout/", post(tokens::logout));

    let media_root = state.media.root().to_path_buf();

    Router::new()
        .nest("/api", api)
        .route("/s/:code", get(recipes::resolve_short_link))
        .nest_service("/media", ServeDir::new(media_root))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
