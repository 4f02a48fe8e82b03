//! Foodgram: a recipe sharing backend.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod images;
pub mod models;
pub mod pagination;
pub mod routes;
pub mod shopping_cart;
pub mod storage;
pub mod user_models;
pub mod user_storage;
pub mod validation;

pub use routes::{router, AppState};
