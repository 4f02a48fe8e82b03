// Drives the router in-process; no sockets are opened.

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use foodgram::config::Settings;
use foodgram::images::MediaStore;
use foodgram::models::{NewIngredient, NewTag};
use foodgram::storage::Storage;
use foodgram::{router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const PASSWORD: &str = "Secret123";

pub struct TestApp {
    pub router: Router,
    pub storage: Arc<Storage>,
    _media: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response is not JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).expect("response is not UTF-8")
    }
}

impl TestApp {
    pub async fn new() -> Self {
        let media = TempDir::new().expect("temp media dir");
        let storage = Arc::new(Storage::in_memory());
        storage
            .import_tags(vec![
                NewTag {
                    name: "Breakfast".to_string(),
                    slug: "breakfast".to_string(),
                },
                NewTag {
                    name: "Dinner".to_string(),
                    slug: "dinner".to_string(),
                },
            ])
            .await
            .expect("seed tags");
        storage
            .import_ingredients(vec![
                NewIngredient {
                    name: "Flour".to_string(),
                    measurement_unit: "g".to_string(),
                },
                NewIngredient {
                    name: "Milk".to_string(),
                    measurement_unit: "ml".to_string(),
                },
            ])
            .await
            .expect("seed ingredients");

        let state = Arc::new(AppState {
            storage: storage.clone(),
            media: MediaStore::new(media.path(), "media"),
            settings: Settings {
                public_url: "http://testserver".to_string(),
                page_size: 6,
                bcrypt_cost: 4,
            },
        });

        Self {
            router: router(state),
            storage,
            _media: media,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Token {token}"));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body")
            .to_vec();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Signs up a user and returns `(id, token)`.
    pub async fn register(&self, username: &str) -> (i64, String) {
        let email = format!("{username}@example.com");
        let response = self
            .post(
                "/api/users/",
                None,
                json!({
                    "email": email,
                    "username": username,
                    "first_name": "Test",
                    "last_name": "User",
                    "password": PASSWORD,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        let id = response.json()["id"].as_i64().expect("user id");

        let response = self
            .post(
                "/api/auth/token/login/",
                None,
                json!({ "email": email, "password": PASSWORD }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text());
        let token = response.json()["auth_token"]
            .as_str()
            .expect("auth token")
            .to_string();
        (id, token)
    }

    pub async fn ingredient_id(&self, name: &str) -> i64 {
        self.storage
            .list_ingredients(Some(name))
            .await
            .first()
            .map(|i| i.id)
            .expect("seeded ingredient")
    }

    pub async fn tag_id(&self, slug: &str) -> i64 {
        self.storage
            .list_tags()
            .await
            .iter()
            .find(|t| t.slug == slug)
            .map(|t| t.id)
            .expect("seeded tag")
    }

    /// Creates a recipe with the given `(ingredient, amount)` rows and returns its id.
    pub async fn create_recipe(
        &self,
        token: &str,
        name: &str,
        ingredients: &[(&str, i64)],
        tags: &[&str],
    ) -> i64 {
        let mut rows = Vec::new();
        for (ingredient, amount) in ingredients {
            rows.push(json!({ "id": self.ingredient_id(ingredient).await, "amount": amount }));
        }
        let mut tag_ids = Vec::new();
        for slug in tags {
            tag_ids.push(self.tag_id(slug).await);
        }

        let response = self
            .post(
                "/api/recipes/",
                Some(token),
                json!({
                    "ingredients": rows,
                    "tags": tag_ids,
                    "name": name,
                    "text": "Mix and bake.",
                    "cooking_time": 30,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        response.json()["id"].as_i64().expect("recipe id")
    }
}
