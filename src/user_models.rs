use crate::error::{FieldErrors, Result};
use crate::models::ShortRecipe;
use crate::validation::{self, NAME_MAX_LENGTH};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub avatar: Option<String>,
    pub date_joined: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    pub key: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

impl AuthToken {
    pub fn new(user_id: i64) -> Self {
        Self {
            key: Uuid::new_v4().simple().to_string(),
            user_id,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follow {
    pub user_id: i64,
    pub following_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

/// Sign-up data that passed field validation. Uniqueness is checked by storage.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl CreateUserRequest {
    pub fn validate(self) -> Result<NewUser> {
        let mut errors = FieldErrors::new();
        let required = "This field is required.";

        match &self.email {
            Some(email) => validation::check_email(&mut errors, email),
            None => errors.add("email", required),
        }
        match &self.username {
            Some(username) => validation::check_username(&mut errors, username),
            None => errors.add("username", required),
        }
        for (field, value) in [("first_name", &self.first_name), ("last_name", &self.last_name)] {
            match value {
                Some(value) => validation::check_text(&mut errors, field, value, NAME_MAX_LENGTH),
                None => errors.add(field, required),
            }
        }
        match &self.password {
            Some(password) => validation::check_password(&mut errors, "password", password),
            None => errors.add("password", required),
        }
        errors.into_result()?;

        Ok(NewUser {
            email: self.email.unwrap_or_default().trim().to_lowercase(),
            username: self.username.unwrap_or_default(),
            first_name: self.first_name.unwrap_or_default(),
            last_name: self.last_name.unwrap_or_default(),
            password: self.password.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserResponse {
    pub email: String,
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&User> for CreateUserResponse {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub email: String,
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub avatar: Option<String>,
}

impl UserResponse {
    pub fn new(user: &User, is_subscribed: bool) -> Self {
        Self {
            email: user.email.clone(),
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_subscribed,
            avatar: user.avatar.clone(),
        }
    }
}

/// A followed author together with a preview of their recipes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub recipes: Vec<ShortRecipe>,
    pub recipes_count: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecipesLimit {
    pub recipes_limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub auth_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetPasswordRequest {
    pub new_password: String,
    pub current_password: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AvatarRequest {
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AvatarResponse {
    pub avatar: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn signup_normalizes_email() {
        let request = CreateUserRequest {
            email: Some(" Cook@Example.com ".to_string()),
            username: Some("cook".to_string()),
            first_name: Some("Anna".to_string()),
            last_name: Some("Smith".to_string()),
            password: Some("Secret123".to_string()),
        };
        let user = request.validate().unwrap();
        assert_eq!(user.email, "cook@example.com");
    }

    #[test]
    fn signup_requires_every_field() {
        match CreateUserRequest::default().validate() {
            Err(AppError::Validation(errors)) => {
                for field in ["email", "username", "first_name", "last_name", "password"] {
                    assert!(errors.get(field).is_some(), "{} should be required", field);
                }
            }
            other => panic!("expected validation error, got {:?}", other.map(|u| u.username)),
        }
    }

    #[test]
    fn tokens_are_unique() {
        assert_ne!(AuthToken::new(1).key, AuthToken::new(1).key);
    }
}
