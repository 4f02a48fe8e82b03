use crate::error::{AppError, FieldErrors, Result};
use crate::pagination::Window;
use crate::storage::{next_id, Storage, Tables};
use crate::user_models::{AuthToken, Follow, NewUser, SubscriptionResponse, User, UserResponse};
use chrono::Utc;

impl Storage {
    pub async fn create_user(&self, new_user: NewUser, password_hash: String) -> Result<User> {
        let user = self
            .write(|tables| {
                let mut errors = FieldErrors::new();
                if tables
                    .users
                    .iter()
                    .any(|u| u.email.eq_ignore_ascii_case(&new_user.email))
                {
                    errors.add("email", "A user with that email already exists.");
                }
                if tables.users.iter().any(|u| u.username == new_user.username) {
                    errors.add("username", "A user with that username already exists.");
                }
                errors.into_result()?;

                let user = User {
                    id: next_id(&mut tables.sequences.users),
                    email: new_user.email,
                    username: new_user.username,
                    first_name: new_user.first_name,
                    last_name: new_user.last_name,
                    password_hash,
                    avatar: None,
                    date_joined: Utc::now(),
                };
                tables.users.push(user.clone());
                Ok(user)
            })
            .await?;

        tracing::info!(user_id = user.id, username = %user.username, "user registered");
        Ok(user)
    }

    /// Users ordered by username, with `is_subscribed` computed for the viewer.
    pub async fn list_users(
        &self,
        viewer: Option<i64>,
        window: Window,
    ) -> (usize, Vec<UserResponse>) {
        let guard = self.tables.read().await;
        let tables: &Tables = &guard;
        let mut users: Vec<&User> = tables.users.iter().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));

        let count = users.len();
        let results = window
            .apply(users)
            .into_iter()
            .map(|u| tables.user_view(u, viewer))
            .collect();
        (count, results)
    }

    pub async fn get_user(&self, id: i64, viewer: Option<i64>) -> Result<UserResponse> {
        let tables = self.tables.read().await;
        let user = tables.user(id).ok_or(AppError::NotFound)?;
        Ok(tables.user_view(user, viewer))
    }

    pub async fn find_user_by_email(&self, email: &str) -> Option<User> {
        let tables = self.tables.read().await;
        tables
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email.trim()))
            .cloned()
    }

    pub async fn user_by_token(&self, key: &str) -> Option<User> {
        let tables = self.tables.read().await;
        let token = tables.tokens.iter().find(|t| t.key == key)?;
        tables.user(token.user_id).cloned()
    }

    /// Returns the user's token, creating one if needed.
    pub async fn issue_token(&self, user_id: i64) -> Result<String> {
        if let Some(key) = self.token_of(user_id).await {
            return Ok(key);
        }
        self.write(|tables| {
            if let Some(token) = tables.tokens.iter().find(|t| t.user_id == user_id) {
                return Ok(token.key.clone());
            }
            let token = AuthToken::new(user_id);
            let key = token.key.clone();
            tables.tokens.push(token);
            Ok(key)
        })
        .await
    }

    async fn token_of(&self, user_id: i64) -> Option<String> {
        let tables = self.tables.read().await;
        tables
            .tokens
            .iter()
            .find(|t| t.user_id == user_id)
            .map(|t| t.key.clone())
    }

    pub async fn revoke_token(&self, key: &str) -> Result<()> {
        self.write(|tables| {
            tables.tokens.retain(|t| t.key != key);
            Ok(())
        })
        .await
    }

    pub async fn set_password_hash(&self, user_id: i64, password_hash: String) -> Result<()> {
        self.write(|tables| {
            let user = tables
                .users
                .iter_mut()
                .find(|u| u.id == user_id)
                .ok_or(AppError::NotFound)?;
            user.password_hash = password_hash;
            Ok(())
        })
        .await
    }

    /// Replaces the avatar and returns the previous one.
    pub async fn set_avatar(&self, user_id: i64, avatar: Option<String>) -> Result<Option<String>> {
        self.write(|tables| {
            let user = tables
                .users
                .iter_mut()
                .find(|u| u.id == user_id)
                .ok_or(AppError::NotFound)?;
            Ok(std::mem::replace(&mut user.avatar, avatar))
        })
        .await
    }

    pub async fn subscribe(
        &self,
        user_id: i64,
        target_id: i64,
        recipes_limit: Option<usize>,
    ) -> Result<SubscriptionResponse> {
        self.write(|tables| {
            if tables.user(target_id).is_none() {
                return Err(AppError::NotFound);
            }
            if user_id == target_id {
                return Err(AppError::non_field("You cannot subscribe to yourself."));
            }
            if tables.is_following(Some(user_id), target_id) {
                return Err(AppError::non_field(
                    "You are already subscribed to this user.",
                ));
            }

            tables.follows.push(Follow {
                user_id,
                following_id: target_id,
                created_at: Utc::now(),
            });

            let author = tables.user(target_id).ok_or(AppError::NotFound)?;
            Ok(tables.subscription_view(author, Some(user_id), recipes_limit))
        })
        .await
    }

    pub async fn unsubscribe(&self, user_id: i64, target_id: i64) -> Result<()> {
        self.write(|tables| {
            if tables.user(target_id).is_none() {
                return Err(AppError::NotFound);
            }
            if !tables.is_following(Some(user_id), target_id) {
                return Err(AppError::non_field("You are not subscribed to this user."));
            }
            tables
                .follows
                .retain(|f| !(f.user_id == user_id && f.following_id == target_id));
            Ok(())
        })
        .await
    }

    /// Authors the user follows, ordered by username.
    pub async fn subscriptions(
        &self,
        user_id: i64,
        window: Window,
        recipes_limit: Option<usize>,
    ) -> (usize, Vec<SubscriptionResponse>) {
        let guard = self.tables.read().await;
        let tables: &Tables = &guard;
        let mut authors: Vec<&User> = tables
            .follows
            .iter()
            .filter(|f| f.user_id == user_id)
            .filter_map(|f| tables.user(f.following_id))
            .collect();
        authors.sort_by(|a, b| a.username.cmp(&b.username));

        let count = authors.len();
        let results = window
            .apply(authors)
            .into_iter()
            .map(|author| tables.subscription_view(author, Some(user_id), recipes_limit))
            .collect();
        (count, results)
    }
}
