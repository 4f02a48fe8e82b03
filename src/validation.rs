//! Field constraints for users, recipes and the read-only catalogs.

use crate::error::FieldErrors;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::hash::Hash;

pub const EMAIL_MAX_LENGTH: usize = 254;
pub const USERNAME_MAX_LENGTH: usize = 150;
pub const NAME_MAX_LENGTH: usize = 150;
pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const PASSWORD_MAX_LENGTH: usize = 128;
pub const RECIPE_NAME_MAX_LENGTH: usize = 256;
pub const INGREDIENT_NAME_MAX_LENGTH: usize = 128;
pub const MEASUREMENT_UNIT_MAX_LENGTH: usize = 64;
pub const TAG_NAME_MAX_LENGTH: usize = 32;
pub const TAG_SLUG_MAX_LENGTH: usize = 32;
pub const MIN_COOKING_TIME: i64 = 1;
pub const MAX_COOKING_TIME: i64 = 32_000;
pub const MIN_AMOUNT: i64 = 1;
pub const MAX_AMOUNT: i64 = 32_000;

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid regex"));
static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("valid regex"));

/// Checks a required text field against a maximum length, recording any problem.
pub fn check_text(errors: &mut FieldErrors, field: &str, value: &str, max_len: usize) {
    if value.trim().is_empty() {
        errors.add(field, "This field may not be blank.");
    } else if value.chars().count() > max_len {
        errors.add(
            field,
            format!("Ensure this field has no more than {} characters.", max_len),
        );
    }
}

pub fn check_email(errors: &mut FieldErrors, email: &str) {
    check_text(errors, "email", email, EMAIL_MAX_LENGTH);
    let well_formed = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.ends_with('.'))
        .unwrap_or(false);
    if !email.trim().is_empty() && !well_formed {
        errors.add("email", "Enter a valid email address.");
    }
}

pub fn check_username(errors: &mut FieldErrors, username: &str) {
    check_text(errors, "username", username, USERNAME_MAX_LENGTH);
    if username.trim().is_empty() {
        return;
    }
    if !USERNAME_RE.is_match(username) {
        errors.add(
            "username",
            "Username may contain only letters, digits and the characters @ . + - _",
        );
    }
    if username == "me" {
        errors.add("username", "The username \"me\" is reserved.");
    }
}

pub fn check_password(errors: &mut FieldErrors, field: &str, password: &str) {
    let length = password.chars().count();
    if length < PASSWORD_MIN_LENGTH {
        errors.add(
            field,
            format!("Password must be at least {} characters long.", PASSWORD_MIN_LENGTH),
        );
    }
    if length > PASSWORD_MAX_LENGTH {
        errors.add(
            field,
            format!("Password must be at most {} characters long.", PASSWORD_MAX_LENGTH),
        );
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        errors.add(field, "Password cannot consist of digits only.");
    }
    if !password.chars().any(char::is_uppercase) {
        errors.add(field, "Password must contain at least one uppercase letter.");
    }
}

pub fn check_slug(errors: &mut FieldErrors, slug: &str) {
    check_text(errors, "slug", slug, TAG_SLUG_MAX_LENGTH);
    if !slug.is_empty() && !SLUG_RE.is_match(slug) {
        errors.add(
            "slug",
            "Slug may contain only Latin letters, digits, hyphens and underscores.",
        );
    }
}

pub fn check_cooking_time(errors: &mut FieldErrors, cooking_time: i64) {
    if cooking_time < MIN_COOKING_TIME {
        errors.add(
            "cooking_time",
            format!("Cooking time cannot be less than {}.", MIN_COOKING_TIME),
        );
    } else if cooking_time > MAX_COOKING_TIME {
        errors.add(
            "cooking_time",
            format!("Cooking time cannot be greater than {}.", MAX_COOKING_TIME),
        );
    }
}

pub fn check_amount(errors: &mut FieldErrors, amount: i64) {
    if amount < MIN_AMOUNT {
        errors.add(
            "ingredients",
            format!("Ingredient amount cannot be less than {}.", MIN_AMOUNT),
        );
    } else if amount > MAX_AMOUNT {
        errors.add(
            "ingredients",
            format!("Ingredient amount cannot be greater than {}.", MAX_AMOUNT),
        );
    }
}

/// Returns the first value that occurs more than once.
pub fn first_duplicate<T: Eq + Hash + Copy>(values: impl IntoIterator<Item = T>) -> Option<T> {
    let mut seen = HashSet::new();
    values.into_iter().find(|value| !seen.insert(*value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errors_for(check: impl FnOnce(&mut FieldErrors)) -> FieldErrors {
        let mut errors = FieldErrors::new();
        check(&mut errors);
        errors
    }

    #[test]
    fn username_pattern_and_reserved_name() {
        assert!(errors_for(|e| check_username(e, "chef.anna+1@home")).is_empty());
        assert!(!errors_for(|e| check_username(e, "bad name")).is_empty());
        assert!(!errors_for(|e| check_username(e, "me")).is_empty());
        assert!(!errors_for(|e| check_username(e, "")).is_empty());
    }

    #[test]
    fn password_policy() {
        assert!(errors_for(|e| check_password(e, "password", "Secret123")).is_empty());
        assert!(!errors_for(|e| check_password(e, "password", "Sh0rt")).is_empty());
        assert!(!errors_for(|e| check_password(e, "password", "12345678901")).is_empty());
        assert!(!errors_for(|e| check_password(e, "password", "lowercase123")).is_empty());
    }

    #[test]
    fn cooking_time_bounds() {
        assert!(!errors_for(|e| check_cooking_time(e, 0)).is_empty());
        assert!(!errors_for(|e| check_cooking_time(e, -5)).is_empty());
        assert!(errors_for(|e| check_cooking_time(e, 1)).is_empty());
        assert!(errors_for(|e| check_cooking_time(e, MAX_COOKING_TIME)).is_empty());
        assert!(!errors_for(|e| check_cooking_time(e, MAX_COOKING_TIME + 1)).is_empty());
    }

    #[test]
    fn email_shape() {
        assert!(errors_for(|e| check_email(e, "cook@example.com")).is_empty());
        assert!(!errors_for(|e| check_email(e, "cook.example.com")).is_empty());
        assert!(!errors_for(|e| check_email(e, "@example.com")).is_empty());
    }

    #[test]
    fn slug_pattern() {
        assert!(errors_for(|e| check_slug(e, "breakfast_2")).is_empty());
        assert!(!errors_for(|e| check_slug(e, "зав трак")).is_empty());
    }

    #[test]
    fn finds_duplicates() {
        assert_eq!(first_duplicate([1, 2, 3, 2]), Some(2));
        assert_eq!(first_duplicate([1, 2, 3]), None);
    }
}
