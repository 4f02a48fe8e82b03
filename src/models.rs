use crate::error::{FieldErrors, Result};
use crate::user_models::UserResponse;
use crate::validation::{self, RECIPE_NAME_MAX_LENGTH};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub id: i64,
    pub author_id: i64,
    pub name: String,
    pub text: String,
    pub cooking_time: u32,
    pub image: Option<String>,
    pub pub_date: DateTime<Utc>,
}

/// Join row carrying the per-recipe amount of an ingredient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub recipe_id: i64,
    pub ingredient_id: i64,
    pub amount: u32,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeTag {
    pub recipe_id: i64,
    pub tag_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Favorite {
    pub user_id: i64,
    pub recipe_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShoppingCartEntry {
    pub user_id: i64,
    pub recipe_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTag {
    pub name: String,
    pub slug: String,
}

impl NewTag {
    pub fn validate(&self) -> Result<()> {
        let mut errors = FieldErrors::new();
        validation::check_text(&mut errors, "name", &self.name, validation::TAG_NAME_MAX_LENGTH);
        validation::check_slug(&mut errors, &self.slug);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIngredient {
    pub name: String,
    pub measurement_unit: String,
}

impl NewIngredient {
    pub fn validate(&self) -> Result<()> {
        let mut errors = FieldErrors::new();
        validation::check_text(
            &mut errors,
            "name",
            &self.name,
            validation::INGREDIENT_NAME_MAX_LENGTH,
        );
        validation::check_text(
            &mut errors,
            "measurement_unit",
            &self.measurement_unit,
            validation::MEASUREMENT_UNIT_MAX_LENGTH,
        );
        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientAmount {
    pub id: i64,
    pub amount: i64,
}

/// Body of `POST` and `PATCH /recipes/`. Every field is optional at the wire
/// level; `validate_create` enforces the required ones.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RecipeRequest {
    pub ingredients: Option<Vec<IngredientAmount>>,
    pub tags: Option<Vec<i64>>,
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i64>,
}

/// A recipe body that passed field validation; catalog ids are checked by storage.
#[derive(Debug, Clone)]
pub struct RecipeDraft {
    pub name: String,
    pub text: String,
    pub cooking_time: u32,
    pub ingredients: Vec<(i64, u32)>,
    pub tags: Vec<i64>,
}

/// Validated partial update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct RecipeChanges {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<u32>,
    pub ingredients: Option<Vec<(i64, u32)>>,
    pub tags: Option<Vec<i64>>,
    pub image: Option<String>,
}

const REQUIRED: &str = "This field is required.";

fn check_ingredients(errors: &mut FieldErrors, items: &[IngredientAmount]) -> Vec<(i64, u32)> {
    if items.is_empty() {
        errors.add("ingredients", "A recipe needs at least one ingredient.");
        return Vec::new();
    }
    if let Some(id) = validation::first_duplicate(items.iter().map(|item| item.id)) {
        errors.add(
            "ingredients",
            format!("Ingredient {} is listed more than once.", id),
        );
    }
    for item in items {
        validation::check_amount(errors, item.amount);
    }
    items
        .iter()
        .map(|item| (item.id, item.amount.clamp(0, i64::from(u32::MAX)) as u32))
        .collect()
}

fn check_tags(errors: &mut FieldErrors, tags: &[i64]) {
    if tags.is_empty() {
        errors.add("tags", "A recipe needs at least one tag.");
    } else if let Some(id) = validation::first_duplicate(tags.iter().copied()) {
        errors.add("tags", format!("Tag {} is listed more than once.", id));
    }
}

fn check_cooking_time(errors: &mut FieldErrors, cooking_time: i64) -> u32 {
    validation::check_cooking_time(errors, cooking_time);
    cooking_time.clamp(0, i64::from(u32::MAX)) as u32
}

impl RecipeRequest {
    pub fn validate_create(self) -> Result<RecipeDraft> {
        let mut errors = FieldErrors::new();

        let ingredients = match &self.ingredients {
            Some(items) => check_ingredients(&mut errors, items),
            None => {
                errors.add("ingredients", REQUIRED);
                Vec::new()
            }
        };
        match &self.tags {
            Some(tags) => check_tags(&mut errors, tags),
            None => errors.add("tags", REQUIRED),
        }
        match &self.name {
            Some(name) => validation::check_text(&mut errors, "name", name, RECIPE_NAME_MAX_LENGTH),
            None => errors.add("name", REQUIRED),
        }
        match &self.text {
            Some(text) => validation::check_text(&mut errors, "text", text, usize::MAX),
            None => errors.add("text", REQUIRED),
        }
        let cooking_time = match self.cooking_time {
            Some(minutes) => check_cooking_time(&mut errors, minutes),
            None => {
                errors.add("cooking_time", REQUIRED);
                0
            }
        };
        errors.into_result()?;

        Ok(RecipeDraft {
            name: self.name.unwrap_or_default(),
            text: self.text.unwrap_or_default(),
            cooking_time,
            ingredients,
            tags: self.tags.unwrap_or_default(),
        })
    }

    /// Validates the fields present in the body. The image is handled by the caller.
    pub fn validate_update(self) -> Result<RecipeChanges> {
        let mut errors = FieldErrors::new();

        let ingredients = self
            .ingredients
            .as_deref()
            .map(|items| check_ingredients(&mut errors, items));
        if let Some(tags) = &self.tags {
            check_tags(&mut errors, tags);
        }
        if let Some(name) = &self.name {
            validation::check_text(&mut errors, "name", name, RECIPE_NAME_MAX_LENGTH);
        }
        if let Some(text) = &self.text {
            validation::check_text(&mut errors, "text", text, usize::MAX);
        }
        let cooking_time = self
            .cooking_time
            .map(|minutes| check_cooking_time(&mut errors, minutes));
        errors.into_result()?;

        Ok(RecipeChanges {
            name: self.name,
            text: self.text,
            cooking_time,
            ingredients,
            tags: self.tags,
            image: None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeIngredientResponse {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeResponse {
    pub id: i64,
    pub tags: Vec<Tag>,
    pub author: UserResponse,
    pub ingredients: Vec<RecipeIngredientResponse>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: Option<String>,
    pub text: String,
    pub cooking_time: u32,
}

/// Compact recipe used by favorites, the cart and subscriptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortRecipe {
    pub id: i64,
    pub name: String,
    pub image: Option<String>,
    pub cooking_time: u32,
}

impl From<&Recipe> for ShortRecipe {
    fn from(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name.clone(),
            image: recipe.image.clone(),
            cooking_time: recipe.cooking_time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortLinkResponse {
    #[serde(rename = "short-link")]
    pub short_link: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct IngredientSearch {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecipeListQuery {
    pub author: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub is_favorited: Option<String>,
    pub is_in_shopping_cart: Option<String>,
}

/// Resolved listing filter. Flag filters need a viewer.
#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub author: Option<i64>,
    pub tags: Vec<String>,
    pub favorited_by: Option<i64>,
    pub in_cart_of: Option<i64>,
}

fn flag_enabled(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("1") | Some("true") | Some("True"))
}

impl RecipeListQuery {
    pub fn into_filter(self, viewer: Option<i64>) -> RecipeFilter {
        let favorited = flag_enabled(self.is_favorited.as_deref());
        let in_cart = flag_enabled(self.is_in_shopping_cart.as_deref());
        RecipeFilter {
            author: self.author,
            tags: self.tags,
            favorited_by: viewer.filter(|_| favorited),
            in_cart_of: viewer.filter(|_| in_cart),
        }
    }
}
