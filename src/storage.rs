use crate::error::{AppError, FieldErrors, Result};
use crate::models::{
    Favorite, Ingredient, NewIngredient, NewTag, Recipe, RecipeChanges, RecipeDraft, RecipeFilter,
    RecipeIngredient, RecipeIngredientResponse, RecipeResponse, RecipeTag, ShoppingCartEntry,
    ShortRecipe, Tag,
};
use crate::pagination::Window;
use crate::shopping_cart::{self, CartItem};
use crate::user_models::{AuthToken, Follow, SubscriptionResponse, User, UserResponse};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Every table of the service. Rows are kept in insertion order.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub(crate) struct Tables {
    #[serde(default)]
    pub(crate) users: Vec<User>,
    #[serde(default)]
    pub(crate) tokens: Vec<AuthToken>,
    #[serde(default)]
    pub(crate) tags: Vec<Tag>,
    #[serde(default)]
    pub(crate) ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub(crate) recipes: Vec<Recipe>,
    #[serde(default)]
    pub(crate) recipe_ingredients: Vec<RecipeIngredient>,
    #[serde(default)]
    pub(crate) recipe_tags: Vec<RecipeTag>,
    #[serde(default)]
    pub(crate) follows: Vec<Follow>,
    #[serde(default)]
    pub(crate) favorites: Vec<Favorite>,
    #[serde(default)]
    pub(crate) shopping_cart: Vec<ShoppingCartEntry>,
    #[serde(default)]
    pub(crate) sequences: Sequences,
}

/// Last id handed out per table. Ids are never reused.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub(crate) struct Sequences {
    pub(crate) users: i64,
    pub(crate) tags: i64,
    pub(crate) ingredients: i64,
    pub(crate) recipes: i64,
}

pub(crate) fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

/// (user, recipe) join rows: favorites and shopping-cart entries.
trait UserRecipeLink {
    fn create(user_id: i64, recipe_id: i64, at: DateTime<Utc>) -> Self;
    fn user_id(&self) -> i64;
    fn recipe_id(&self) -> i64;
}

impl UserRecipeLink for Favorite {
    fn create(user_id: i64, recipe_id: i64, created_at: DateTime<Utc>) -> Self {
        Favorite {
            user_id,
            recipe_id,
            created_at,
        }
    }
    fn user_id(&self) -> i64 {
        self.user_id
    }
    fn recipe_id(&self) -> i64 {
        self.recipe_id
    }
}

impl UserRecipeLink for ShoppingCartEntry {
    fn create(user_id: i64, recipe_id: i64, created_at: DateTime<Utc>) -> Self {
        ShoppingCartEntry {
            user_id,
            recipe_id,
            created_at,
        }
    }
    fn user_id(&self) -> i64 {
        self.user_id
    }
    fn recipe_id(&self) -> i64 {
        self.recipe_id
    }
}

fn has_link<T: UserRecipeLink>(links: &[T], user_id: i64, recipe_id: i64) -> bool {
    links
        .iter()
        .any(|l| l.user_id() == user_id && l.recipe_id() == recipe_id)
}

impl Tables {
    pub(crate) fn user(&self, id: i64) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub(crate) fn recipe(&self, id: i64) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.id == id)
    }

    pub(crate) fn is_following(&self, viewer: Option<i64>, target: i64) -> bool {
        viewer.map_or(false, |viewer| {
            self.follows
                .iter()
                .any(|f| f.user_id == viewer && f.following_id == target)
        })
    }

    pub(crate) fn user_view(&self, user: &User, viewer: Option<i64>) -> UserResponse {
        UserResponse::new(user, self.is_following(viewer, user.id))
    }

    /// Recipes of an author, newest first.
    pub(crate) fn recipes_by(&self, author_id: i64) -> Vec<&Recipe> {
        let mut recipes: Vec<&Recipe> = self
            .recipes
            .iter()
            .filter(|r| r.author_id == author_id)
            .collect();
        sort_newest_first(&mut recipes);
        recipes
    }

    pub(crate) fn subscription_view(
        &self,
        author: &User,
        viewer: Option<i64>,
        recipes_limit: Option<usize>,
    ) -> SubscriptionResponse {
        let recipes = self.recipes_by(author.id);
        let recipes_count = recipes.len();
        SubscriptionResponse {
            user: self.user_view(author, viewer),
            recipes: recipes
                .into_iter()
                .take(recipes_limit.unwrap_or(usize::MAX))
                .map(ShortRecipe::from)
                .collect(),
            recipes_count,
        }
    }

    fn recipe_view(&self, recipe: &Recipe, viewer: Option<i64>) -> Result<RecipeResponse> {
        let author = self
            .user(recipe.author_id)
            .with_context(|| format!("Recipe {} references missing author", recipe.id))?;

        let tags = self
            .recipe_tags
            .iter()
            .filter(|rt| rt.recipe_id == recipe.id)
            .filter_map(|rt| self.tags.iter().find(|t| t.id == rt.tag_id))
            .cloned()
            .collect();

        let ingredients = self
            .recipe_ingredients
            .iter()
            .filter(|ri| ri.recipe_id == recipe.id)
            .filter_map(|ri| {
                self.ingredients
                    .iter()
                    .find(|i| i.id == ri.ingredient_id)
                    .map(|i| RecipeIngredientResponse {
                        id: i.id,
                        name: i.name.clone(),
                        measurement_unit: i.measurement_unit.clone(),
                        amount: ri.amount,
                    })
            })
            .collect();

        Ok(RecipeResponse {
            id: recipe.id,
            tags,
            author: self.user_view(author, viewer),
            ingredients,
            is_favorited: viewer.map_or(false, |v| has_link(&self.favorites, v, recipe.id)),
            is_in_shopping_cart: viewer
                .map_or(false, |v| has_link(&self.shopping_cart, v, recipe.id)),
            name: recipe.name.clone(),
            image: recipe.image.clone(),
            text: recipe.text.clone(),
            cooking_time: recipe.cooking_time,
        })
    }

    /// Rejects references to tags or ingredients that do not exist.
    fn check_catalog_refs(
        &self,
        ingredients: Option<&[(i64, u32)]>,
        tags: Option<&[i64]>,
    ) -> Result<()> {
        let mut errors = FieldErrors::new();
        for (id, _) in ingredients.unwrap_or_default() {
            if !self.ingredients.iter().any(|i| i.id == *id) {
                errors.add("ingredients", format!("Ingredient {} does not exist.", id));
            }
        }
        for id in tags.unwrap_or_default() {
            if !self.tags.iter().any(|t| t.id == *id) {
                errors.add("tags", format!("Tag {} does not exist.", id));
            }
        }
        errors.into_result()
    }

    fn replace_recipe_ingredients(&mut self, recipe_id: i64, ingredients: &[(i64, u32)]) {
        let now = Utc::now();
        self.recipe_ingredients.retain(|ri| ri.recipe_id != recipe_id);
        self.recipe_ingredients
            .extend(ingredients.iter().map(|(ingredient_id, amount)| RecipeIngredient {
                recipe_id,
                ingredient_id: *ingredient_id,
                amount: *amount,
                modified_at: now,
            }));
    }

    fn replace_recipe_tags(&mut self, recipe_id: i64, tags: &[i64]) {
        self.recipe_tags.retain(|rt| rt.recipe_id != recipe_id);
        self.recipe_tags
            .extend(tags.iter().map(|tag_id| RecipeTag { recipe_id, tag_id: *tag_id }));
    }

    fn matches(&self, recipe: &Recipe, filter: &RecipeFilter, tag_ids: &HashSet<i64>) -> bool {
        if filter.author.is_some_and(|author| recipe.author_id != author) {
            return false;
        }
        if !filter.tags.is_empty()
            && !self
                .recipe_tags
                .iter()
                .any(|rt| rt.recipe_id == recipe.id && tag_ids.contains(&rt.tag_id))
        {
            return false;
        }
        if filter
            .favorited_by
            .is_some_and(|user| !has_link(&self.favorites, user, recipe.id))
        {
            return false;
        }
        if filter
            .in_cart_of
            .is_some_and(|user| !has_link(&self.shopping_cart, user, recipe.id))
        {
            return false;
        }
        true
    }
}

fn sort_newest_first(recipes: &mut [&Recipe]) {
    recipes.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
}

pub struct Storage {
    pub(crate) tables: RwLock<Tables>,
    path: Option<PathBuf>,
}

impl Storage {
    /// Loads the data file if it exists; every write is persisted back to it.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let tables = if path.exists() {
            let data = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read data file {}", path.display()))?;
            serde_json::from_str(&data)
                .with_context(|| format!("Failed to parse data file {}", path.display()))?
        } else {
            Tables::default()
        };

        Ok(Self {
            tables: RwLock::new(tables),
            path: Some(path),
        })
    }

    /// Storage that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            path: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Runs `apply` on a copy of the tables under the write lock. The copy
    /// replaces the live tables only once it is on disk, so a failed write
    /// leaves memory as it was.
    pub(crate) async fn write<T>(
        &self,
        apply: impl FnOnce(&mut Tables) -> Result<T>,
    ) -> Result<T> {
        let mut tables = self.tables.write().await;
        let mut staged = tables.clone();
        let value = apply(&mut staged)?;
        self.save_to_disk(&staged).await?;
        *tables = staged;
        Ok(value)
    }

    /// Writes a sibling temp file, then renames it over the data file.
    async fn save_to_disk(&self, tables: &Tables) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(tables).context("Failed to serialize tables")?;
        let mut temp = path.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);
        tokio::fs::write(&temp, json)
            .await
            .with_context(|| format!("Failed to write data file {}", temp.display()))?;
        tokio::fs::rename(&temp, path)
            .await
            .with_context(|| format!("Failed to replace data file {}", path.display()))?;
        Ok(())
    }

    pub async fn list_tags(&self) -> Vec<Tag> {
        let tables = self.tables.read().await;
        let mut tags = tables.tags.clone();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        tags
    }

    pub async fn get_tag(&self, id: i64) -> Result<Tag> {
        let tables = self.tables.read().await;
        tables
            .tags
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    /// Inserts tags that are not present yet (matched by slug or name).
    /// Returns the number of new rows.
    pub async fn import_tags(&self, items: Vec<NewTag>) -> Result<usize> {
        for item in &items {
            item.validate()?;
        }

        self.write(|tables| {
            let mut created = 0;
            for item in items {
                let exists = tables
                    .tags
                    .iter()
                    .any(|t| t.slug == item.slug || t.name == item.name);
                if exists {
                    continue;
                }
                let id = next_id(&mut tables.sequences.tags);
                tables.tags.push(Tag {
                    id,
                    name: item.name,
                    slug: item.slug,
                });
                created += 1;
            }
            Ok(created)
        })
        .await
    }

    /// Ingredients whose name starts with `prefix` (case-insensitive), by name.
    pub async fn list_ingredients(&self, prefix: Option<&str>) -> Vec<Ingredient> {
        let tables = self.tables.read().await;
        let prefix = prefix.map(|p| p.trim().to_lowercase()).unwrap_or_default();
        let mut ingredients: Vec<Ingredient> = tables
            .ingredients
            .iter()
            .filter(|i| i.name.to_lowercase().starts_with(&prefix))
            .cloned()
            .collect();
        ingredients.sort_by(|a, b| a.name.cmp(&b.name));
        ingredients
    }

    pub async fn get_ingredient(&self, id: i64) -> Result<Ingredient> {
        let tables = self.tables.read().await;
        tables
            .ingredients
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    /// Inserts ingredients whose name is not present yet. Returns the number of new rows.
    pub async fn import_ingredients(&self, items: Vec<NewIngredient>) -> Result<usize> {
        for item in &items {
            item.validate()?;
        }

        self.write(|tables| {
            let mut created = 0;
            for item in items {
                if tables.ingredients.iter().any(|i| i.name == item.name) {
                    continue;
                }
                let id = next_id(&mut tables.sequences.ingredients);
                tables.ingredients.push(Ingredient {
                    id,
                    name: item.name,
                    measurement_unit: item.measurement_unit,
                });
                created += 1;
            }
            Ok(created)
        })
        .await
    }

    pub async fn recipe_exists(&self, id: i64) -> bool {
        self.tables.read().await.recipe(id).is_some()
    }

    /// Author of a recipe, or `NotFound`.
    pub async fn recipe_author(&self, id: i64) -> Result<i64> {
        let tables = self.tables.read().await;
        tables
            .recipe(id)
            .map(|r| r.author_id)
            .ok_or(AppError::NotFound)
    }

    pub async fn get_recipe(&self, id: i64, viewer: Option<i64>) -> Result<RecipeResponse> {
        let tables = self.tables.read().await;
        let recipe = tables.recipe(id).ok_or(AppError::NotFound)?;
        tables.recipe_view(recipe, viewer)
    }

    /// Filtered recipes, newest first. Returns the total match count and one window of results.
    pub async fn list_recipes(
        &self,
        filter: &RecipeFilter,
        viewer: Option<i64>,
        window: Window,
    ) -> Result<(usize, Vec<RecipeResponse>)> {
        let guard = self.tables.read().await;
        let tables: &Tables = &guard;
        let tag_ids: HashSet<i64> = tables
            .tags
            .iter()
            .filter(|t| filter.tags.contains(&t.slug))
            .map(|t| t.id)
            .collect();

        let mut matching: Vec<&Recipe> = tables
            .recipes
            .iter()
            .filter(|r| tables.matches(r, filter, &tag_ids))
            .collect();
        sort_newest_first(&mut matching);

        let count = matching.len();
        let results = window
            .apply(matching)
            .into_iter()
            .map(|r| tables.recipe_view(r, viewer))
            .collect::<Result<Vec<_>>>()?;
        Ok((count, results))
    }

    pub async fn create_recipe(
        &self,
        author_id: i64,
        draft: RecipeDraft,
        image: Option<String>,
    ) -> Result<RecipeResponse> {
        let recipe = self
            .write(|tables| {
                if tables.user(author_id).is_none() {
                    return Err(AppError::not_authenticated());
                }
                tables.check_catalog_refs(
                    Some(draft.ingredients.as_slice()),
                    Some(draft.tags.as_slice()),
                )?;

                let id = next_id(&mut tables.sequences.recipes);
                tables.recipes.push(Recipe {
                    id,
                    author_id,
                    name: draft.name,
                    text: draft.text,
                    cooking_time: draft.cooking_time,
                    image,
                    pub_date: Utc::now(),
                });
                tables.replace_recipe_ingredients(id, &draft.ingredients);
                tables.replace_recipe_tags(id, &draft.tags);

                let recipe = tables.recipe(id).ok_or(AppError::NotFound)?;
                tables.recipe_view(recipe, Some(author_id))
            })
            .await?;

        tracing::info!(recipe_id = recipe.id, author_id, "recipe created");
        Ok(recipe)
    }

    /// Applies a partial update. Returns the new representation and the image
    /// that was replaced, if any.
    pub async fn update_recipe(
        &self,
        recipe_id: i64,
        editor_id: i64,
        changes: RecipeChanges,
    ) -> Result<(RecipeResponse, Option<String>)> {
        self.write(|tables| {
            let author_id = tables
                .recipe(recipe_id)
                .map(|r| r.author_id)
                .ok_or(AppError::NotFound)?;
            if author_id != editor_id {
                return Err(AppError::Forbidden);
            }
            tables.check_catalog_refs(changes.ingredients.as_deref(), changes.tags.as_deref())?;

            if let Some(ingredients) = &changes.ingredients {
                tables.replace_recipe_ingredients(recipe_id, ingredients);
            }
            if let Some(tags) = &changes.tags {
                tables.replace_recipe_tags(recipe_id, tags);
            }

            let mut replaced_image = None;
            if let Some(recipe) = tables.recipes.iter_mut().find(|r| r.id == recipe_id) {
                if let Some(name) = changes.name {
                    recipe.name = name;
                }
                if let Some(text) = changes.text {
                    recipe.text = text;
                }
                if let Some(cooking_time) = changes.cooking_time {
                    recipe.cooking_time = cooking_time;
                }
                if let Some(image) = changes.image {
                    replaced_image = recipe.image.replace(image);
                }
            }

            let recipe = tables.recipe(recipe_id).ok_or(AppError::NotFound)?;
            Ok((tables.recipe_view(recipe, Some(editor_id))?, replaced_image))
        })
        .await
    }

    /// Deletes a recipe with its ingredient links, tag links, favorites and
    /// cart entries. Returns the recipe image so the caller can remove it.
    pub async fn delete_recipe(&self, recipe_id: i64, user_id: i64) -> Result<Option<String>> {
        let image = self
            .write(|tables| {
                let position = tables
                    .recipes
                    .iter()
                    .position(|r| r.id == recipe_id)
                    .ok_or(AppError::NotFound)?;
                if tables.recipes[position].author_id != user_id {
                    return Err(AppError::Forbidden);
                }

                let recipe = tables.recipes.remove(position);
                tables.recipe_ingredients.retain(|ri| ri.recipe_id != recipe_id);
                tables.recipe_tags.retain(|rt| rt.recipe_id != recipe_id);
                tables.favorites.retain(|f| f.recipe_id != recipe_id);
                tables.shopping_cart.retain(|s| s.recipe_id != recipe_id);
                Ok(recipe.image)
            })
            .await?;

        tracing::info!(recipe_id, "recipe deleted");
        Ok(image)
    }

    pub async fn add_favorite(&self, user_id: i64, recipe_id: i64) -> Result<ShortRecipe> {
        self.write(|tables| {
            let recipe = tables
                .recipe(recipe_id)
                .map(ShortRecipe::from)
                .ok_or(AppError::NotFound)?;
            if has_link(&tables.favorites, user_id, recipe_id) {
                return Err(AppError::non_field("The recipe is already in favorites."));
            }
            tables
                .favorites
                .push(Favorite::create(user_id, recipe_id, Utc::now()));
            Ok(recipe)
        })
        .await
    }

    pub async fn remove_favorite(&self, user_id: i64, recipe_id: i64) -> Result<()> {
        self.write(|tables| {
            if tables.recipe(recipe_id).is_none() {
                return Err(AppError::NotFound);
            }
            if !has_link(&tables.favorites, user_id, recipe_id) {
                return Err(AppError::non_field("The recipe is not in favorites."));
            }
            tables
                .favorites
                .retain(|f| !(f.user_id == user_id && f.recipe_id == recipe_id));
            Ok(())
        })
        .await
    }

    pub async fn add_to_cart(&self, user_id: i64, recipe_id: i64) -> Result<ShortRecipe> {
        self.write(|tables| {
            let recipe = tables
                .recipe(recipe_id)
                .map(ShortRecipe::from)
                .ok_or(AppError::NotFound)?;
            if has_link(&tables.shopping_cart, user_id, recipe_id) {
                return Err(AppError::non_field(
                    "The recipe is already in the shopping cart.",
                ));
            }
            tables
                .shopping_cart
                .push(ShoppingCartEntry::create(user_id, recipe_id, Utc::now()));
            Ok(recipe)
        })
        .await
    }

    pub async fn remove_from_cart(&self, user_id: i64, recipe_id: i64) -> Result<()> {
        self.write(|tables| {
            if tables.recipe(recipe_id).is_none() {
                return Err(AppError::NotFound);
            }
            if !has_link(&tables.shopping_cart, user_id, recipe_id) {
                return Err(AppError::non_field("The recipe is not in the shopping cart."));
            }
            tables
                .shopping_cart
                .retain(|s| !(s.user_id == user_id && s.recipe_id == recipe_id));
            Ok(())
        })
        .await
    }

    /// Text report of the summed ingredients of every recipe in the user's cart.
    pub async fn shopping_cart_report(&self, user_id: i64) -> String {
        let guard = self.tables.read().await;
        let tables: &Tables = &guard;
        let items = tables
            .shopping_cart
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .flat_map(|entry| {
                tables
                    .recipe_ingredients
                    .iter()
                    .filter(move |ri| ri.recipe_id == entry.recipe_id)
            })
            .filter_map(|ri| {
                tables
                    .ingredients
                    .iter()
                    .find(|i| i.id == ri.ingredient_id)
                    .map(|i| CartItem {
                        ingredient_id: i.id,
                        name: &i.name,
                        measurement_unit: &i.measurement_unit,
                        amount: ri.amount,
                    })
            });
        shopping_cart::render(&shopping_cart::aggregate(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user_models::NewUser;

    async fn seeded() -> (Storage, i64) {
        let storage = Storage::in_memory();
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
            .unwrap();
        storage
            .import_ingredients(vec![
                NewIngredient {
                    name: "Flour".to_string(),
                    measurement_unit: "g".to_string(),
                },
                NewIngredient {
                    name: "Egg".to_string(),
                    measurement_unit: "pcs".to_string(),
                },
            ])
            .await
            .unwrap();
        let user = storage
            .create_user(
                NewUser {
                    email: "cook@example.com".to_string(),
                    username: "cook".to_string(),
                    first_name: "Anna".to_string(),
                    last_name: "Smith".to_string(),
                    password: String::new(),
                },
                "hash".to_string(),
            )
            .await
            .unwrap();
        (storage, user.id)
    }

    fn draft(name: &str, ingredients: Vec<(i64, u32)>, tags: Vec<i64>) -> RecipeDraft {
        RecipeDraft {
            name: name.to_string(),
            text: "Cook it.".to_string(),
            cooking_time: 15,
            ingredients,
            tags,
        }
    }

    #[tokio::test]
    async fn import_skips_existing_rows() {
        let (storage, _) = seeded().await;
        let created = storage
            .import_tags(vec![NewTag {
                name: "Breakfast".to_string(),
                slug: "breakfast".to_string(),
            }])
            .await
            .unwrap();
        assert_eq!(created, 0);
        assert_eq!(storage.list_tags().await.len(), 2);
    }

    #[tokio::test]
    async fn ingredient_search_is_a_case_insensitive_prefix() {
        let (storage, _) = seeded().await;
        let found = storage.list_ingredients(Some("fl")).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Flour");
        assert_eq!(storage.list_ingredients(None).await.len(), 2);
    }

    #[tokio::test]
    async fn unknown_catalog_ids_are_rejected() {
        let (storage, user) = seeded().await;
        match storage
            .create_recipe(user, draft("Toast", vec![(99, 1)], vec![1]), None)
            .await
        {
            Err(AppError::Validation(errors)) => assert!(errors.get("ingredients").is_some()),
            other => panic!("expected validation error, got {:?}", other.map(|r| r.id)),
        }
    }

    #[tokio::test]
    async fn favorites_are_unique_per_pair() {
        let (storage, user) = seeded().await;
        let recipe = storage
            .create_recipe(user, draft("Toast", vec![(1, 10)], vec![1]), None)
            .await
            .unwrap();

        storage.add_favorite(user, recipe.id).await.unwrap();
        assert!(matches!(
            storage.add_favorite(user, recipe.id).await,
            Err(AppError::Validation(_))
        ));
        assert!(storage.get_recipe(recipe.id, Some(user)).await.unwrap().is_favorited);
        assert!(!storage.get_recipe(recipe.id, None).await.unwrap().is_favorited);
    }

    #[tokio::test]
    async fn cart_entries_are_unique_per_pair() {
        let (storage, user) = seeded().await;
        let recipe = storage
            .create_recipe(user, draft("Toast", vec![(1, 10)], vec![1]), None)
            .await
            .unwrap();

        storage.add_to_cart(user, recipe.id).await.unwrap();
        assert!(storage.add_to_cart(user, recipe.id).await.is_err());
        storage.remove_from_cart(user, recipe.id).await.unwrap();
        assert!(storage.remove_from_cart(user, recipe.id).await.is_err());
    }

    #[tokio::test]
    async fn cart_report_sums_shared_ingredients() {
        let (storage, user) = seeded().await;
        let a = storage
            .create_recipe(user, draft("Bread", vec![(1, 100), (2, 1)], vec![1]), None)
            .await
            .unwrap();
        let b = storage
            .create_recipe(user, draft("Cake", vec![(1, 50)], vec![2]), None)
            .await
            .unwrap();
        storage.add_to_cart(user, a.id).await.unwrap();
        storage.add_to_cart(user, b.id).await.unwrap();

        assert_eq!(
            storage.shopping_cart_report(user).await,
            "Flour: 150 g\nEgg: 1 pcs"
        );
    }

    #[tokio::test]
    async fn deleting_a_recipe_cascades() {
        let (storage, user) = seeded().await;
        let recipe = storage
            .create_recipe(user, draft("Toast", vec![(1, 10), (2, 2)], vec![1, 2]), None)
            .await
            .unwrap();
        storage.add_favorite(user, recipe.id).await.unwrap();
        storage.add_to_cart(user, recipe.id).await.unwrap();

        storage.delete_recipe(recipe.id, user).await.unwrap();

        let tables = storage.tables.read().await;
        assert!(tables.recipes.is_empty());
        assert!(tables.recipe_ingredients.is_empty());
        assert!(tables.recipe_tags.is_empty());
        assert!(tables.favorites.is_empty());
        assert!(tables.shopping_cart.is_empty());
    }

    #[tokio::test]
    async fn only_the_author_may_change_a_recipe() {
        let (storage, user) = seeded().await;
        let recipe = storage
            .create_recipe(user, draft("Toast", vec![(1, 10)], vec![1]), None)
            .await
            .unwrap();

        let other = user + 100;
        assert!(matches!(
            storage.delete_recipe(recipe.id, other).await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            storage
                .update_recipe(recipe.id, other, RecipeChanges::default())
                .await,
            Err(AppError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn update_replaces_join_rows() {
        let (storage, user) = seeded().await;
        let recipe = storage
            .create_recipe(user, draft("Toast", vec![(1, 10)], vec![1]), None)
            .await
            .unwrap();

        let changes = RecipeChanges {
            ingredients: Some(vec![(2, 3)]),
            tags: Some(vec![2]),
            cooking_time: Some(45),
            ..Default::default()
        };
        let (updated, replaced) = storage.update_recipe(recipe.id, user, changes).await.unwrap();

        assert!(replaced.is_none());
        assert_eq!(updated.cooking_time, 45);
        assert_eq!(updated.ingredients.len(), 1);
        assert_eq!(updated.ingredients[0].name, "Egg");
        assert_eq!(updated.tags[0].slug, "dinner");
    }

    #[tokio::test]
    async fn listing_filters_by_tag_and_author() {
        let (storage, user) = seeded().await;
        storage
            .create_recipe(user, draft("Porridge", vec![(1, 10)], vec![1]), None)
            .await
            .unwrap();
        storage
            .create_recipe(user, draft("Stew", vec![(2, 1)], vec![2]), None)
            .await
            .unwrap();
        let window = Window { limit: 10, offset: 0 };

        let filter = RecipeFilter {
            tags: vec!["dinner".to_string()],
            ..Default::default()
        };
        let (count, recipes) = storage.list_recipes(&filter, None, window).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(recipes[0].name, "Stew");

        let filter = RecipeFilter {
            author: Some(user + 1),
            ..Default::default()
        };
        let (count, _) = storage.list_recipes(&filter, None, window).await.unwrap();
        assert_eq!(count, 0);

        let (count, recipes) = storage
            .list_recipes(&RecipeFilter::default(), None, window)
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(recipes[0].name, "Stew");
    }

    #[tokio::test]
    async fn persists_to_the_data_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");

        let storage = Storage::open(&path).unwrap();
        storage
            .import_ingredients(vec![NewIngredient {
                name: "Salt".to_string(),
                measurement_unit: "g".to_string(),
            }])
            .await
            .unwrap();
        drop(storage);

        let reopened = Storage::open(&path).unwrap();
        let ingredients = reopened.list_ingredients(None).await;
        assert_eq!(ingredients.len(), 1);
        assert_eq!(ingredients[0].id, 1);
    }

    #[tokio::test]
    async fn failed_write_leaves_tables_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path().join("missing").join("data.json")).unwrap();

        let result = storage
            .import_ingredients(vec![NewIngredient {
                name: "Salt".to_string(),
                measurement_unit: "g".to_string(),
            }])
            .await;
        assert!(matches!(result, Err(AppError::Internal(_))));
        assert!(storage.list_ingredients(None).await.is_empty());
        assert_eq!(storage.tables.read().await.sequences.ingredients, 0);
    }
}
