use serde::{Deserialize, Serialize, Serializer};

use crate::media::image_url;

pub type Uuid = i32;

#[derive(
    Clone, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub role: UserRole,
}

/// A user as seen by the requester.
#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq)]
pub struct UserProfile {
    pub email: String,
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct UserRow {
    pub email: String,
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,

    #[serde(skip)]
    pub count: i64,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        Self {
            email: row.email,
            id: row.id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            is_subscribed: row.is_subscribed,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
}

/// Ingredient line of a recipe, carrying the per-recipe amount.
#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq)]
pub struct RecipeIngredient {
    #[serde(skip)]
    pub recipe_id: Uuid,
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeTag {
    pub recipe_id: Uuid,
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl From<RecipeTag> for Tag {
    fn from(row: RecipeTag) -> Self {
        Self {
            id: row.id,
            name: row.name,
            color: row.color,
            slug: row.slug,
        }
    }
}

/// Recipe row annotated with the requester's favorite / cart flags.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeRow {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,

    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,

    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: Uuid,
    pub tags: Vec<Tag>,
    pub author: UserProfile,
    pub ingredients: Vec<RecipeIngredient>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    #[serde(serialize_with = "serialize_image")]
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq)]
pub struct RecipeShort {
    pub id: Uuid,
    pub name: String,
    #[serde(serialize_with = "serialize_image")]
    pub image: String,
    pub cooking_time: i32,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeShortRow {
    pub author_id: Uuid,
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl From<RecipeShortRow> for RecipeShort {
    fn from(row: RecipeShortRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            image: row.image,
            cooking_time: row.cooking_time,
        }
    }
}

/// A followed author with a preview of their recipes.
#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub email: String,
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub recipes: Vec<RecipeShort>,
    pub recipes_count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct SubscriptionRow {
    pub email: String,
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub recipes_count: i64,

    pub count: i64,
}

/// Ingredient line of a cart recipe, fed to the shopping list summary.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct CartIngredient {
    pub recipe_id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

fn serialize_image<S: Serializer>(path: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&image_url(path))
}
