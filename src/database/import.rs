use std::{
    fmt::{self, Display},
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Deserialize};
use sqlx::{Pool, Postgres, Transaction};

use crate::{
    cryptography::hash_password,
    schema::{UserRole, Uuid},
};

/// Tables whose ids may come from the data files; their sequences are moved past the imported ids.
const SEQUENCE_TABLES: &[&str] = &["users", "ingredients", "tags", "recipes"];

#[derive(Debug)]
pub struct ImportError {
    info: String,
}

impl ImportError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Import failed: {}", self.info)
    }
}

impl std::error::Error for ImportError {}

impl From<csv::Error> for ImportError {
    fn from(value: csv::Error) -> Self {
        Self::new(format!("{value}"))
    }
}

impl From<sqlx::Error> for ImportError {
    fn from(value: sqlx::Error) -> Self {
        Self::new(format!("{value}"))
    }
}

impl From<argon2::password_hash::Error> for ImportError {
    fn from(value: argon2::password_hash::Error) -> Self {
        Self::new(format!("Could not hash password: {value}"))
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct UserRecord {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<UserRole>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct IngredientRecord {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct TagRecord {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct RecipeRecord {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(alias = "author_id")]
    pub author: Uuid,
    pub name: String,
    pub text: String,
    #[serde(default)]
    pub image: String,
    pub cooking_time: i32,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct TagRecipeRecord {
    #[serde(alias = "tag_id")]
    pub tag: Uuid,
    #[serde(alias = "recipe_id")]
    pub recipe: Uuid,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct IngredientRecipeRecord {
    #[serde(alias = "ingredient_id")]
    pub ingredient: Uuid,
    #[serde(alias = "recipe_id")]
    pub recipe: Uuid,
    pub amount: i32,
}

/// Rows read from one data file and how many of them were new.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportCount {
    pub model: &'static str,
    pub read: usize,
    pub created: u64,
}

/// `IngredientRecipe` -> `<dir>/ingredient_recipe.csv`
pub fn model_file(dir: &Path, model: &str) -> PathBuf {
    let mut name = String::new();
    for (i, c) in model.chars().enumerate() {
        if c.is_uppercase() && i > 0 {
            name.push('_');
        }
        name.extend(c.to_lowercase());
    }
    dir.join(format!("{name}.csv"))
}

pub fn parse_records<T: DeserializeOwned, R: Read>(reader: R) -> Result<Vec<T>, ImportError> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
        .deserialize()
        .map(|record| record.map_err(ImportError::from))
        .collect()
}

fn read_records<T: DeserializeOwned>(dir: &Path, model: &str) -> Result<Vec<T>, ImportError> {
    let path = model_file(dir, model);
    let file = File::open(&path).map_err(|e| {
        ImportError::new(format!("Could not open {} for {model}: {e}", path.display()))
    })?;

    parse_records(file)
        .map_err(|e| ImportError::new(format!("{} ({model}): {}", path.display(), e.info)))
}

/// Plain passwords are hashed; stored argon2 hashes are kept.
fn stored_password(password: &str) -> Result<String, ImportError> {
    if password.starts_with("$argon2") {
        return Ok(password.to_string());
    }
    Ok(hash_password(password)?)
}

async fn insert_users(
    records: &[UserRecord],
    tr: &mut Transaction<'_, Postgres>,
) -> Result<u64, ImportError> {
    let mut created = 0;
    for record in records.iter() {
        created += sqlx::query(
            "
            INSERT INTO users (id, email, username, first_name, last_name, password, role)
            VALUES (COALESCE($1, nextval(pg_get_serial_sequence('users', 'id'))), $2, $3, $4, $5, $6, $7)
            ON CONFLICT DO NOTHING
        ",
        )
        .bind(record.id)
        .bind(record.email.trim().to_lowercase())
        .bind(&record.username)
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(stored_password(&record.password)?)
        .bind(record.role.clone().unwrap_or(UserRole::User))
        .execute(&mut **tr)
        .await?
        .rows_affected();
    }
    Ok(created)
}

async fn insert_ingredients(
    records: &[IngredientRecord],
    tr: &mut Transaction<'_, Postgres>,
) -> Result<u64, ImportError> {
    let mut created = 0;
    for record in records.iter() {
        created += sqlx::query(
            "
            INSERT INTO ingredients (id, name, measurement_unit)
            VALUES (COALESCE($1, nextval(pg_get_serial_sequence('ingredients', 'id'))), $2, $3)
            ON CONFLICT DO NOTHING
        ",
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(&record.measurement_unit)
        .execute(&mut **tr)
        .await?
        .rows_affected();
    }
    Ok(created)
}

async fn insert_tags(
    records: &[TagRecord],
    tr: &mut Transaction<'_, Postgres>,
) -> Result<u64, ImportError> {
    let mut created = 0;
    for record in records.iter() {
        created += sqlx::query(
            "
            INSERT INTO tags (id, name, color, slug)
            VALUES (COALESCE($1, nextval(pg_get_serial_sequence('tags', 'id'))), $2, $3, $4)
            ON CONFLICT DO NOTHING
        ",
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(record.color.to_ascii_uppercase())
        .bind(&record.slug)
        .execute(&mut **tr)
        .await?
        .rows_affected();
    }
    Ok(created)
}

async fn insert_recipes(
    records: &[RecipeRecord],
    tr: &mut Transaction<'_, Postgres>,
) -> Result<u64, ImportError> {
    let mut created = 0;
    for record in records.iter() {
        created += sqlx::query(
            "
            INSERT INTO recipes (id, author_id, name, text, image, cooking_time)
            VALUES (COALESCE($1, nextval(pg_get_serial_sequence('recipes', 'id'))), $2, $3, $4, $5, $6)
            ON CONFLICT DO NOTHING
        ",
        )
        .bind(record.id)
        .bind(record.author)
        .bind(&record.name)
        .bind(&record.text)
        .bind(&record.image)
        .bind(record.cooking_time)
        .execute(&mut **tr)
        .await?
        .rows_affected();
    }
    Ok(created)
}

async fn insert_tag_recipes(
    records: &[TagRecipeRecord],
    tr: &mut Transaction<'_, Postgres>,
) -> Result<u64, ImportError> {
    let mut created = 0;
    for record in records.iter() {
        created += sqlx::query(
            "INSERT INTO tag_recipes (tag_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(record.tag)
        .bind(record.recipe)
        .execute(&mut **tr)
        .await?
        .rows_affected();
    }
    Ok(created)
}

async fn insert_ingredient_recipes(
    records: &[IngredientRecipeRecord],
    tr: &mut Transaction<'_, Postgres>,
) -> Result<u64, ImportError> {
    let mut created = 0;
    for record in records.iter() {
        created += sqlx::query(
            "
            INSERT INTO ingredient_recipes (ingredient_id, recipe_id, amount)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
        ",
        )
        .bind(record.ingredient)
        .bind(record.recipe)
        .bind(record.amount)
        .execute(&mut **tr)
        .await?
        .rows_affected();
    }
    Ok(created)
}

async fn reset_sequences(tr: &mut Transaction<'_, Postgres>) -> Result<(), ImportError> {
    for table in SEQUENCE_TABLES.iter() {
        sqlx::query(&format!(
            "SELECT setval(pg_get_serial_sequence('{table}', 'id'), COALESCE((SELECT MAX(id) FROM {table}), 0) + 1, false)"
        ))
        .execute(&mut **tr)
        .await?;
    }
    Ok(())
}

/// Loads `user`, `ingredient`, `tag`, `recipe`, `tag_recipe` and `ingredient_recipe` CSV files
/// from `dir` in one transaction. Rows that already exist are skipped.
pub async fn import_data(dir: &Path, pool: &Pool<Postgres>) -> Result<Vec<ImportCount>, ImportError> {
    let users: Vec<UserRecord> = read_records(dir, "User")?;
    let ingredients: Vec<IngredientRecord> = read_records(dir, "Ingredient")?;
    let tags: Vec<TagRecord> = read_records(dir, "Tag")?;
    let recipes: Vec<RecipeRecord> = read_records(dir, "Recipe")?;
    let tag_recipes: Vec<TagRecipeRecord> = read_records(dir, "TagRecipe")?;
    let ingredient_recipes: Vec<IngredientRecipeRecord> = read_records(dir, "IngredientRecipe")?;

    let mut tr = pool.begin().await?;

    let summary = vec![
        ImportCount {
            model: "User",
            read: users.len(),
            created: insert_users(&users, &mut tr).await?,
        },
        ImportCount {
            model: "Ingredient",
            read: ingredients.len(),
            created: insert_ingredients(&ingredients, &mut tr).await?,
        },
        ImportCount {
            model: "Tag",
            read: tags.len(),
            created: insert_tags(&tags, &mut tr).await?,
        },
        ImportCount {
            model: "Recipe",
            read: recipes.len(),
            created: insert_recipes(&recipes, &mut tr).await?,
        },
        ImportCount {
            model: "TagRecipe",
            read: tag_recipes.len(),
            created: insert_tag_recipes(&tag_recipes, &mut tr).await?,
        },
        ImportCount {
            model: "IngredientRecipe",
            read: ingredient_recipes.len(),
            created: insert_ingredient_recipes(&ingredient_recipes, &mut tr).await?,
        },
    ];

    reset_sequences(&mut tr).await?;
    tr.commit().await?;

    for count in summary.iter() {
        log::info!("{:<16}: {:>4} read, {:>4} created", count.model, count.read, count.created);
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_follow_model_names() {
        let dir = Path::new("data");

        assert_eq!(model_file(dir, "User"), PathBuf::from("data/user.csv"));
        assert_eq!(model_file(dir, "TagRecipe"), PathBuf::from("data/tag_recipe.csv"));
        assert_eq!(
            model_file(dir, "IngredientRecipe"),
            PathBuf::from("data/ingredient_recipe.csv")
        );
    }

    #[test]
    fn optional_columns_may_be_missing_or_empty() {
        let data = "\
id,email,username,first_name,last_name,password
1,chef@example.com,chef,Julia,Child,s3cret-sauce
,cook@example.com,cook,Jamie,Oliver,pa55word
";
        let users: Vec<UserRecord> = parse_records(data.as_bytes()).unwrap();

        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id, Some(1));
        assert_eq!(users[1].id, None);
        assert_eq!(users[1].role, None);
    }

    #[test]
    fn relation_columns_accept_id_suffix() {
        let data = "\
ingredient_id,recipe,amount
3,1,200
";
        let rows: Vec<IngredientRecipeRecord> = parse_records(data.as_bytes()).unwrap();

        assert_eq!(
            rows,
            vec![IngredientRecipeRecord {
                ingredient: 3,
                recipe: 1,
                amount: 200
            }]
        );
    }

    #[test]
    fn malformed_row_is_an_error() {
        let data = "\
author,name,text,cooking_time
1,Pancakes,Mix and fry.,soon
";
        assert!(parse_records::<RecipeRecord, _>(data.as_bytes()).is_err());
    }

    #[test]
    fn argon2_hashes_are_kept() {
        let hash = hash_password("s3cret-sauce").unwrap();

        assert_eq!(stored_password(&hash).unwrap(), hash);
        assert!(stored_password("s3cret-sauce").unwrap().starts_with("$argon2"));
    }

    #[test]
    fn missing_file_names_the_model() {
        let error = read_records::<TagRecord>(Path::new("no-such-dir"), "Tag").unwrap_err();
        assert!(error.to_string().contains("tag.csv"));
    }
}
