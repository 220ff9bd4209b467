use std::{collections::HashMap, path::Path};

use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use crate::{
    authentication::permissions::ActionType,
    constants::RECIPE_COUNT_PER_PAGE,
    error::{NotFound, QueryError},
    filters::RecipeFilter,
    form::Form,
    jwt::SessionData,
    media::{remove_image, store_image},
    pagination::{PageContext, PageQuery},
    schema::{
        Recipe, RecipeIngredient, RecipeRow, RecipeShort, RecipeTag, Tag, UserProfile, Uuid,
    },
    validation::RecipeChanges,
};

pub const RECIPES_PATH: &str = "/api/recipes/";

/// Minimal recipe record used for ownership checks.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeOwner {
    pub id: Uuid,
    pub author_id: Uuid,
    pub image: String,
}

fn push_flag_filter(
    query_builder: &mut QueryBuilder<'_, Postgres>,
    table: &str,
    wanted: Option<bool>,
    requester: Option<Uuid>,
) {
    match (wanted, requester) {
        (Some(true), Some(user_id)) => {
            query_builder.push(format!(
                " AND EXISTS (SELECT 1 FROM {table} x WHERE x.recipe_id = r.id AND x.user_id = "
            ));
            query_builder.push_bind(user_id);
            query_builder.push(")");
        }
        (Some(true), None) => {
            query_builder.push(" AND FALSE");
        }
        (Some(false), Some(user_id)) => {
            query_builder.push(format!(
                " AND NOT EXISTS (SELECT 1 FROM {table} x WHERE x.recipe_id = r.id AND x.user_id = "
            ));
            query_builder.push_bind(user_id);
            query_builder.push(")");
        }
        (Some(false), None) | (None, _) => {}
    }
}

/// A recipe matches the tag filter when it carries any of the requested slugs.
fn push_tag_filter(query_builder: &mut QueryBuilder<'_, Postgres>, tags: &[String]) {
    if tags.is_empty() {
        return;
    }

    query_builder.push(
        " AND EXISTS (SELECT 1 FROM tag_recipes tr INNER JOIN tags t ON t.id = tr.tag_id WHERE tr.recipe_id = r.id AND t.slug = ANY(",
    );
    query_builder.push_bind(tags.to_vec());
    query_builder.push("))");
}

fn push_recipe_filter(
    query_builder: &mut QueryBuilder<'_, Postgres>,
    filter: &RecipeFilter,
    requester: Option<Uuid>,
) {
    if let Some(author) = filter.author {
        query_builder.push(" AND r.author_id = ");
        query_builder.push_bind(author);
    }

    push_tag_filter(query_builder, &filter.tags);
    push_flag_filter(query_builder, "favorite_recipes", filter.is_favorited, requester);
    push_flag_filter(query_builder, "cart_recipes", filter.is_in_shopping_cart, requester);
}

fn select_recipe_rows<'a>(requester: Option<Uuid>) -> QueryBuilder<'a, Postgres> {
    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT r.id, r.author_id, r.name, r.text, r.image, r.cooking_time, ",
    );
    query_builder.push(
        "EXISTS (SELECT 1 FROM favorite_recipes f WHERE f.recipe_id = r.id AND f.user_id = ",
    );
    query_builder.push_bind(requester);
    query_builder.push(") AS is_favorited, ");
    query_builder.push(
        "EXISTS (SELECT 1 FROM cart_recipes c WHERE c.recipe_id = r.id AND c.user_id = ",
    );
    query_builder.push_bind(requester);
    query_builder.push(") AS is_in_shopping_cart, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");

    query_builder
}

pub async fn fetch_recipes(
    filter: &RecipeFilter,
    requester: Option<Uuid>,
    page: PageQuery,
    form: &Form,
    pool: &Pool<Postgres>,
) -> Result<PageContext<Recipe>, potion::Error> {
    let offset = page.offset()?;
    let mut query_builder = select_recipe_rows(requester);
    push_recipe_filter(&mut query_builder, filter, requester);

    query_builder.push(" ORDER BY r.created_at DESC, r.id DESC LIMIT ");
    query_builder.push_bind(page.limit);
    query_builder.push(" OFFSET ");
    query_builder.push_bind(offset);

    let rows: Vec<RecipeRow> = query_builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let recipes = hydrate_recipes(rows, requester, pool).await?;

    Ok(PageContext::from_rows(
        recipes,
        total_count,
        page,
        RECIPES_PATH,
        form,
    )?)
}

pub fn default_recipe_page(form: &Form) -> PageQuery {
    PageQuery::from_form(form, RECIPE_COUNT_PER_PAGE)
}

pub async fn get_recipe(
    id: Uuid,
    requester: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<Recipe, potion::Error> {
    let mut query_builder = select_recipe_rows(requester);
    query_builder.push(" AND r.id = ");
    query_builder.push_bind(id);

    let row: Option<RecipeRow> = query_builder
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    let row = row.ok_or_else(|| NotFound::new("No recipe exists with specified id"))?;

    hydrate_recipes(vec![row], requester, pool)
        .await?
        .pop()
        .ok_or_else(|| NotFound::new("No recipe exists with specified id").into())
}

pub async fn get_recipe_short(id: Uuid, pool: &Pool<Postgres>) -> Result<RecipeShort, potion::Error> {
    let row: Option<RecipeShort> =
        sqlx::query_as("SELECT id, name, image, cooking_time FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    row.ok_or_else(|| NotFound::new("No recipe exists with specified id").into())
}

/// Loads a recipe for mutation: only its author or an admin may change it.
pub async fn get_recipe_mut(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<RecipeOwner, potion::Error> {
    let recipe: Option<RecipeOwner> =
        sqlx::query_as("SELECT id, author_id, image FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    let recipe = recipe.ok_or_else(|| NotFound::new("No recipe exists with specified id"))?;
    session.authenticate_owner(
        recipe.author_id,
        ActionType::ManageOwnRecipes,
        ActionType::ManageAllRecipes,
    )?;

    Ok(recipe)
}

async fn hydrate_recipes(
    rows: Vec<RecipeRow>,
    requester: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Recipe>, potion::Error> {
    if rows.is_empty() {
        return Ok(vec![]);
    }

    let recipe_ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let author_ids: Vec<Uuid> = rows.iter().map(|row| row.author_id).collect();

    let tags: Vec<RecipeTag> = sqlx::query_as(
        "
        SELECT tr.recipe_id, t.id, t.name, t.color, t.slug
        FROM tag_recipes tr
        INNER JOIN tags t ON t.id = tr.tag_id
        WHERE tr.recipe_id = ANY($1)
        ORDER BY t.name
    ",
    )
    .bind(&recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let ingredients: Vec<RecipeIngredient> = sqlx::query_as(
        "
        SELECT ir.recipe_id, i.id, i.name, i.measurement_unit, ir.amount
        FROM ingredient_recipes ir
        INNER JOIN ingredients i ON i.id = ir.ingredient_id
        WHERE ir.recipe_id = ANY($1)
        ORDER BY ir.id
    ",
    )
    .bind(&recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let authors: Vec<UserProfile> = sqlx::query_as(
        "
        SELECT u.email, u.id, u.username, u.first_name, u.last_name,
            EXISTS (SELECT 1 FROM subscriptions s WHERE s.author_id = u.id AND s.user_id = $2) AS is_subscribed
        FROM users u
        WHERE u.id = ANY($1)
    ",
    )
    .bind(&author_ids)
    .bind(requester)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(assemble_recipes(rows, tags, ingredients, authors))
}

/// Joins recipe rows with their tags, ingredient lines and authors, keeping row order.
pub fn assemble_recipes(
    rows: Vec<RecipeRow>,
    tags: Vec<RecipeTag>,
    ingredients: Vec<RecipeIngredient>,
    authors: Vec<UserProfile>,
) -> Vec<Recipe> {
    let mut tags_by_recipe: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    tags.into_iter().for_each(|tag| {
        tags_by_recipe.entry(tag.recipe_id).or_default().push(tag.into());
    });

    let mut ingredients_by_recipe: HashMap<Uuid, Vec<RecipeIngredient>> = HashMap::new();
    ingredients.into_iter().for_each(|ingredient| {
        ingredients_by_recipe
            .entry(ingredient.recipe_id)
            .or_default()
            .push(ingredient);
    });

    let authors: HashMap<Uuid, UserProfile> = authors
        .into_iter()
        .map(|author| (author.id, author))
        .collect();

    rows.into_iter()
        .filter_map(|row| {
            let author = authors.get(&row.author_id)?.clone();
            Some(Recipe {
                id: row.id,
                tags: tags_by_recipe.remove(&row.id).unwrap_or_default(),
                author,
                ingredients: ingredients_by_recipe.remove(&row.id).unwrap_or_default(),
                is_favorited: row.is_favorited,
                is_in_shopping_cart: row.is_in_shopping_cart,
                name: row.name,
                image: row.image,
                text: row.text,
                cooking_time: row.cooking_time,
            })
        })
        .collect()
}

async fn insert_recipe_tags(
    recipe_id: Uuid,
    tags: &[Uuid],
    tr: &mut Transaction<'_, Postgres>,
) -> Result<(), potion::Error> {
    if tags.is_empty() {
        return Ok(());
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO tag_recipes (tag_id, recipe_id) ");
    query_builder.push_values(tags.iter(), |mut b, tag_id| {
        b.push_bind(*tag_id).push_bind(recipe_id);
    });

    query_builder
        .build()
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

async fn insert_recipe_ingredients(
    recipe_id: Uuid,
    ingredients: &[(Uuid, i32)],
    tr: &mut Transaction<'_, Postgres>,
) -> Result<(), potion::Error> {
    if ingredients.is_empty() {
        return Ok(());
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO ingredient_recipes (ingredient_id, recipe_id, amount) ");
    query_builder.push_values(ingredients.iter(), |mut b, (ingredient_id, amount)| {
        b.push_bind(*ingredient_id)
            .push_bind(recipe_id)
            .push_bind(*amount);
    });

    query_builder
        .build()
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

async fn begin(pool: &Pool<Postgres>) -> Result<Transaction<'static, Postgres>, potion::Error> {
    Ok(pool.begin().await.map_err(QueryError::from)?)
}

async fn commit(tr: Transaction<'_, Postgres>) -> Result<(), potion::Error> {
    Ok(tr.commit().await.map_err(QueryError::from)?)
}

async fn write_new_recipe(
    author_id: Uuid,
    changes: &RecipeChanges,
    image: &str,
    pool: &Pool<Postgres>,
) -> Result<Uuid, potion::Error> {
    let mut tr = begin(pool).await?;

    let id: (Uuid,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, image, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(&changes.name)
    .bind(&changes.text)
    .bind(image)
    .bind(changes.cooking_time)
    .fetch_one(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    let recipe_id = id.0;
    insert_recipe_tags(recipe_id, changes.tags.as_deref().unwrap_or_default(), &mut tr).await?;
    insert_recipe_ingredients(
        recipe_id,
        changes.ingredients.as_deref().unwrap_or_default(),
        &mut tr,
    )
    .await?;

    commit(tr).await?;

    Ok(recipe_id)
}

/// Creates a recipe with its tag and ingredient rows in one transaction.
pub async fn create_recipe(
    session: &SessionData,
    mut changes: RecipeChanges,
    media_root: &Path,
    pool: &Pool<Postgres>,
) -> Result<Recipe, potion::Error> {
    session.authenticate(ActionType::CreateRecipes)?;

    let image = match changes.image.take() {
        Some(image) => store_image(media_root, session.user_id, image).await?,
        None => String::new(),
    };

    let recipe_id = match write_new_recipe(session.user_id, &changes, &image, pool).await {
        Ok(recipe_id) => recipe_id,
        Err(e) => {
            remove_image(media_root, &image).await;
            return Err(e);
        }
    };

    log::info!("{} created recipe {recipe_id}", session.username);

    get_recipe(recipe_id, Some(session.user_id), pool).await
}

async fn write_recipe_changes(
    recipe_id: Uuid,
    changes: &RecipeChanges,
    image: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    let mut tr = begin(pool).await?;

    sqlx::query(
        "
        UPDATE recipes SET
            name = COALESCE($2, name),
            text = COALESCE($3, text),
            image = COALESCE($4, image),
            cooking_time = COALESCE($5, cooking_time)
        WHERE id = $1
    ",
    )
    .bind(recipe_id)
    .bind(&changes.name)
    .bind(&changes.text)
    .bind(image)
    .bind(changes.cooking_time)
    .execute(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    if let Some(tags) = &changes.tags {
        sqlx::query("DELETE FROM tag_recipes WHERE recipe_id = $1")
            .bind(recipe_id)
            .execute(&mut *tr)
            .await
            .map_err(QueryError::from)?;
        insert_recipe_tags(recipe_id, tags, &mut tr).await?;
    }

    if let Some(ingredients) = &changes.ingredients {
        sqlx::query("DELETE FROM ingredient_recipes WHERE recipe_id = $1")
            .bind(recipe_id)
            .execute(&mut *tr)
            .await
            .map_err(QueryError::from)?;
        insert_recipe_ingredients(recipe_id, ingredients, &mut tr).await?;
    }

    commit(tr).await
}

/// Applies a partial update. Tag and ingredient lists, when given, replace the stored ones.
pub async fn update_recipe(
    id: Uuid,
    session: &SessionData,
    mut changes: RecipeChanges,
    media_root: &Path,
    pool: &Pool<Postgres>,
) -> Result<Recipe, potion::Error> {
    let recipe = get_recipe_mut(id, session, pool).await?;

    let image = match changes.image.take() {
        Some(image) => Some(store_image(media_root, recipe.author_id, image).await?),
        None => None,
    };

    if let Err(e) = write_recipe_changes(recipe.id, &changes, image.as_deref(), pool).await {
        if let Some(image) = &image {
            remove_image(media_root, image).await;
        }
        return Err(e);
    }

    if image.is_some() {
        remove_image(media_root, &recipe.image).await;
    }

    get_recipe(recipe.id, Some(session.user_id), pool).await
}

pub async fn delete_recipe(
    id: Uuid,
    session: &SessionData,
    media_root: &Path,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    let recipe = get_recipe_mut(id, session, pool).await?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(recipe.id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    remove_image(media_root, &recipe.image).await;
    log::info!("{} deleted recipe {}", session.username, recipe.id);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: Uuid, author_id: Uuid) -> RecipeRow {
        RecipeRow {
            id,
            author_id,
            name: format!("Recipe {id}"),
            text: String::from("Cook it."),
            image: format!("recipes/images/{author_id}/{id}.png"),
            cooking_time: 10,
            is_favorited: id == 1,
            is_in_shopping_cart: false,
            count: 2,
        }
    }

    fn author(id: Uuid) -> UserProfile {
        UserProfile {
            email: format!("user{id}@example.com"),
            id,
            username: format!("user{id}"),
            first_name: String::from("First"),
            last_name: String::from("Last"),
            is_subscribed: false,
        }
    }

    fn tag(recipe_id: Uuid, id: Uuid, slug: &str) -> RecipeTag {
        RecipeTag {
            recipe_id,
            id,
            name: slug.to_uppercase(),
            color: String::from("#FFFFFF"),
            slug: slug.to_string(),
        }
    }

    fn line(recipe_id: Uuid, id: Uuid, amount: i32) -> RecipeIngredient {
        RecipeIngredient {
            recipe_id,
            id,
            name: format!("ingredient {id}"),
            measurement_unit: String::from("g"),
            amount,
        }
    }

    #[test]
    fn assembles_relations_per_recipe() {
        let recipes = assemble_recipes(
            vec![row(2, 10), row(1, 11)],
            vec![tag(1, 5, "lunch"), tag(2, 6, "dinner"), tag(1, 7, "quick")],
            vec![line(2, 3, 100), line(1, 4, 5), line(2, 8, 1)],
            vec![author(10), author(11)],
        );

        assert_eq!(recipes.len(), 2);
        assert_eq!(recipes[0].id, 2);
        assert_eq!(recipes[0].author.id, 10);
        assert_eq!(recipes[0].tags.len(), 1);
        assert_eq!(recipes[0].ingredients.iter().map(|i| i.id).collect::<Vec<_>>(), vec![3, 8]);

        assert_eq!(recipes[1].id, 1);
        assert!(recipes[1].is_favorited);
        assert_eq!(
            recipes[1].tags.iter().map(|t| t.slug.as_str()).collect::<Vec<_>>(),
            vec!["lunch", "quick"]
        );
    }

    #[test]
    fn serializes_public_shape() {
        let recipe = assemble_recipes(
            vec![row(1, 10)],
            vec![tag(1, 5, "lunch")],
            vec![line(1, 4, 5)],
            vec![author(10)],
        )
        .remove(0);

        let value = serde_json::to_value(&recipe).unwrap();

        assert_eq!(value["image"], "/media/recipes/images/10/1.png");
        assert_eq!(value["author"]["username"], "user10");
        assert_eq!(value["ingredients"][0]["amount"], 5);
        assert!(value["ingredients"][0].get("recipe_id").is_none());
        assert_eq!(value["is_favorited"], true);
        assert_eq!(value["tags"][0]["slug"], "lunch");
    }

    #[test]
    fn flag_filter_for_anonymous_requester() {
        let mut query_builder = select_recipe_rows(None);
        push_flag_filter(&mut query_builder, "favorite_recipes", Some(true), None);
        push_flag_filter(&mut query_builder, "cart_recipes", Some(false), None);

        let sql = query_builder.sql();
        assert!(sql.ends_with("WHERE TRUE AND FALSE"));
    }

    #[test]
    fn flag_filter_for_user() {
        let mut query_builder = select_recipe_rows(Some(3));
        push_flag_filter(&mut query_builder, "cart_recipes", Some(false), Some(3));

        assert!(query_builder
            .sql()
            .contains("AND NOT EXISTS (SELECT 1 FROM cart_recipes x WHERE x.recipe_id = r.id"));
    }

    #[test]
    fn tag_filter_matches_any_slug() {
        let filter = RecipeFilter::from_form(&Form::from_pairs(&[
            ("tags", "lunch"),
            ("tags", "dinner"),
            ("author", "4"),
        ]));
        let mut query_builder = select_recipe_rows(None);
        push_recipe_filter(&mut query_builder, &filter, None);

        let sql = query_builder.sql();
        assert!(sql.contains("AND r.author_id = $3"));
        assert!(sql.contains("WHERE tr.recipe_id = r.id AND t.slug = ANY($4))"));
        assert_eq!(sql.matches("t.slug").count(), 1);
    }

    #[test]
    fn no_tags_add_no_clause() {
        let mut query_builder = select_recipe_rows(None);
        push_tag_filter(&mut query_builder, &[]);

        assert!(query_builder.sql().ends_with("WHERE TRUE"));
    }
}
