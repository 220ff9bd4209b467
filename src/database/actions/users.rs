use std::collections::HashMap;

use potion::HtmlError;
use sqlx::{Pool, Postgres};

use crate::{
    authentication::cryptography::{hash_password, verify_password},
    constants::USER_COUNT_PER_PAGE,
    error::{NotFound, PermissionDenied, QueryError},
    form::Form,
    pagination::{PageContext, PageQuery},
    schema::{
        RecipeShort, RecipeShortRow, Subscription, SubscriptionRow, User, UserProfile, UserRow,
        Uuid,
    },
    validation::{PasswordForm, UserForm},
};

pub const USERS_PATH: &str = "/api/users/";
pub const SUBSCRIPTIONS_PATH: &str = "/api/users/subscriptions/";

pub async fn get_user_by_id(
    pool: &Pool<Postgres>,
    user_id: Uuid,
) -> Result<Option<User>, potion::Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Public profile of `user_id`, with `is_subscribed` computed for `requester`.
pub async fn get_user_profile(
    user_id: Uuid,
    requester: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<UserProfile, potion::Error> {
    let row: Option<UserProfile> = sqlx::query_as(
        "
        SELECT u.email, u.id, u.username, u.first_name, u.last_name,
            EXISTS (SELECT 1 FROM subscriptions s WHERE s.author_id = u.id AND s.user_id = $2) AS is_subscribed
        FROM users u
        WHERE u.id = $1
    ",
    )
    .bind(user_id)
    .bind(requester)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    row.ok_or_else(|| NotFound::new("No user exists with specified id").into())
}

pub async fn fetch_users(
    page: PageQuery,
    requester: Option<Uuid>,
    form: &Form,
    pool: &Pool<Postgres>,
) -> Result<PageContext<UserProfile>, potion::Error> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "
        SELECT u.email, u.id, u.username, u.first_name, u.last_name,
            EXISTS (SELECT 1 FROM subscriptions s WHERE s.author_id = u.id AND s.user_id = $1) AS is_subscribed,
            COUNT(*) OVER() AS count
        FROM users u
        ORDER BY u.id
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(requester)
    .bind(page.limit)
    .bind(page.offset()?)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let page = PageContext::from_rows(rows, total_count, page, USERS_PATH, form)?;

    Ok(page.map(UserProfile::from))
}

/// Creates a user from a validated registration form, storing an argon2 hash of the password.
pub async fn register_user(
    form: UserForm,
    pool: &Pool<Postgres>,
) -> Result<UserProfile, potion::Error> {
    let password = hash_password(&form.password).map_err(|e| {
        log::error!("Could not hash password: {e}");
        HtmlError::InternalServerError.new("Could not register user")
    })?;

    let user: UserProfile = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING email, id, username, first_name, last_name, false AS is_subscribed
    ",
    )
    .bind(&form.email)
    .bind(&form.username)
    .bind(&form.first_name)
    .bind(&form.last_name)
    .bind(password)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    log::info!("Registered user {} ({})", user.username, user.id);

    Ok(user)
}

pub async fn set_password(
    user_id: Uuid,
    form: PasswordForm,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    let user = get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| NotFound::new("No user exists with specified id"))?;

    let authenticated = verify_password(&form.current_password, &user.password).map_err(|e| {
        log::error!("Stored password hash of user {user_id} is malformed: {e}");
        HtmlError::InternalServerError.new("Could not verify password")
    })?;
    if !authenticated {
        return Err(PermissionDenied::new("Invalid current password.").into());
    }

    let password = hash_password(&form.new_password).map_err(|e| {
        log::error!("Could not hash password: {e}");
        HtmlError::InternalServerError.new("Could not set password")
    })?;

    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

/// Newest recipes of every author in `author_ids`, at most `recipes_limit` per author.
async fn list_author_recipes(
    author_ids: &[Uuid],
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<HashMap<Uuid, Vec<RecipeShort>>, potion::Error> {
    let rows: Vec<RecipeShortRow> = sqlx::query_as(
        "
        SELECT author_id, id, name, image, cooking_time
        FROM (
            SELECT r.*, ROW_NUMBER() OVER (PARTITION BY r.author_id ORDER BY r.created_at DESC, r.id DESC) AS position
            FROM recipes r
            WHERE r.author_id = ANY($1)
        ) ranked
        WHERE $2::BIGINT IS NULL OR position <= $2
        ORDER BY created_at DESC, id DESC
    ",
    )
    .bind(author_ids)
    .bind(recipes_limit)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut recipes: HashMap<Uuid, Vec<RecipeShort>> = HashMap::new();
    rows.into_iter().for_each(|row| {
        recipes.entry(row.author_id).or_default().push(row.into());
    });

    Ok(recipes)
}

fn into_subscription(row: SubscriptionRow, recipes: &mut HashMap<Uuid, Vec<RecipeShort>>) -> Subscription {
    Subscription {
        recipes: recipes.remove(&row.id).unwrap_or_default(),
        email: row.email,
        id: row.id,
        username: row.username,
        first_name: row.first_name,
        last_name: row.last_name,
        is_subscribed: true,
        recipes_count: row.recipes_count,
    }
}

pub async fn fetch_subscriptions(
    user_id: Uuid,
    page: PageQuery,
    recipes_limit: Option<i64>,
    form: &Form,
    pool: &Pool<Postgres>,
) -> Result<PageContext<Subscription>, potion::Error> {
    let rows: Vec<SubscriptionRow> = sqlx::query_as(
        "
        SELECT u.email, u.id, u.username, u.first_name, u.last_name,
            (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count,
            COUNT(*) OVER() AS count
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY s.created_at DESC, s.id DESC
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(user_id)
    .bind(page.limit)
    .bind(page.offset()?)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let author_ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let mut recipes = list_author_recipes(&author_ids, recipes_limit, pool).await?;

    let rows: Vec<Subscription> = rows
        .into_iter()
        .map(|row| into_subscription(row, &mut recipes))
        .collect();

    Ok(PageContext::from_rows(
        rows,
        total_count,
        page,
        SUBSCRIPTIONS_PATH,
        form,
    )?)
}

/// Followed author as returned right after subscribing.
pub async fn get_subscription(
    author_id: Uuid,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Subscription, potion::Error> {
    let row: Option<SubscriptionRow> = sqlx::query_as(
        "
        SELECT u.email, u.id, u.username, u.first_name, u.last_name,
            (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count,
            1::BIGINT AS count
        FROM users u
        WHERE u.id = $1
    ",
    )
    .bind(author_id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    let row = row.ok_or_else(|| NotFound::new("No user exists with specified id"))?;
    let mut recipes = list_author_recipes(&[author_id], recipes_limit, pool).await?;

    Ok(into_subscription(row, &mut recipes))
}

pub fn default_user_page(form: &Form) -> PageQuery {
    PageQuery::from_form(form, USER_COUNT_PER_PAGE)
}
