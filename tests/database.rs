//! Runs against the database named by `DATABASE_URL`; every test is skipped when it is unset.

use std::path::PathBuf;

use foodgram::{
    actions::recipes::{create_recipe, get_recipe, update_recipe},
    error::status_of,
    import::import_data,
    jwt::{JwtSessionData, SessionData},
    schema::{UserRole, Uuid},
    validation::RecipeChanges,
};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

async fn pool() -> Option<Pool<Postgres>> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    Some(pool)
}

fn unique(prefix: &str) -> String {
    format!("{prefix}{}", uuid::Uuid::new_v4().simple())
}

async fn session(pool: &Pool<Postgres>) -> SessionData {
    let username = unique("cook");
    let (id,): (Uuid,) = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, 'Julia', 'Child', 'unused')
        RETURNING id
    ",
    )
    .bind(format!("{username}@example.com"))
    .bind(&username)
    .fetch_one(pool)
    .await
    .unwrap();

    JwtSessionData::new(id, username, UserRole::User).into()
}

async fn ingredient(pool: &Pool<Postgres>) -> Uuid {
    let (id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, 'g') RETURNING id",
    )
    .bind(unique("flour"))
    .fetch_one(pool)
    .await
    .unwrap();

    id
}

fn changes(name: &str, ingredients: Vec<(Uuid, i32)>) -> RecipeChanges {
    RecipeChanges {
        name: Some(name.to_string()),
        text: Some(String::from("Mix and bake.")),
        image: None,
        cooking_time: Some(30),
        tags: Some(vec![]),
        ingredients: Some(ingredients),
    }
}

fn media_root() -> PathBuf {
    PathBuf::from("target/test-media")
}

#[tokio::test]
async fn failed_create_leaves_no_recipe_behind() {
    let Some(pool) = pool().await else {
        return;
    };
    let session = session(&pool).await;

    let result = create_recipe(
        &session,
        changes("Bread", vec![(i32::MAX, 5)]),
        &media_root(),
        &pool,
    )
    .await;
    assert_eq!(status_of(&result.err().unwrap()), 400);

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
        .bind(session.user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn failed_update_keeps_stored_recipe() {
    let Some(pool) = pool().await else {
        return;
    };
    let session = session(&pool).await;
    let flour = ingredient(&pool).await;

    let recipe = create_recipe(&session, changes("Bread", vec![(flour, 500)]), &media_root(), &pool)
        .await
        .ok()
        .unwrap();

    let result = update_recipe(
        recipe.id,
        &session,
        changes("Flatbread", vec![(flour, 200), (i32::MAX, 5)]),
        &media_root(),
        &pool,
    )
    .await;
    assert_eq!(status_of(&result.err().unwrap()), 400);

    let stored = get_recipe(recipe.id, None, &pool).await.ok().unwrap();
    assert_eq!(stored.name, "Bread");
    assert_eq!(stored.ingredients.len(), 1);
    assert_eq!(stored.ingredients[0].amount, 500);
}

#[tokio::test]
async fn import_skips_existing_rows() {
    let Some(pool) = pool().await else {
        return;
    };
    let key = uuid::Uuid::new_v4().simple().to_string();
    let dir = PathBuf::from("target/test-import").join(&key);
    std::fs::create_dir_all(&dir).unwrap();

    let files = [
        (
            "user.csv",
            format!("email,username,first_name,last_name,password\nu{key}@example.com,u{key},Julia,Child,s3cret-sauce\n"),
        ),
        ("ingredient.csv", format!("name,measurement_unit\nflour {key},g\n")),
        (
            "tag.csv",
            format!("name,color,slug\ntag {key},#{},t{key}\n", &key[..6]),
        ),
        ("recipe.csv", String::from("author,name,text,image,cooking_time\n")),
        ("tag_recipe.csv", String::from("tag,recipe\n")),
        ("ingredient_recipe.csv", String::from("ingredient,recipe,amount\n")),
    ];
    for (name, content) in files.iter() {
        std::fs::write(dir.join(name), content).unwrap();
    }

    let first = import_data(&dir, &pool).await.unwrap();
    let created: Vec<u64> = first.iter().map(|count| count.created).collect();
    assert_eq!(created, vec![1, 1, 1, 0, 0, 0]);

    let second = import_data(&dir, &pool).await.unwrap();
    assert!(second.iter().all(|count| count.created == 0));
    assert_eq!(second[0].read, 1);
}
