use sqlx::{Pool, Postgres};

use crate::{
    error::{NotFound, QueryError},
    schema::{Tag, Uuid},
    validation::TagForm,
};

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, potion::Error> {
    let list: Vec<Tag> = sqlx::query_as("SELECT id, name, color, slug FROM tags ORDER BY name")
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(list)
}

pub async fn get_tag(id: Uuid, pool: &Pool<Postgres>) -> Result<Tag, potion::Error> {
    let tag: Option<Tag> = sqlx::query_as("SELECT id, name, color, slug FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    tag.ok_or_else(|| NotFound::new("No tag exists with specified id").into())
}

pub async fn create_tag(form: TagForm, pool: &Pool<Postgres>) -> Result<Tag, potion::Error> {
    let tag: Tag = sqlx::query_as(
        "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) RETURNING id, name, color, slug",
    )
    .bind(form.name)
    .bind(form.color)
    .bind(form.slug)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    log::info!("Created tag {} ({})", tag.slug, tag.id);

    Ok(tag)
}

/// Applies the fields present in `form`, keeping the others.
pub async fn update_tag(id: Uuid, form: TagForm, pool: &Pool<Postgres>) -> Result<Tag, potion::Error> {
    let tag: Option<Tag> = sqlx::query_as(
        "
        UPDATE tags SET
            name = COALESCE($2, name),
            color = COALESCE($3, color),
            slug = COALESCE($4, slug)
        WHERE id = $1
        RETURNING id, name, color, slug
    ",
    )
    .bind(id)
    .bind(form.name)
    .bind(form.color)
    .bind(form.slug)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    tag.ok_or_else(|| NotFound::new("No tag exists with specified id").into())
}

pub async fn delete_tag(id: Uuid, pool: &Pool<Postgres>) -> Result<(), potion::Error> {
    let result = sqlx::query("DELETE FROM tags WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(NotFound::new("No tag exists with specified id").into());
    }

    Ok(())
}
