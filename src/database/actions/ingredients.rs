use sqlx::{Pool, Postgres};

use crate::{
    error::{NotFound, QueryError},
    filters::rank_by_name,
    schema::{Ingredient, Uuid},
    validation::IngredientForm,
};

/// Escapes `LIKE` wildcards so user input matches literally.
pub fn escape_like(search: &str) -> String {
    search
        .chars()
        .fold(String::with_capacity(search.len()), |mut s, c| {
            if matches!(c, '%' | '_' | '\\') {
                s.push('\\');
            }
            s.push(c);
            s
        })
}

/// Ingredients whose name contains `search`, starts-with matches first.
pub async fn fetch_ingredients(
    search: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, potion::Error> {
    let search = search.map(str::trim).filter(|s| !s.is_empty());

    let rows: Vec<Ingredient> = match search {
        Some(search) => sqlx::query_as(
            "SELECT id, name, measurement_unit FROM ingredients WHERE name ILIKE '%' || $1 || '%' ORDER BY name",
        )
        .bind(escape_like(search))
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?,
        None => sqlx::query_as("SELECT id, name, measurement_unit FROM ingredients ORDER BY name")
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?,
    };

    Ok(rank_by_name(search.unwrap_or(""), rows, |i| i.name.as_str()))
}

pub async fn get_ingredient(id: Uuid, pool: &Pool<Postgres>) -> Result<Ingredient, potion::Error> {
    let row: Option<Ingredient> =
        sqlx::query_as("SELECT id, name, measurement_unit FROM ingredients WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    row.ok_or_else(|| NotFound::new("No ingredient exists with specified id").into())
}

pub async fn create_ingredient(
    form: IngredientForm,
    pool: &Pool<Postgres>,
) -> Result<Ingredient, potion::Error> {
    let row: Ingredient = sqlx::query_as(
        "
        INSERT INTO ingredients (name, measurement_unit)
        VALUES ($1, $2)
        RETURNING id, name, measurement_unit
    ",
    )
    .bind(form.name)
    .bind(form.measurement_unit)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    log::info!("Created ingredient {} ({})", row.name, row.id);

    Ok(row)
}

pub async fn update_ingredient(
    id: Uuid,
    form: IngredientForm,
    pool: &Pool<Postgres>,
) -> Result<Ingredient, potion::Error> {
    let row: Option<Ingredient> = sqlx::query_as(
        "
        UPDATE ingredients SET
            name = COALESCE($2, name),
            measurement_unit = COALESCE($3, measurement_unit)
        WHERE id = $1
        RETURNING id, name, measurement_unit
    ",
    )
    .bind(id)
    .bind(form.name)
    .bind(form.measurement_unit)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    row.ok_or_else(|| NotFound::new("No ingredient exists with specified id").into())
}

pub async fn delete_ingredient(id: Uuid, pool: &Pool<Postgres>) -> Result<(), potion::Error> {
    let result = sqlx::query("DELETE FROM ingredients WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(NotFound::new("No ingredient exists with specified id").into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("salt"), "salt");
    }
}
