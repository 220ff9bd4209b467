use std::collections::HashMap;

use sqlx::{Pool, Postgres};

use crate::{
    error::QueryError,
    schema::{CartIngredient, Uuid},
    summary::{build_ingredients_summary, render_shopping_list, IngredientAmount},
};

/// Groups cart ingredient lines into one list per recipe, in recipe order.
pub fn group_by_recipe(
    recipe_ids: &[Uuid],
    lines: Vec<CartIngredient>,
) -> Vec<Vec<IngredientAmount>> {
    let mut grouped: HashMap<Uuid, Vec<IngredientAmount>> = HashMap::new();
    lines.into_iter().for_each(|line| {
        grouped
            .entry(line.recipe_id)
            .or_default()
            .push(IngredientAmount {
                name: line.name,
                measurement_unit: line.measurement_unit,
                amount: i64::from(line.amount),
            });
    });

    recipe_ids
        .iter()
        .filter_map(|id| grouped.remove(id))
        .collect()
}

/// Text shopping list aggregated over every recipe in the user's cart.
pub async fn build_shopping_list(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<String, potion::Error> {
    let recipes: Vec<(Uuid, String)> = sqlx::query_as(
        "
        SELECT r.id, r.name
        FROM cart_recipes c
        INNER JOIN recipes r ON r.id = c.recipe_id
        WHERE c.user_id = $1
        ORDER BY c.created_at, c.id
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let recipe_ids: Vec<Uuid> = recipes.iter().map(|(id, _)| *id).collect();

    let lines: Vec<CartIngredient> = sqlx::query_as(
        "
        SELECT ir.recipe_id, i.name, i.measurement_unit, ir.amount
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

    let grouped = group_by_recipe(&recipe_ids, lines);
    let summary = build_ingredients_summary(grouped.iter());
    let names: Vec<String> = recipes.into_iter().map(|(_, name)| name).collect();

    Ok(render_shopping_list(&names, &summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(recipe_id: Uuid, name: &str, unit: &str, amount: i32) -> CartIngredient {
        CartIngredient {
            recipe_id,
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn groups_lines_in_cart_order() {
        let grouped = group_by_recipe(
            &[2, 1],
            vec![
                line(1, "salt", "g", 5),
                line(2, "salt", "g", 3),
                line(2, "milk", "ml", 200),
            ],
        );

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].len(), 2);
        assert_eq!(grouped[1], vec![IngredientAmount::new("salt", "g", 5)]);

        let summary = build_ingredients_summary(grouped.iter());
        assert_eq!(
            summary,
            vec![
                IngredientAmount::new("salt", "g", 8),
                IngredientAmount::new("milk", "ml", 200),
            ]
        );
    }
}
