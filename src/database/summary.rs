use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientAmount {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

impl IngredientAmount {
    pub fn new(name: &str, measurement_unit: &str, amount: i64) -> Self {
        Self {
            name: name.to_string(),
            measurement_unit: measurement_unit.to_string(),
            amount,
        }
    }
}

/// Merges per-recipe ingredient lists into one shopping list.
///
/// Entries are keyed by `(name, measurement_unit)`: the same ingredient measured in
/// different units stays as separate lines, no conversion is attempted. Output keeps
/// the order in which each key was first seen.
pub fn build_ingredients_summary<'a, R, I>(recipes_ingredients: R) -> Vec<IngredientAmount>
where
    R: IntoIterator<Item = I>,
    I: IntoIterator<Item = &'a IngredientAmount>,
{
    let mut positions: HashMap<(&str, &str), usize> = HashMap::new();
    let mut summary: Vec<IngredientAmount> = vec![];

    for ingredients in recipes_ingredients {
        for ingredient in ingredients {
            let key = (ingredient.name.as_str(), ingredient.measurement_unit.as_str());
            match positions.get(&key) {
                Some(&i) => summary[i].amount += ingredient.amount,
                None => {
                    positions.insert(key, summary.len());
                    summary.push(ingredient.clone());
                }
            }
        }
    }

    summary
}

/// Plain-text shopping list: the cart's recipe names followed by the merged ingredients.
pub fn render_shopping_list(recipes: &[String], ingredients: &[IngredientAmount]) -> String {
    let mut s = String::from("Shopping list\n\n");

    s += "Recipes:\n";
    recipes.iter().for_each(|name| {
        s += &format!("  - {name}\n");
    });

    s += "\nIngredients:\n";
    ingredients.iter().for_each(|ingredient| {
        s += &format!(
            "  [ ] {} ({}): {}\n",
            ingredient.name, ingredient.measurement_unit, ingredient.amount
        );
    });

    s
}
