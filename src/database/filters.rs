use crate::{form::Form, schema::Uuid};

/// Case-insensitive name search: starts-with matches first, then contains-only matches,
/// each group ordered by name. A blank query keeps every item in its original order.
pub fn rank_by_name<T, F>(query: &str, items: Vec<T>, name: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return items;
    }

    let (mut starts_with, mut contains): (Vec<(String, T)>, Vec<(String, T)>) = items
        .into_iter()
        .map(|item| (name(&item).to_lowercase(), item))
        .filter(|(lowered, _)| lowered.contains(&query))
        .partition(|(lowered, _)| lowered.starts_with(&query));

    starts_with.sort_by(|a, b| a.0.cmp(&b.0));
    contains.sort_by(|a, b| a.0.cmp(&b.0));

    starts_with
        .into_iter()
        .chain(contains)
        .map(|(_, item)| item)
        .collect()
}

/// Query-string filters of the recipe list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeFilter {
    pub is_favorited: Option<bool>,
    pub is_in_shopping_cart: Option<bool>,
    pub author: Option<Uuid>,
    /// Tag slugs; a recipe matches when it carries any of them.
    pub tags: Vec<String>,
}

impl RecipeFilter {
    pub fn from_form(form: &Form) -> Self {
        Self {
            is_favorited: form.get_bool("is_favorited"),
            is_in_shopping_cart: form.get_bool("is_in_shopping_cart"),
            author: form.get_number("author"),
            tags: form
                .get_all("tags")
                .into_iter()
                .map(|slug| slug.to_string())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Ingredient;

    fn ingredient(id: Uuid, name: &str) -> Ingredient {
        Ingredient {
            id,
            name: name.to_string(),
            measurement_unit: String::from("g"),
        }
    }

    fn names(items: &[Ingredient]) -> Vec<&str> {
        items.iter().map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn starts_with_matches_come_first() {
        let items = vec![
            ingredient(1, "Sea salt"),
            ingredient(2, "salt"),
            ingredient(3, "Pepper"),
            ingredient(4, "Salted butter"),
            ingredient(5, "basalt dust"),
        ];

        let ranked = rank_by_name("SAL", items, |i| i.name.as_str());

        assert_eq!(
            names(&ranked),
            vec!["salt", "Salted butter", "basalt dust", "Sea salt"]
        );
    }

    #[test]
    fn no_duplicates_between_groups() {
        let items = vec![ingredient(1, "salt and salt"), ingredient(2, "rock salt")];

        let ranked = rank_by_name("salt", items, |i| i.name.as_str());

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, 1);
        assert_eq!(ranked[1].id, 2);
    }

    #[test]
    fn blank_query_returns_everything() {
        let items = vec![ingredient(1, "b"), ingredient(2, "a")];

        let ranked = rank_by_name("  ", items.clone(), |i| i.name.as_str());

        assert_eq!(ranked, items);
    }

    #[test]
    fn matches_non_ascii_names_case_insensitively() {
        let items = vec![ingredient(1, "Морская соль"), ingredient(2, "Соль")];

        let ranked = rank_by_name("соль", items, |i| i.name.as_str());

        assert_eq!(names(&ranked), vec!["Соль", "Морская соль"]);
    }

    #[test]
    fn recipe_filter_from_query() {
        let form = Form::from_pairs(&[
            ("is_favorited", "1"),
            ("author", "12"),
            ("tags", "breakfast"),
            ("tags", "dinner"),
        ]);

        let filter = RecipeFilter::from_form(&form);

        assert_eq!(
            filter,
            RecipeFilter {
                is_favorited: Some(true),
                is_in_shopping_cart: None,
                author: Some(12),
                tags: vec![String::from("breakfast"), String::from("dinner")],
            }
        );
    }

    #[test]
    fn unmatched_filters_are_no_ops() {
        let form = Form::from_pairs(&[("author", "me"), ("is_in_shopping_cart", "perhaps")]);
        assert_eq!(RecipeFilter::from_form(&form), RecipeFilter::default());
    }
}
