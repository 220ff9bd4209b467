use std::{borrow::Cow, collections::HashSet};

use serde::Deserialize;
use validator::Validate;

use crate::{
    error::ValidationError,
    media::{decode_data_uri, DecodedImage},
    schema::Uuid,
};

const REQUIRED: &str = "This field is required.";

#[derive(Deserialize, Validate, Debug, Clone, Default)]
pub struct IngredientAmountForm {
    pub id: Uuid,
    #[validate(range(min = 1, max = 32767, message = "Ingredient amount should be between 1 and 32767."))]
    pub amount: i64,
}

/// Recipe payload of create (every field required) and partial update requests.
#[derive(Deserialize, Validate, Debug, Clone, Default)]
pub struct RecipeForm {
    #[validate(length(min = 1, max = 200, message = "Ensure this field is not blank and has no more than 200 characters."))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub text: Option<String>,
    pub image: Option<String>,
    #[validate(range(min = 1, max = 32767, message = "Recipe cooking time should be between 1 and 32767 minutes."))]
    pub cooking_time: Option<i64>,
    #[validate(length(min = 1, message = "Recipe should have at least one tag."))]
    #[validate(custom(function = "unique_tags"))]
    pub tags: Option<Vec<Uuid>>,
    #[validate(length(min = 1, message = "Recipe should have at least one ingredient."))]
    #[validate(custom(function = "valid_ingredients"))]
    pub ingredients: Option<Vec<IngredientAmountForm>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeChanges {
    pub name: Option<String>,
    pub text: Option<String>,
    pub image: Option<DecodedImage>,
    pub cooking_time: Option<i32>,
    pub tags: Option<Vec<Uuid>>,
    pub ingredients: Option<Vec<(Uuid, i32)>>,
}

impl RecipeForm {
    pub fn clean(mut self, partial: bool) -> Result<RecipeChanges, ValidationError> {
        if !partial {
            for (field, present) in [
                ("name", self.name.is_some()),
                ("text", self.text.is_some()),
                ("image", self.image.is_some()),
                ("cooking_time", self.cooking_time.is_some()),
                ("tags", self.tags.is_some()),
                ("ingredients", self.ingredients.is_some()),
            ] {
                if !present {
                    return Err(ValidationError::new(field, REQUIRED));
                }
            }
        }

        self.name = trimmed(self.name);
        self.text = trimmed(self.text);
        self.validate()?;

        let image = self.image.map(|image| decode_data_uri(&image)).transpose()?;

        // Both bounds are checked above, so the narrowing casts are lossless.
        Ok(RecipeChanges {
            name: self.name,
            text: self.text,
            image,
            cooking_time: self.cooking_time.map(|minutes| minutes as i32),
            tags: self.tags,
            ingredients: self.ingredients.map(|ingredients| {
                ingredients
                    .into_iter()
                    .map(|entry| (entry.id, entry.amount as i32))
                    .collect()
            }),
        })
    }
}

fn unique_tags(tags: &[Uuid]) -> Result<(), validator::ValidationError> {
    let mut seen = HashSet::new();
    match tags.iter().find(|tag| !seen.insert(**tag)) {
        Some(tag) => Err(validator::ValidationError::new("duplicate")
            .with_message(Cow::Owned(format!("Duplicate tag with id {tag}")))),
        None => Ok(()),
    }
}

fn valid_ingredients(ingredients: &[IngredientAmountForm]) -> Result<(), validator::ValidationError> {
    let mut seen = HashSet::new();
    for entry in ingredients.iter() {
        if !seen.insert(entry.id) {
            return Err(validator::ValidationError::new("duplicate")
                .with_message(Cow::Owned(format!("Duplicate ingredient with id {}", entry.id))));
        }
        if let Err(errors) = entry.validate() {
            let error = ValidationError::from(errors);
            let message = error.messages("amount").concat();
            return Err(validator::ValidationError::new("range").with_message(Cow::Owned(message)));
        }
    }
    Ok(())
}

#[derive(Deserialize, Validate, Debug, Clone)]
pub struct UserForm {
    #[validate(email(message = "Enter a valid email address."))]
    #[validate(length(max = 254, message = "Ensure this field has no more than 254 characters."))]
    pub email: String,
    #[validate(length(min = 1, max = 150, message = "Ensure this field is not blank and has no more than 150 characters."))]
    #[validate(custom(function = "valid_username"))]
    pub username: String,
    #[validate(length(min = 1, max = 150, message = "Ensure this field is not blank and has no more than 150 characters."))]
    pub first_name: String,
    #[validate(length(min = 1, max = 150, message = "Ensure this field is not blank and has no more than 150 characters."))]
    pub last_name: String,
    #[validate(length(min = 8, message = "This password is too short. It must contain at least 8 characters."))]
    #[validate(custom(function = "not_entirely_numeric"))]
    pub password: String,
}

impl UserForm {
    pub fn clean(self) -> Result<Self, ValidationError> {
        let form = Self {
            email: self.email.trim().to_lowercase(),
            username: self.username.trim().to_string(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            password: self.password,
        };
        form.validate()?;
        Ok(form)
    }
}

fn valid_username(username: &str) -> Result<(), validator::ValidationError> {
    if username
        .chars()
        .all(|c| c.is_alphanumeric() || "_.@+-".contains(c))
    {
        return Ok(());
    }
    Err(validator::ValidationError::new("username").with_message(Cow::Borrowed(
        "Enter a valid username. It may contain only letters, numbers, and @/./+/-/_ characters.",
    )))
}

fn not_entirely_numeric(password: &str) -> Result<(), validator::ValidationError> {
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(validator::ValidationError::new("numeric")
            .with_message(Cow::Borrowed("This password is entirely numeric.")));
    }
    Ok(())
}

#[derive(Deserialize, Validate, Debug, Clone)]
pub struct PasswordForm {
    #[validate(length(min = 8, message = "This password is too short. It must contain at least 8 characters."))]
    #[validate(custom(function = "not_entirely_numeric"))]
    pub new_password: String,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub current_password: String,
}

impl PasswordForm {
    pub fn clean(self) -> Result<Self, ValidationError> {
        self.validate()?;
        Ok(self)
    }
}

#[derive(Deserialize, Validate, Debug, Clone, Default)]
pub struct TagForm {
    #[validate(length(min = 1, max = 64, message = "Ensure this field is not blank and has no more than 64 characters."))]
    pub name: Option<String>,
    #[validate(custom(function = "valid_color"))]
    pub color: Option<String>,
    #[validate(length(min = 1, max = 64, message = "Ensure this field is not blank and has no more than 64 characters."))]
    #[validate(custom(function = "valid_slug"))]
    pub slug: Option<String>,
}

impl TagForm {
    /// Colors come back normalised to upper case.
    pub fn clean(self, partial: bool) -> Result<Self, ValidationError> {
        if !partial {
            for (field, present) in [
                ("name", self.name.is_some()),
                ("color", self.color.is_some()),
                ("slug", self.slug.is_some()),
            ] {
                if !present {
                    return Err(ValidationError::new(field, REQUIRED));
                }
            }
        }

        let form = Self {
            name: trimmed(self.name),
            color: trimmed(self.color).map(|color| color.to_ascii_uppercase()),
            slug: trimmed(self.slug),
        };
        form.validate()?;
        Ok(form)
    }
}

/// `#RRGGBB`
fn valid_color(color: &str) -> Result<(), validator::ValidationError> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());

    if !valid {
        return Err(validator::ValidationError::new("color")
            .with_message(Cow::Borrowed("Color should be in RGB #RRGGBB format.")));
    }
    Ok(())
}

fn valid_slug(slug: &str) -> Result<(), validator::ValidationError> {
    if slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Ok(());
    }
    Err(validator::ValidationError::new("slug").with_message(Cow::Borrowed(
        "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
    )))
}

#[derive(Deserialize, Validate, Debug, Clone, Default)]
pub struct IngredientForm {
    #[validate(length(min = 1, max = 256, message = "Ensure this field is not blank and has no more than 256 characters."))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 256, message = "Ensure this field is not blank and has no more than 256 characters."))]
    pub measurement_unit: Option<String>,
}

impl IngredientForm {
    pub fn clean(self, partial: bool) -> Result<Self, ValidationError> {
        if !partial && self.name.is_none() {
            return Err(ValidationError::new("name", REQUIRED));
        }
        if !partial && self.measurement_unit.is_none() {
            return Err(ValidationError::new("measurement_unit", REQUIRED));
        }

        let form = Self {
            name: trimmed(self.name),
            measurement_unit: trimmed(self.measurement_unit),
        };
        form.validate()?;
        Ok(form)
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string())
}
