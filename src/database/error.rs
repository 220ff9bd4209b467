use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use potion::{Error, HtmlError};
use serde_json::{json, Map, Value};

const INTERNAL_SERVER_ERROR: u16 = 500;

/// Named database constraints and the payload field a violation is reported on.
const CONSTRAINT_FIELDS: &[(&str, &str, &str)] = &[
    ("users_email_key", "email", "A user with this email already exists."),
    ("users_username_key", "username", "A user with this username already exists."),
    ("tags_slug_key", "slug", "A tag with this slug already exists."),
    ("tags_name_key", "name", "A tag with this name already exists."),
    ("tags_color_key", "color", "A tag with this color already exists."),
    ("unique_ingredient", "name", "This ingredient already exists with the same measurement unit."),
    ("unique_recipe", "name", "You already have a recipe with this name."),
    ("unique_ingredient_recipe", "ingredients", "Duplicate ingredient amount in recipe."),
    ("recipes_cooking_time_check", "cooking_time", "Recipe cooking time should be greater than zero."),
    ("ingredient_recipes_amount_check", "ingredients", "Ingredient amount should be positive."),
    ("tag_recipes_tag_id_fkey", "tags", "Tag doesn't exist."),
    ("ingredient_recipes_ingredient_id_fkey", "ingredients", "Ingredient doesn't exist."),
];

#[derive(Debug, Clone, Copy, PartialEq)]
enum QueryErrorKind {
    Invalid,
    Missing,
    Internal,
}

pub struct QueryError {
    info: String,
    kind: QueryErrorKind,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self {
            info,
            kind: QueryErrorKind::Internal,
        }
    }

    fn from_constraint(constraint: &str) -> Option<Self> {
        CONSTRAINT_FIELDS
            .iter()
            .find(|(name, _, _)| *name == constraint)
            .map(|(_, field, message)| Self {
                info: ValidationError::new(field, message).body(),
                kind: QueryErrorKind::Invalid,
            })
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) => {
                let known = e.constraint().and_then(QueryError::from_constraint);
                match known {
                    Some(error) => error,
                    None => {
                        log::error!("Database error: {e}");
                        Self::new(format!("{e}"))
                    }
                }
            }
            sqlx::Error::RowNotFound => Self {
                info: String::from("Not found."),
                kind: QueryErrorKind::Missing,
            },
            sqlx::Error::PoolTimedOut => Self::new(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(String::from("Pool closed")),
            e => {
                log::error!("Query failed: {e}");
                Self::new(format!("{e}"))
            }
        }
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Error {
        let info = Some(value.info);
        match value.kind {
            QueryErrorKind::Invalid => Error {
                code: 400,
                info,
                redirect: None,
            },
            QueryErrorKind::Missing => Error {
                code: 404,
                info,
                redirect: None,
            },
            QueryErrorKind::Internal => Error {
                code: 500,
                info,
                redirect: None,
            },
        }
    }
}

/// Field-level validation failures, rendered as `{"<field>": ["<message>", ..]}`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationError {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationError {
    pub fn new(field: &str, message: &str) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.to_string(), vec![message.to_string()]);
        Self { fields }
    }

    /// First failing field in alphabetical order.
    pub fn field(&self) -> Option<&str> {
        self.fields.keys().next().map(String::as_str)
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn body(&self) -> String {
        let mut body = Map::new();
        for (field, messages) in self.fields.iter() {
            body.insert(field.to_owned(), json!(messages));
        }
        Value::Object(body).to_string()
    }
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = BTreeMap::new();
        for (field, list) in errors.field_errors() {
            let messages = list
                .iter()
                .map(|error| match &error.message {
                    Some(message) => message.to_string(),
                    None => error.code.to_string(),
                })
                .collect();
            fields.insert(field.to_string(), messages);
        }
        Self { fields }
    }
}

impl From<ValidationError> for Error {
    fn from(value: ValidationError) -> Error {
        Error {
            code: 400,
            info: Some(value.body()),
            redirect: None,
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (field, messages) in self.fields.iter() {
            write!(f, "{field}: {} ", messages.join(" "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug)]
pub struct NotFound {
    info: String,
}

impl NotFound {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl From<NotFound> for Error {
    fn from(value: NotFound) -> Error {
        Error {
            code: 404,
            info: Some(value.info),
            redirect: None,
        }
    }
}

#[derive(Debug)]
pub struct Conflict {
    info: String,
}

impl Conflict {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl From<Conflict> for Error {
    fn from(value: Conflict) -> Error {
        Error {
            code: 409,
            info: Some(value.info),
            redirect: None,
        }
    }
}

#[derive(Debug)]
pub struct PermissionDenied {
    info: String,
}

impl PermissionDenied {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl Default for PermissionDenied {
    fn default() -> Self {
        Self::new("You do not have permission to perform this action.")
    }
}

impl From<PermissionDenied> for Error {
    fn from(value: PermissionDenied) -> Error {
        Error {
            code: 403,
            info: Some(value.info),
            redirect: None,
        }
    }
}

#[derive(Debug)]
pub struct TypeError {
    info: String,
}

impl TypeError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl From<TypeError> for Error {
    fn from(value: TypeError) -> Error {
        HtmlError::InvalidRequest.new(&value.info)
    }
}

impl Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.info)
    }
}

impl std::error::Error for TypeError {}

/// Status code carried by a `potion::Error`.
pub fn status_of(error: &Error) -> u16 {
    u16::try_from(error.code).unwrap_or(INTERNAL_SERVER_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_renders_field_level_body() {
        let error = ValidationError::new("cooking_time", "Must be positive.");
        let body: serde_json::Value = serde_json::from_str(&error.body()).unwrap();

        assert_eq!(body["cooking_time"][0], "Must be positive.");
    }

    #[test]
    fn validator_errors_keep_every_field() {
        let mut errors = validator::ValidationErrors::new();
        errors.add(
            "email",
            validator::ValidationError::new("email").with_message("Enter a valid email address.".into()),
        );
        errors.add("username", validator::ValidationError::new("length"));

        let error = ValidationError::from(errors);
        let body: serde_json::Value = serde_json::from_str(&error.body()).unwrap();

        assert_eq!(error.field(), Some("email"));
        assert_eq!(body["email"][0], "Enter a valid email address.");
        assert_eq!(body["username"][0], "length");
    }

    #[test]
    fn kinds_map_to_status_codes() {
        let validation: Error = ValidationError::new("name", "bad").into();
        let missing: Error = NotFound::new("missing").into();
        let duplicate: Error = Conflict::new("twice").into();
        let denied: Error = PermissionDenied::default().into();

        assert_eq!(status_of(&validation), 400);
        assert_eq!(status_of(&missing), 404);
        assert_eq!(status_of(&duplicate), 409);
        assert_eq!(status_of(&denied), 403);
    }

    #[test]
    fn known_constraint_becomes_validation_error() {
        let error = QueryError::from_constraint("unique_recipe").unwrap();
        assert_eq!(error.kind, QueryErrorKind::Invalid);
        assert!(error.info.contains("\"name\""));
        assert!(QueryError::from_constraint("unknown_constraint").is_none());
    }
}
