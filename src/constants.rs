pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const USER_COUNT_PER_PAGE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const MEDIA_URL: &str = "/media";
pub const RECIPE_IMAGE_DIR: &str = "recipes/images";

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

pub const SESSION_LIFETIME_HOURS: i64 = 24;

pub const SHOPPING_LIST_FILENAME: &str = "shopping_cart.txt";

/// Upper bound of JSON request bodies; base64 images dominate the size.
pub const MAX_BODY_SIZE: u64 = 10 * 1024 * 1024;
