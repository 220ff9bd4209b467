use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use potion::HtmlError;

use crate::{
    constants::{IMAGE_EXTENSIONS, MEDIA_URL, RECIPE_IMAGE_DIR},
    error::ValidationError,
    schema::Uuid,
};

/// Image payload decoded from a `data:image/<ext>;base64,<payload>` URI.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub extension: String,
    pub bytes: Vec<u8>,
}

pub fn decode_data_uri(value: &str) -> Result<DecodedImage, ValidationError> {
    let invalid = || ValidationError::new("image", "Upload a valid base64 encoded image.");

    let (header, payload) = value
        .trim()
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .ok_or_else(invalid)?;

    let extension = header
        .strip_prefix("image/")
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(invalid)?;

    let bytes = STANDARD.decode(payload.trim()).map_err(|_| invalid())?;
    if bytes.is_empty() {
        return Err(invalid());
    }

    Ok(DecodedImage { extension, bytes })
}

/// Writes the image under the author's directory and returns its path relative to the media root.
pub async fn store_image(
    media_root: &Path,
    user_id: Uuid,
    image: DecodedImage,
) -> Result<String, potion::Error> {
    let relative = format!(
        "{RECIPE_IMAGE_DIR}/{user_id}/{}.{}",
        uuid::Uuid::new_v4(),
        image.extension
    );
    let target = media_root.join(&relative);

    if let Some(dir) = target.parent() {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            log::error!("Could not create media directory {}: {e}", dir.display());
            HtmlError::InternalServerError.new("Could not store image")
        })?;
    }

    tokio::fs::write(&target, &image.bytes).await.map_err(|e| {
        log::error!("Could not write image {}: {e}", target.display());
        HtmlError::InternalServerError.new("Could not store image")
    })?;

    Ok(relative)
}

pub async fn remove_image(media_root: &Path, relative: &str) {
    if relative.is_empty() {
        return;
    }

    if let Err(e) = tokio::fs::remove_file(media_root.join(relative)).await {
        log::warn!("Could not remove image {relative}: {e}");
    }
}

pub fn image_url(relative: &str) -> String {
    if relative.is_empty() {
        return String::new();
    }
    format!("{MEDIA_URL}/{relative}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_png_data_uri() {
        let image = decode_data_uri("data:image/png;base64,aGVsbG8=").unwrap();

        assert_eq!(image.extension, "png");
        assert_eq!(image.bytes, b"hello");
    }

    #[test]
    fn rejects_non_image_payloads() {
        assert!(decode_data_uri("aGVsbG8=").is_err());
        assert!(decode_data_uri("data:text/plain;base64,aGVsbG8=").is_err());
        assert!(decode_data_uri("data:image/png;base64,@@@").is_err());
        assert!(decode_data_uri("data:image/png;base64,").is_err());
    }

    #[test]
    fn builds_public_url() {
        assert_eq!(
            image_url("recipes/images/1/a.png"),
            "/media/recipes/images/1/a.png"
        );
        assert_eq!(image_url(""), "");
    }

    #[tokio::test]
    async fn stores_image_under_user_directory() {
        let root = std::env::temp_dir().join(format!("foodgram-media-{}", uuid::Uuid::new_v4()));
        let image = decode_data_uri("data:image/jpeg;base64,aGVsbG8=").unwrap();

        let relative = store_image(&root, 7, image).await.ok().unwrap();

        assert!(relative.starts_with("recipes/images/7/"));
        assert!(relative.ends_with(".jpeg"));
        assert_eq!(tokio::fs::read(root.join(&relative)).await.unwrap(), b"hello");

        remove_image(&root, &relative).await;
        assert!(!root.join(&relative).exists());
        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
