//! Base64 image uploads written under the media root.

use crate::error::{AppError, Result};
use anyhow::Context;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

pub const RECIPES_FOLDER: &str = "recipes";
pub const AVATARS_FOLDER: &str = "users";

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    url_prefix: String,
}

/// Splits `data:image/<ext>;base64,<payload>` into an extension and bytes.
pub fn decode_data_url(data: &str) -> std::result::Result<(String, Vec<u8>), &'static str> {
    let (header, payload) = data
        .split_once(";base64,")
        .ok_or("Upload a valid image encoded as a base64 data URL.")?;
    let format = header
        .strip_prefix("data:image/")
        .ok_or("Upload a valid image encoded as a base64 data URL.")?;

    let extension = format.to_ascii_lowercase();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err("Unsupported image format.");
    }

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| "Image payload is not valid base64.")?;
    if bytes.is_empty() {
        return Err("The submitted image is empty.");
    }

    Ok((extension, bytes))
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: &str) -> Self {
        let url_prefix = format!("/{}/", url_prefix.trim_matches('/'));
        Self {
            root: root.into(),
            url_prefix,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Decodes and stores an image, returning the URL path it is served from.
    pub async fn save_data_url(&self, folder: &str, field: &str, data: &str) -> Result<String> {
        let (extension, bytes) =
            decode_data_url(data).map_err(|message| AppError::field(field, message))?;

        let file_name = format!("{}.{}", Uuid::new_v4().simple(), extension);
        let dir = self.root.join(folder);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create media directory {}", dir.display()))?;
        let path = dir.join(&file_name);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write image {}", path.display()))?;

        tracing::debug!(path = %path.display(), "stored image");
        Ok(format!("{}{}/{}", self.url_prefix, folder, file_name))
    }

    /// Deletes a previously stored image. Failures are logged, not returned.
    pub async fn remove(&self, url: &str) {
        let Some(relative) = url.strip_prefix(&self.url_prefix) else {
            return;
        };
        if relative.split('/').any(|part| part == ".." || part.is_empty()) {
            return;
        }
        let path = self.root.join(relative);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove image");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    #[test]
    fn decodes_png_data_url() {
        let (extension, bytes) = decode_data_url(PIXEL).unwrap();
        assert_eq!(extension, "png");
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[test]
    fn rejects_plain_strings_and_unknown_formats() {
        assert!(decode_data_url("not an image").is_err());
        assert!(decode_data_url("data:image/tiff;base64,AAAA").is_err());
        assert!(decode_data_url("data:image/png;base64,!!!").is_err());
    }

    #[tokio::test]
    async fn saves_and_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path(), "media");

        let url = media.save_data_url(RECIPES_FOLDER, "image", PIXEL).await.unwrap();
        assert!(url.starts_with("/media/recipes/"));
        let path = dir.path().join(url.trim_start_matches("/media/"));
        assert!(path.exists());

        media.remove(&url).await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn invalid_image_is_a_field_error() {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path(), "media");

        match media.save_data_url(AVATARS_FOLDER, "avatar", "oops").await {
            Err(AppError::Validation(errors)) => assert!(errors.get("avatar").is_some()),
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
