use crate::error::AppError;
use crate::models::image_types::{ImageHandle, ImageOrigin};
use crate::services::image_service::{is_image_mime, mime_for_path};
use std::path::{Path, PathBuf};

/// Read a user-selected file. Only `image/*` files are accepted.
pub async fn read_image_file(path: &Path) -> Result<ImageHandle, AppError> {
    let mime = mime_for_path(path);
    if !is_image_mime(mime) {
        return Err(AppError::acquisition(format!(
            "Not an image file: {} ({})",
            path.display(),
            mime
        )));
    }

    let bytes = tokio::fs::read(path).await.map_err(|e| {
        AppError::acquisition(format!("Failed to read {}: {}", path.display(), e))
    })?;

    if bytes.is_empty() {
        return Err(AppError::acquisition(format!("File is empty: {}", path.display())));
    }

    Ok(ImageHandle::new(
        bytes,
        mime,
        ImageOrigin::LocalFile {
            path: path.to_path_buf(),
        },
    ))
}

/// First image among dropped paths; everything else is skipped.
pub fn first_image(paths: &[PathBuf]) -> Option<&PathBuf> {
    paths.iter().find(|path| {
        let image = path.is_file() && is_image_mime(mime_for_path(path));
        if !image {
            log::debug!("Ignoring dropped non-image {}", path.display());
        }
        image
    })
}
