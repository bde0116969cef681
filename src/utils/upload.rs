//! Profile picture storage under the media root.

use std::path::Path;

use uuid::Uuid;

use crate::{config::MAX_PROFILE_PIC_BYTES, error::AppError};

pub const PROFILE_PIC_DIR: &str = "profile_pics";

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Lower-cased extension of `file_name` if it is an accepted image type.
fn image_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Writes an uploaded picture to `<media_root>/profile_pics/<uuid>.<ext>`.
///
/// Returns the path relative to `media_root`, which is what gets persisted and what
/// `/media/...` serves.
pub async fn store_profile_picture(
    media_root: &Path,
    file_name: &str,
    bytes: &[u8],
) -> Result<String, AppError> {
    let ext = image_extension(file_name).ok_or_else(|| {
        AppError::Validation("Profile picture must be a jpg, png, gif or webp image.".to_string())
    })?;
    if bytes.len() > MAX_PROFILE_PIC_BYTES {
        return Err(AppError::Validation(
            "Profile picture must be at most 5 MB.".to_string(),
        ));
    }

    let dir = media_root.join(PROFILE_PIC_DIR);
    tokio::fs::create_dir_all(&dir).await.map_err(|e| {
        tracing::error!("Failed to create {}: {:?}", dir.display(), e);
        AppError::InternalServerError(e.to_string())
    })?;

    let stored_name = format!("{}.{ext}", Uuid::new_v4());
    tokio::fs::write(dir.join(&stored_name), bytes)
        .await
        .map_err(|e| {
            tracing::error!("Failed to write profile picture: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(format!("{PROFILE_PIC_DIR}/{stored_name}"))
}
