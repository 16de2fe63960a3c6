// src/services/upload_service.rs
use crate::{
    config::Config,
    error::{AppError, AppResult},
};
use axum::body::Bytes;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A file pulled out of a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageKind {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ImageKind::Jpeg),
            "image/png" => Some(ImageKind::Png),
            "image/gif" => Some(ImageKind::Gif),
            "image/webp" => Some(ImageKind::Webp),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Gif => "gif",
            ImageKind::Webp => "webp",
        }
    }
}

/// Where a kind of upload goes on disk, its public URL prefix and its size limit.
#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub dir: PathBuf,
    pub url_prefix: String,
    pub max_bytes: usize,
}

impl UploadTarget {
    pub fn proofs(config: &Config) -> Self {
        UploadTarget {
            dir: config.proofs_dir(),
            url_prefix: "/uploads/proofs".into(),
            max_bytes: config.max_proof_bytes,
        }
    }

    pub fn avatars(config: &Config) -> Self {
        UploadTarget {
            dir: config.avatars_dir(),
            url_prefix: "/uploads/avatars".into(),
            max_bytes: config.max_avatar_bytes,
        }
    }
}

/// MIME allow-list and size check. Nothing touches the disk here.
pub fn validate_image(file: &UploadedFile, max_bytes: usize) -> AppResult<ImageKind> {
    let kind = file
        .content_type
        .as_deref()
        .and_then(ImageKind::from_mime)
        .ok_or_else(|| AppError::Upload("Only JPG, PNG, GIF or WEBP images are allowed.".into()))?;

    if file.is_empty() {
        return Err(AppError::Upload("The uploaded file is empty.".into()));
    }
    if file.len() > max_bytes {
        return Err(AppError::Upload(format!(
            "The image is too large (max {} MB).",
            max_bytes.div_ceil(1024 * 1024)
        )));
    }
    Ok(kind)
}

/// Writes the file under a generated name and returns its public URL.
pub async fn store_image(target: &UploadTarget, file: &UploadedFile, kind: ImageKind) -> AppResult<String> {
    tokio::fs::create_dir_all(&target.dir).await?;
    let file_name = format!("{}.{}", Uuid::new_v4(), kind.extension());
    let path = target.dir.join(&file_name);
    tokio::fs::write(&path, &file.bytes).await?;
    tracing::debug!("Stored upload {} ({} bytes)", path.display(), file.len());
    Ok(format!("{}/{}", target.url_prefix.trim_end_matches('/'), file_name))
}

/// Best-effort removal of a previously stored file given its public URL.
pub async fn remove_stored(target: &UploadTarget, url: &str) {
    let Some(file_name) = url
        .strip_prefix(target.url_prefix.trim_end_matches('/'))
        .map(|rest| rest.trim_start_matches('/'))
        .filter(|name| !name.is_empty() && !name.contains('/') && !name.contains(".."))
    else {
        return;
    };
    let path: &Path = &target.dir.join(file_name);
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!("Could not remove old upload {}: {}", path.display(), e);
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;

    pub fn temp_target() -> UploadTarget {
        UploadTarget {
            dir: std::env::temp_dir().join(format!("greenquest-test-{}", Uuid::new_v4())),
            url_prefix: "/uploads/proofs".into(),
            max_bytes: 1024,
        }
    }

    pub fn png(len: usize) -> UploadedFile {
        UploadedFile {
            file_name: Some("proof.png".into()),
            content_type: Some("image/png".into()),
            bytes: Bytes::from(vec![0u8; len]),
        }
    }
}
