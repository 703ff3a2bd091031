//! Profile and group photos: bounded upload reads, type sniffing, and the
//! on-disk blob store served under `/uploads`.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Context;
use axum::{extract::Multipart, http::StatusCode};
use serde::Serialize;

use crate::{appresult::AppResult, AppError};

pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;

/// Room for multipart boundaries and headers on top of the photo itself.
pub const MULTIPART_OVERHEAD: usize = 64 * 1024;

const FIELD: &str = "photo";

const EXTENSIONS: [&str; 4] = [".jpg", ".png", ".webp", ".gif"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageKind {
    /// Looks only at the leading bytes; the file name and declared
    /// content type are never trusted.
    pub fn sniff(data: &[u8]) -> Option<ImageKind> {
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageKind::Jpeg)
        } else if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageKind::Png)
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Some(ImageKind::Gif)
        } else if data.len() >= 14 && &data[..4] == b"RIFF" && &data[8..14] == b"WEBPVP" {
            Some(ImageKind::Webp)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Jpeg => ".jpg",
            ImageKind::Png => ".png",
            ImageKind::Webp => ".webp",
            ImageKind::Gif => ".gif",
        }
    }
}

pub struct Photo {
    pub kind: ImageKind,
    pub data: Vec<u8>,
}

#[derive(Serialize)]
pub struct PhotoUploaded {
    pub message: &'static str,
    pub url: String,
}

impl PhotoUploaded {
    pub fn new(url: String) -> Self {
        PhotoUploaded { message: "Photo uploaded", url }
    }
}

/// Pulls the `photo` field out of a multipart body, refusing anything over
/// [`MAX_PHOTO_BYTES`] or not recognisably an image.
pub async fn read_photo(multipart: &mut Multipart) -> AppResult<Photo> {
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FIELD) {
            continue;
        }

        let mut data = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            if data.len() + chunk.len() > MAX_PHOTO_BYTES {
                return Err(AppError::FileTooLarge);
            }
            data.extend_from_slice(&chunk);
        }

        let kind = ImageKind::sniff(&data).ok_or(AppError::UnsupportedImage)?;
        return Ok(Photo { kind, data });
    }

    Err(AppError::bad_request("missing photo field"))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> AppError {
    // the route's body limit trips before we see the whole field
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::FileTooLarge
    } else {
        AppError::bad_request(err.body_text())
    }
}

/// Photos on disk, one per owning entity: `<root>/<kind>/<key><ext>`.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub const PUBLIC_PREFIX: &'static str = "/uploads";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        BlobStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes the photo and returns its public URL. Any earlier photo of the
    /// same key under another extension is removed.
    pub async fn put(&self, kind: &str, key: &str, photo: &Photo) -> AppResult<String> {
        let dir = self.root.join(kind);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;

        let ext = photo.kind.extension();
        for stale in EXTENSIONS.iter().filter(|e| **e != ext) {
            let path = dir.join(format!("{key}{stale}"));
            match tokio::fs::remove_file(&path).await {
                Err(e) if e.kind() != ErrorKind::NotFound => {
                    tracing::warn!(path = %path.display(), error = %e, "could not remove old photo");
                }
                _ => {}
            }
        }

        let file_name = format!("{key}{ext}");
        let path = dir.join(&file_name);
        tokio::fs::write(&path, &photo.data)
            .await
            .with_context(|| format!("writing {}", path.display()))?;

        tracing::info!(path = %path.display(), size_bytes = photo.data.len(), "photo stored");
        Ok(format!("{}/{kind}/{file_name}", Self::PUBLIC_PREFIX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_supported_images() {
        assert_eq!(ImageKind::sniff(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::sniff(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"), Some(ImageKind::Png));
        assert_eq!(ImageKind::sniff(b"GIF89a\x01\0\x01\0"), Some(ImageKind::Gif));
        assert_eq!(ImageKind::sniff(b"RIFF\x24\0\0\0WEBPVP8 "), Some(ImageKind::Webp));
    }

    #[test]
    fn rejects_everything_else() {
        assert_eq!(ImageKind::sniff(b""), None);
        assert_eq!(ImageKind::sniff(b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>"), None);
        assert_eq!(ImageKind::sniff(b"RIFF\x24\0\0\0WAVEfmt "), None);
        assert_eq!(ImageKind::sniff(b"%PDF-1.7"), None);
    }

    #[tokio::test]
    async fn new_photo_replaces_old_extension() {
        let root = std::env::temp_dir().join(format!("chatterbox-blobs-{}", uuid::Uuid::now_v7()));
        let store = BlobStore::new(&root);

        let png = Photo { kind: ImageKind::Png, data: b"\x89PNG\r\n\x1a\n".to_vec() };
        let url = store.put("users", "u1", &png).await.unwrap();
        assert_eq!(url, "/uploads/users/u1.png");
        assert!(root.join("users/u1.png").exists());

        let gif = Photo { kind: ImageKind::Gif, data: b"GIF89a".to_vec() };
        let url = store.put("users", "u1", &gif).await.unwrap();
        assert_eq!(url, "/uploads/users/u1.gif");
        assert!(!root.join("users/u1.png").exists());

        let _ = std::fs::remove_dir_all(root);
    }
}
