// Uploaded photos, videos and avatars on local disk, served back under /media
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

pub const MEDIA_URL_PREFIX: &str = "/media/";

/// One file received from a multipart form
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write an upload under a fresh name. Returns the URL it is served at.
    pub async fn save(&self, upload: &Upload) -> AppResult<String> {
        tokio::fs::create_dir_all(&self.root).await?;

        let name = match extension_for(upload) {
            Some(ext) => format!("{}.{}", uuid::Uuid::now_v7(), ext),
            None => uuid::Uuid::now_v7().to_string(),
        };
        tokio::fs::write(self.root.join(&name), &upload.bytes).await?;

        tracing::debug!("Stored {} byte upload as {}", upload.len(), name);
        Ok(format!("{}{}", MEDIA_URL_PREFIX, name))
    }

    /// Read a stored file by name. Names that could escape the root are refused.
    pub async fn load(&self, name: &str) -> AppResult<Option<Vec<u8>>> {
        if !is_safe_name(name) {
            return Err(AppError::BadRequest("Invalid media name".to_string()));
        }

        match tokio::fs::read(self.root.join(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every stored file
    pub async fn clear(&self) -> AppResult<()> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a file previously returned by `save`. Unknown URLs are ignored.
    pub async fn remove(&self, url: &str) -> AppResult<()> {
        let Some(name) = url.strip_prefix(MEDIA_URL_PREFIX) else {
            return Ok(());
        };
        if !is_safe_name(name) {
            return Ok(());
        }
        match tokio::fs::remove_file(self.root.join(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn extension_for(upload: &Upload) -> Option<String> {
    let from_name = upload
        .file_name
        .as_deref()
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase());

    from_name.or_else(|| {
        mime_guess::get_mime_extensions_str(&upload.content_type)
            .and_then(|exts| exts.first())
            .map(|e| e.to_string())
    })
}

fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: Option<&str>, content_type: &str) -> Upload {
        Upload {
            file_name: name.map(String::from),
            content_type: content_type.to_string(),
            bytes: b"\x89PNG fake".to_vec(),
        }
    }

    #[tokio::test]
    async fn save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MediaStore::new(tmp.path().join("uploads"));

        let url = store
            .save(&upload(Some("pothole.PNG"), "image/png"))
            .await
            .unwrap();
        assert!(url.starts_with("/media/"));
        assert!(url.ends_with(".png"));

        let name = url.strip_prefix(MEDIA_URL_PREFIX).unwrap();
        assert_eq!(
            store.load(name).await.unwrap(),
            Some(b"\x89PNG fake".to_vec())
        );
    }

    #[tokio::test]
    async fn extension_falls_back_to_content_type() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MediaStore::new(tmp.path());
        let url = store.save(&upload(None, "video/mp4")).await.unwrap();
        assert!(url.contains('.'));
    }

    #[tokio::test]
    async fn missing_file_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MediaStore::new(tmp.path());
        assert_eq!(store.load("nothing.jpg").await.unwrap(), None);
    }

    #[tokio::test]
    async fn traversal_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MediaStore::new(tmp.path());
        for name in ["../etc/passwd", ".hidden", "a/b.jpg", ""] {
            assert!(store.load(name).await.is_err(), "{name}");
        }
    }

    #[tokio::test]
    async fn remove_deletes_saved_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MediaStore::new(tmp.path());
        let url = store.save(&upload(Some("a.jpg"), "image/jpeg")).await.unwrap();
        store.remove(&url).await.unwrap();

        let name = url.strip_prefix(MEDIA_URL_PREFIX).unwrap();
        assert_eq!(store.load(name).await.unwrap(), None);
        store.remove("https://elsewhere/x.jpg").await.unwrap();
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MediaStore::new(tmp.path().join("uploads"));
        store.clear().await.unwrap();

        let url = store.save(&upload(Some("a.jpg"), "image/jpeg")).await.unwrap();
        store.clear().await.unwrap();

        let name = url.strip_prefix(MEDIA_URL_PREFIX).unwrap();
        assert_eq!(store.load(name).await.unwrap(), None);
        store.save(&upload(None, "video/mp4")).await.unwrap();
    }
}
