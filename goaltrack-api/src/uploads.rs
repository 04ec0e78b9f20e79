/// Banner image storage on local disk
///
/// Uploaded banners are written under `UPLOAD_DIR` with a random file name and
/// served back by the router under `UPLOAD_PUBLIC_PATH`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::config::UploadConfig;

/// Accepted MIME types and the extension each is saved with
const ALLOWED_TYPES: [(&str, &str); 4] = [
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No file uploaded")]
    Missing,

    #[error("Only image files are allowed (png, jpeg, gif, webp)")]
    UnsupportedType,

    #[error("File too large, maximum size is {max_bytes} bytes")]
    TooLarge { max_bytes: usize },

    #[error("Uploaded file is empty")]
    Empty,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata returned to the client after a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBanner {
    pub url: String,
    /// Original file name as sent by the client
    pub name: String,
    pub size: usize,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

#[derive(Debug, Clone)]
pub struct BannerStore {
    dir: PathBuf,
    public_path: String,
    max_bytes: usize,
}

fn extension_for(mime_type: &str) -> Option<&'static str> {
    let mime_type = mime_type.trim().to_ascii_lowercase();
    ALLOWED_TYPES
        .iter()
        .find(|(allowed, _)| *allowed == mime_type)
        .map(|(_, ext)| *ext)
}

impl BannerStore {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            public_path: config.public_path.trim_end_matches('/').to_string(),
            max_bytes: config.max_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Checks type and size, then writes the file
    pub async fn save(
        &self,
        original_name: Option<&str>,
        mime_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<StoredBanner, UploadError> {
        let mime_type = mime_type.ok_or(UploadError::UnsupportedType)?;
        let extension = extension_for(mime_type).ok_or(UploadError::UnsupportedType)?;

        if bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(UploadError::TooLarge {
                max_bytes: self.max_bytes,
            });
        }

        tokio::fs::create_dir_all(&self.dir).await?;

        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        tokio::fs::write(self.dir.join(&file_name), bytes).await?;

        info!(file = %file_name, size = bytes.len(), mime_type, "Stored banner upload");

        Ok(StoredBanner {
            url: format!("{}/{}", self.public_path, file_name),
            name: original_name.unwrap_or(&file_name).to_string(),
            size: bytes.len(),
            mime_type: mime_type.to_ascii_lowercase(),
        })
    }
}
