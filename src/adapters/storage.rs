use crate::domain::model::extension_for_mime;
use crate::domain::ports::ImageStore;
use crate::utils::error::{GreenwardError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

const TOKEN_EXTENSIONS: [&str; 3] = ["png", "jpg", "webp"];

/// Analysis images on local disk, one file per token.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    base_path: PathBuf,
}

impl LocalImageStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Tokens are `<32 hex chars>.<known extension>`; anything else never
    /// reaches the filesystem.
    pub fn is_valid_token(token: &str) -> bool {
        let Some((stem, extension)) = token.split_once('.') else {
            return false;
        };
        stem.len() == 32
            && stem.bytes().all(|b| b.is_ascii_hexdigit())
            && TOKEN_EXTENSIONS.contains(&extension)
    }

    fn path_for(&self, token: &str) -> Result<PathBuf> {
        if !Self::is_valid_token(token) {
            return Err(GreenwardError::NotFound {
                what: "image".to_string(),
            });
        }
        Ok(self.base_path.join(token))
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn save(&self, bytes: &[u8], mime_type: &str) -> Result<String> {
        let token = format!(
            "{}.{}",
            Uuid::new_v4().simple(),
            extension_for_mime(mime_type)
        );
        let full_path = self.base_path.join(&token);

        fs::create_dir_all(&self.base_path).await?;
        fs::write(&full_path, bytes).await?;
        tracing::debug!(token = %token, bytes = bytes.len(), "Stored analysis image");
        Ok(token)
    }

    async fn load(&self, token: &str) -> Result<Vec<u8>> {
        let full_path = self.path_for(token)?;
        match fs::read(&full_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(GreenwardError::NotFound {
                what: "image".to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, token: &str) {
        let Ok(full_path) = self.path_for(token) else {
            return;
        };
        if let Err(e) = fs::remove_file(&full_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(token, "Failed to remove analysis image: {}", e);
            }
        }
    }
}
