//! Media lookup.
//!
//! The catalog-backed repository keeps every record in memory. It is
//! populated once at startup from a JSON array of media records.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use crate::media::{Media, MediaId};

/// Errors raised by a media repository.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Catalog file exists but could not be decoded
    #[error("Invalid media catalog {path}: {reason}")]
    InvalidCatalog {
        /// Location of the catalog
        path: PathBuf,
        /// Decoder message
        reason: String,
    },

    /// Backing store failed
    #[error("Repository backend failed: {reason}")]
    Backend {
        /// Description of the failure
        reason: String,
    },

    /// Underlying I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Looks up media records by identifier.
#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// Find a media by id.
    ///
    /// Returns `Ok(None)` when no record exists.
    ///
    /// # Errors
    /// - `RepositoryError::Backend` - If the backing store failed
    async fn find(&self, id: &MediaId) -> Result<Option<Media>, RepositoryError>;
}

/// Repository holding every record in memory.
#[derive(Debug, Default)]
pub struct InMemoryMediaRepository {
    media: RwLock<HashMap<MediaId, Media>>,
}

impl InMemoryMediaRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository holding the given records.
    pub fn with_media(media: impl IntoIterator<Item = Media>) -> Self {
        let media = media
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect::<HashMap<_, _>>();
        Self {
            media: RwLock::new(media),
        }
    }

    /// Loads records from a JSON catalog file.
    ///
    /// # Errors
    /// - `RepositoryError::Io` - If the catalog cannot be read
    /// - `RepositoryError::InvalidCatalog` - If the catalog is not a JSON array of media
    pub async fn from_catalog(path: &Path) -> Result<Self, RepositoryError> {
        let content = tokio::fs::read_to_string(path).await?;
        let records: Vec<Media> =
            serde_json::from_str(&content).map_err(|e| RepositoryError::InvalidCatalog {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        info!(
            "Loaded {} media records from {}",
            records.len(),
            path.display()
        );
        Ok(Self::with_media(records))
    }

    /// Adds or replaces a record.
    pub async fn insert(&self, media: Media) {
        self.media.write().await.insert(media.id.clone(), media);
    }

    /// Number of records held.
    pub async fn len(&self) -> usize {
        self.media.read().await.len()
    }

    /// Whether the repository holds no records.
    pub async fn is_empty(&self) -> bool {
        self.media.read().await.is_empty()
    }
}

#[async_trait]
impl MediaRepository for InMemoryMediaRepository {
    async fn find(&self, id: &MediaId) -> Result<Option<Media>, RepositoryError> {
        Ok(self.media.read().await.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_find_returns_inserted_media() {
        let repository = InMemoryMediaRepository::new();
        repository
            .insert(Media::new(5u64, "image", "default", "default/5.jpg"))
            .await;

        let found = repository.find(&MediaId::from(5)).await.unwrap();
        assert_eq!(found.unwrap().reference, "default/5.jpg");
        assert!(repository.find(&MediaId::from(6)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_catalog_loading() {
        let dir = TempDir::new().unwrap();
        let catalog = dir.path().join("catalog.json");
        std::fs::write(
            &catalog,
            r#"[{
                "id": 12,
                "name": "Sunset",
                "provider_name": "image",
                "context": "default",
                "extension": "jpg",
                "content_type": "image/jpeg",
                "reference": "default/12.jpg"
            }]"#,
        )
        .unwrap();

        let repository = InMemoryMediaRepository::from_catalog(&catalog).await.unwrap();
        assert_eq!(repository.len().await, 1);

        let media = repository.find(&MediaId::new("12")).await.unwrap().unwrap();
        assert_eq!(media.name, "Sunset");
    }

    #[tokio::test]
    async fn test_invalid_catalog_is_reported() {
        let dir = TempDir::new().unwrap();
        let catalog = dir.path().join("catalog.json");
        std::fs::write(&catalog, "{not json").unwrap();

        let result = InMemoryMediaRepository::from_catalog(&catalog).await;
        assert!(matches!(result, Err(RepositoryError::InvalidCatalog { .. })));
    }
}
