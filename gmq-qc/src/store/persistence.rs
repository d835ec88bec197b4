//! Durable storage of the playlist document

use super::document::PlaylistDocument;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Load/save of the whole playlist document
#[async_trait]
pub trait PlaylistPersistence: Send + Sync {
    /// Current durable document; a missing document is an empty store
    async fn load(&self) -> Result<PlaylistDocument>;

    /// Replace the durable document
    async fn save(&self, document: &PlaylistDocument) -> Result<()>;
}

/// JSON file written atomically (temp file + rename)
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "playlists.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl PlaylistPersistence for JsonFilePersistence {
    async fn load(&self) -> Result<PlaylistDocument> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No playlist file at {}, starting empty", self.path.display());
                return Ok(PlaylistDocument::default());
            }
            Err(e) => {
                return Err(Error::Persistence(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        if content.trim().is_empty() {
            return Ok(PlaylistDocument::default());
        }

        serde_json::from_str(&content).map_err(|e| {
            Error::Persistence(format!("Corrupt playlist file {}: {}", self.path.display(), e))
        })
    }

    async fn save(&self, document: &PlaylistDocument) -> Result<()> {
        let json = serde_json::to_vec_pretty(document)
            .map_err(|e| Error::Persistence(format!("Failed to serialize playlists: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Persistence(format!("{}: {}", parent.display(), e)))?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, &json)
            .await
            .map_err(|e| Error::Persistence(format!("{}: {}", temp.display(), e)))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| Error::Persistence(format!("{}: {}", self.path.display(), e)))?;

        debug!(bytes = json.len(), "Playlist document written to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gmq_common::{PlaylistRecord, UserId};

    #[tokio::test]
    async fn test_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = JsonFilePersistence::new(dir.path().join("playlists.json"));

        let doc = persistence.load().await.unwrap();
        assert!(doc.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = JsonFilePersistence::new(dir.path().join("nested").join("playlists.json"));

        let mut doc = PlaylistDocument::default();
        doc.insert(PlaylistRecord {
            name: "Chill".into(),
            owner_id: UserId(7),
            is_public: true,
            tracks: vec![],
        });
        persistence.save(&doc).await.unwrap();

        assert_eq!(persistence.load().await.unwrap(), doc);
        assert!(!persistence.temp_path().exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("playlists.json");
        std::fs::write(&path, "{not json").unwrap();

        let persistence = JsonFilePersistence::new(path);
        assert!(matches!(persistence.load().await, Err(Error::Persistence(_))));
    }
}
