use crate::catalog::BookId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything a controller needs to pick up where a destroyed one left off.
/// Absent fields restore to the no-selection baseline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default)]
    pub selected_book_id: Option<BookId>,
    /// Catalog in its JSON transport form
    #[serde(default)]
    pub serialized_catalog: String,
    #[serde(default)]
    pub progress: u64,
    #[serde(default)]
    pub is_playing: bool,
}

impl SessionSnapshot {
    pub async fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, json).await?;
        info!("Session snapshot saved to {}", path.display());
        Ok(())
    }

    /// A missing file is not an error: there was simply no previous session
    pub async fn load(path: &Path) -> Result<Option<Self>, SnapshotError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("session.json");
        let snapshot = SessionSnapshot {
            selected_book_id: Some(BookId::new("book-7")),
            serialized_catalog: "[]".to_string(),
            progress: 300,
            is_playing: true,
        };

        snapshot.save(&path).await.unwrap();
        assert_eq!(SessionSnapshot::load(&path).await.unwrap(), Some(snapshot));
    }

    #[tokio::test]
    async fn test_missing_file_is_baseline() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = SessionSnapshot::load(&temp_dir.path().join("none.json"))
            .await
            .unwrap();
        assert_eq!(loaded, None);
    }

    #[test]
    fn test_absent_fields_default() {
        let snapshot: SessionSnapshot = serde_json::from_str("{}").unwrap();
        assert_eq!(snapshot, SessionSnapshot::default());
    }
}
