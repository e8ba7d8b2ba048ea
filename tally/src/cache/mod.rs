use crate::changes::{ChangeSet, RowChangeRecord};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

#[derive(Debug)]
pub enum CacheError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    NoCacheDir,
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Io(e) => write!(f, "IO error: {}", e),
            CacheError::Serialization(e) => write!(f, "Serialization error: {}", e),
            CacheError::NoCacheDir => write!(f, "Could not find cache directory"),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(err)
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err)
    }
}

/// Unsaved edits written to disk so they survive a restart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedDraft {
    pub records: Vec<RowChangeRecord>,
    pub cached_at: i64, // Unix timestamp
}

/// Draft store using tokio::fs for non-blocking file I/O
#[derive(Clone)]
pub struct Cache {
    cache_dir: PathBuf,
}

impl Cache {
    pub async fn new() -> Result<Self, CacheError> {
        let cache_dir = dirs::cache_dir()
            .ok_or(CacheError::NoCacheDir)?
            .join("tally")
            .join("drafts");
        Self::at(cache_dir).await
    }

    pub async fn at(cache_dir: PathBuf) -> Result<Self, CacheError> {
        fs::create_dir_all(&cache_dir).await?;
        Ok(Self { cache_dir })
    }

    fn draft_path(&self, name: &str) -> PathBuf {
        let name: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.cache_dir.join(format!("draft_{}.json", name))
    }

    pub async fn get_draft(&self, name: &str) -> Result<Option<ChangeSet>, CacheError> {
        let path = self.draft_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read_to_string(&path).await?;
        let cached: CachedDraft = serde_json::from_str(&data)?;
        tracing::debug!("Loaded draft '{}' with {} rows", name, cached.records.len());
        Ok(Some(ChangeSet::from_records(cached.records)))
    }

    /// Write the change set out; an empty one removes the draft
    pub async fn set_draft(&self, name: &str, changes: &ChangeSet) -> Result<(), CacheError> {
        if changes.is_empty() {
            return self.clear_draft(name).await;
        }

        let cached = CachedDraft {
            records: changes.records().into_iter().cloned().collect(),
            cached_at: chrono::Utc::now().timestamp(),
        };
        let json = serde_json::to_string_pretty(&cached)?;
        fs::write(self.draft_path(name), json).await?;
        Ok(())
    }

    pub async fn clear_draft(&self, name: &str) -> Result<(), CacheError> {
        let path = self.draft_path(name);
        if path.exists() {
            fs::remove_file(&path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::{CategoryField, EntityKind, Placement, TransactionField};
    use crate::identity::{allocate_pending_id, RowKey};
    use tally_api::endpoints::RowId;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("tally-cache-{}", uuid::Uuid::new_v4().simple()))
    }

    #[tokio::test]
    async fn draft_survives_a_restart() {
        let dir = temp_dir();
        let cache = Cache::at(dir.clone()).await.unwrap();
        let mut changes = ChangeSet::new();
        let created = RowKey::from(allocate_pending_id());
        changes
            .mark_creation(
                created.clone(),
                EntityKind::Category,
                vec![(CategoryField::Name.into(), "Garden".into())],
                Placement::Before(RowKey::from("cat-2")),
            )
            .unwrap();
        changes
            .set_field(
                &RowKey::Persisted(RowId::from("t-1")),
                TransactionField::Memo,
                "split with Sam",
                "",
            )
            .unwrap();

        cache.set_draft("main", &changes).await.unwrap();
        let restored = cache.get_draft("main").await.unwrap().unwrap();

        assert_eq!(restored.len(), 2);
        assert_eq!(restored.get(&created), changes.get(&created));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn empty_change_set_clears_draft() {
        let dir = temp_dir();
        let cache = Cache::at(dir.clone()).await.unwrap();
        let mut changes = ChangeSet::new();
        changes
            .set_field(
                &RowKey::Persisted(RowId::from("t-1")),
                TransactionField::Description,
                "Bakery",
                "Bakery run",
            )
            .unwrap();
        cache.set_draft("main", &changes).await.unwrap();

        cache.set_draft("main", &ChangeSet::new()).await.unwrap();
        assert!(cache.get_draft("main").await.unwrap().is_none());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn draft_names_are_sanitized() {
        let dir = temp_dir();
        let cache = Cache::at(dir.clone()).await.unwrap();
        assert_eq!(
            cache.draft_path("../evil"),
            dir.join("draft____evil.json")
        );
        let _ = std::fs::remove_dir_all(dir);
    }
}
