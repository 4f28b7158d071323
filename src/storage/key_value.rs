use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{Highlight, Progress, Stats};

use super::{Record, Table};

pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Flat string-to-string store persisted as one JSON file, with a byte quota
/// over the sum of key and value lengths.
///
/// Backs the key-value storage tier (`highlights_<id>`, `progress_<id>`,
/// `stats_<id>`) and, as a separate file, the reader preferences.
pub struct KeyValueStore {
    path: Option<PathBuf>,
    quota_bytes: usize,
    items: Mutex<BTreeMap<String, String>>,
}

impl KeyValueStore {
    /// Loads the file (missing means empty) and rewrites it to prove the location is writable.
    pub async fn open(path: &Path, quota_bytes: usize) -> Result<Self> {
        let items = match tokio::fs::read_to_string(path).await {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        let store = Self {
            path: Some(path.to_path_buf()),
            quota_bytes,
            items: Mutex::new(items),
        };
        store.persist(&*store.items.lock().await).await?;
        Ok(store)
    }

    pub fn in_memory(quota_bytes: usize) -> Self {
        Self {
            path: None,
            quota_bytes,
            items: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.path.is_some()
    }

    pub async fn get_item(&self, key: &str) -> Option<String> {
        self.items.lock().await.get(key).cloned()
    }

    pub async fn set_item(&self, key: &str, value: String) -> Result<()> {
        let mut items = self.items.lock().await;
        let current = items.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
        let used: usize = items.iter().map(|(k, v)| k.len() + v.len()).sum();
        let needed = used - current + key.len() + value.len();
        if needed > self.quota_bytes {
            return Err(AppError::QuotaExceeded(format!(
                "writing {key} needs {needed} bytes, quota is {}",
                self.quota_bytes
            )));
        }

        let previous = items.insert(key.to_string(), value);
        if let Err(e) = self.persist(&items).await {
            match previous {
                Some(v) => items.insert(key.to_string(), v),
                None => items.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    pub async fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self.items.lock().await;
        if items.remove(key).is_some() {
            self.persist(&items).await?;
        }
        Ok(())
    }

    async fn persist(&self, items: &BTreeMap<String, String>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec(items)?).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    // Record surface used when this store is the active backend.

    pub async fn put(&self, record: Record) -> Result<()> {
        let key = record_key(record.table(), record.article_id());
        let value = match record {
            Record::Highlight(h) => {
                let mut rows = self.highlights(&key).await?;
                if rows.iter().any(|r| r.id == h.id) {
                    return Err(AppError::Storage(format!("duplicate highlight id {}", h.id)));
                }
                rows.push(h);
                serde_json::to_string(&rows)?
            }
            Record::Progress(p) => serde_json::to_string(&p)?,
            Record::Stats(s) => serde_json::to_string(&s)?,
        };
        self.set_item(&key, value).await
    }

    pub async fn get_all(&self, table: Table, article_id: &str) -> Result<Vec<Record>> {
        let key = record_key(table, article_id);
        match table {
            Table::Highlights => {
                let mut rows = self.highlights(&key).await?;
                rows.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
                Ok(rows.into_iter().map(Record::Highlight).collect())
            }
            Table::Progress | Table::Stats => Ok(self.single(table, &key).await?.into_iter().collect()),
        }
    }

    pub async fn get_one(&self, table: Table, article_id: &str) -> Result<Option<Record>> {
        let key = record_key(table, article_id);
        match table {
            Table::Highlights => {
                let rows = self.highlights(&key).await?;
                Ok(rows
                    .into_iter()
                    .min_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)))
                    .map(Record::Highlight))
            }
            Table::Progress | Table::Stats => self.single(table, &key).await,
        }
    }

    async fn single(&self, table: Table, key: &str) -> Result<Option<Record>> {
        let Some(raw) = self.get_item(key).await else {
            return Ok(None);
        };
        match table {
            Table::Progress => Ok(Some(Record::Progress(serde_json::from_str::<Progress>(&raw)?))),
            Table::Stats => Ok(Some(Record::Stats(serde_json::from_str::<Stats>(&raw)?))),
            Table::Highlights => Ok(None),
        }
    }

    pub async fn delete(&self, table: Table, article_id: &str, key: &str) -> Result<()> {
        let item_key = record_key(table, article_id);
        match table {
            Table::Highlights => {
                let mut rows = self.highlights(&item_key).await?;
                let before = rows.len();
                rows.retain(|h| h.id != key);
                if rows.len() != before {
                    self.set_item(&item_key, serde_json::to_string(&rows)?).await?;
                }
                Ok(())
            }
            _ => self.remove_item(&item_key).await,
        }
    }

    async fn highlights(&self, key: &str) -> Result<Vec<Highlight>> {
        match self.get_item(key).await {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }
}

fn record_key(table: Table, article_id: &str) -> String {
    format!("{}_{}", table.as_str(), article_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn items_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let store = KeyValueStore::open(&path, DEFAULT_QUOTA_BYTES).await.unwrap();
        store.set_item("auto-resume", "true".into()).await.unwrap();
        drop(store);

        let store = KeyValueStore::open(&path, DEFAULT_QUOTA_BYTES).await.unwrap();
        assert_eq!(store.get_item("auto-resume").await.as_deref(), Some("true"));
        store.remove_item("auto-resume").await.unwrap();
        assert_eq!(store.get_item("auto-resume").await, None);
    }

    #[tokio::test]
    async fn quota_rejects_oversized_writes_without_side_effects() {
        let store = KeyValueStore::in_memory(16);
        store.set_item("k", "1234567890".into()).await.unwrap();

        let err = store.set_item("other", "123456".into()).await.unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(store.get_item("other").await, None);

        // replacing an existing value only counts the difference
        store.set_item("k", "abcdefghijklm".into()).await.unwrap();
    }

    fn highlight(id: &str, created_at: i64) -> Highlight {
        Highlight {
            id: id.into(),
            article_id: "my-post".into(),
            text: "Hello".into(),
            color: crate::models::HighlightColor::Blue,
            position: crate::document::SerializedRange {
                start_path: vec![1, 0, 0],
                start_offset: 0,
                end_path: vec![1, 0, 0],
                end_offset: 5,
                text: "Hello".into(),
            },
            created_at,
        }
    }

    #[tokio::test]
    async fn record_reads_by_table() {
        let store = KeyValueStore::in_memory(DEFAULT_QUOTA_BYTES);
        store.put(Record::Highlight(highlight("hl-late", 20))).await.unwrap();
        store.put(Record::Highlight(highlight("hl-early", 10))).await.unwrap();

        let first = store.get_one(Table::Highlights, "my-post").await.unwrap();
        assert_eq!(first, Some(Record::Highlight(highlight("hl-early", 10))));
        let ids: Vec<String> = store
            .get_all(Table::Highlights, "my-post")
            .await
            .unwrap()
            .into_iter()
            .filter_map(|r| match r {
                Record::Highlight(h) => Some(h.id),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["hl-early", "hl-late"]);

        assert!(store.get_all(Table::Stats, "my-post").await.unwrap().is_empty());
        let progress = Progress {
            article_id: "my-post".into(),
            scroll_position: 12.0,
            percentage: 30.0,
            last_read: 1_700_000_000_000,
        };
        store.put(Record::Progress(progress.clone())).await.unwrap();
        assert_eq!(
            store.get_all(Table::Progress, "my-post").await.unwrap(),
            vec![Record::Progress(progress)]
        );
    }

    #[tokio::test]
    async fn open_fails_when_location_is_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(KeyValueStore::open(dir.path(), DEFAULT_QUOTA_BYTES).await.is_err());
    }
}
