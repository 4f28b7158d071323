use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::Result;

use super::tables::Tables;
use super::{Record, Table};

/// Structured object-store backend: one JSON file per table inside a
/// directory, keyed by highlight id or article id.
pub struct ObjectStore {
    dir: PathBuf,
    tables: Mutex<Tables>,
}

impl ObjectStore {
    /// Creates the directory and every store file that does not exist yet.
    pub async fn open(dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let tables = Tables {
            highlights: load_store(&dir.join(store_file(Table::Highlights))).await?,
            progress: load_store(&dir.join(store_file(Table::Progress))).await?,
            stats: load_store(&dir.join(store_file(Table::Stats))).await?,
        };
        let store = Self {
            dir: dir.to_path_buf(),
            tables: Mutex::new(tables),
        };
        {
            let tables = store.tables.lock().await;
            for table in Table::ALL {
                store.flush(&tables, table).await?;
            }
        }
        Ok(store)
    }

    pub async fn put(&self, record: Record) -> Result<()> {
        let table = record.table();
        let mut tables = self.tables.lock().await;
        let snapshot = tables.clone();
        tables.insert(record)?;
        if let Err(e) = self.flush(&tables, table).await {
            *tables = snapshot;
            return Err(e);
        }
        Ok(())
    }

    pub async fn get_all(&self, table: Table, article_id: &str) -> Result<Vec<Record>> {
        Ok(self.tables.lock().await.select_all(table, article_id))
    }

    pub async fn get_one(&self, table: Table, article_id: &str) -> Result<Option<Record>> {
        Ok(self.tables.lock().await.select_one(table, article_id))
    }

    pub async fn delete(&self, table: Table, article_id: &str, key: &str) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let snapshot = tables.clone();
        if tables.delete(table, article_id, key) {
            if let Err(e) = self.flush(&tables, table).await {
                *tables = snapshot;
                return Err(e);
            }
        }
        Ok(())
    }

    async fn flush(&self, tables: &Tables, table: Table) -> Result<()> {
        let path = self.dir.join(store_file(table));
        match table {
            Table::Highlights => write_store(&path, &tables.highlights).await,
            Table::Progress => write_store(&path, &tables.progress).await,
            Table::Stats => write_store(&path, &tables.stats).await,
        }
    }
}

fn store_file(table: Table) -> String {
    format!("{}.json", table.as_str())
}

async fn load_store<T: DeserializeOwned>(path: &Path) -> Result<BTreeMap<String, T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(e.into()),
    }
}

async fn write_store<T: Serialize>(path: &Path, rows: &BTreeMap<String, T>) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, serde_json::to_vec_pretty(rows)?).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SerializedRange;
    use crate::models::{Highlight, HighlightColor};

    fn highlight(id: &str, text: &str) -> Highlight {
        Highlight {
            id: id.into(),
            article_id: "my-post".into(),
            text: text.into(),
            color: HighlightColor::Yellow,
            position: SerializedRange {
                start_path: vec![1, 0, 0],
                start_offset: 0,
                end_path: vec![1, 0, 0],
                end_offset: text.chars().count(),
                text: text.into(),
            },
            created_at: 10,
        }
    }

    #[tokio::test]
    async fn failed_delete_keeps_the_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::open(dir.path()).await.unwrap();
        store.put(Record::Highlight(highlight("hl-1", "Hello"))).await.unwrap();

        // the temp file the flush writes through is now a directory
        std::fs::create_dir(dir.path().join("highlights.json.tmp")).unwrap();
        assert!(store.delete(Table::Highlights, "my-post", "hl-1").await.is_err());

        let rows = store.get_all(Table::Highlights, "my-post").await.unwrap();
        assert_eq!(rows, vec![Record::Highlight(highlight("hl-1", "Hello"))]);
    }

    #[tokio::test]
    async fn failed_put_leaves_tables_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::open(dir.path()).await.unwrap();
        std::fs::create_dir(dir.path().join("highlights.json.tmp")).unwrap();

        assert!(store.put(Record::Highlight(highlight("hl-1", "Hello"))).await.is_err());
        assert!(store.get_all(Table::Highlights, "my-post").await.unwrap().is_empty());
    }
}
