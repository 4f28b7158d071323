use tokio::sync::Mutex;

use crate::error::Result;

use super::tables::Tables;
use super::{Record, Table};

/// Volatile tables; nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, record: Record) -> Result<()> {
        self.tables.lock().await.insert(record)
    }

    pub async fn get_all(&self, table: Table, article_id: &str) -> Result<Vec<Record>> {
        Ok(self.tables.lock().await.select_all(table, article_id))
    }

    pub async fn get_one(&self, table: Table, article_id: &str) -> Result<Option<Record>> {
        Ok(self.tables.lock().await.select_one(table, article_id))
    }

    pub async fn delete(&self, table: Table, article_id: &str, key: &str) -> Result<()> {
        self.tables.lock().await.delete(table, article_id, key);
        Ok(())
    }
}
