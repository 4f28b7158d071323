//! Storage backend selection and the uniform record surface.
//!
//! One backend is chosen when a session starts and every read and write for
//! that session goes through it. Initialization failures are logged and the
//! next preference is tried; the chain always ends in memory.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Highlight, Progress, Stats};

mod key_value;
mod memory;
mod object_store;
mod relational;
mod schema;
mod tables;

pub use key_value::{KeyValueStore, DEFAULT_QUOTA_BYTES};
use memory::MemoryStore;
use object_store::ObjectStore;
use relational::RelationalStore;

/// Serialized names double as the `storageType` of highlight exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    #[serde(rename = "pglite", alias = "sqlite", alias = "relational")]
    Relational,
    #[serde(rename = "indexedDB", alias = "objectStore", alias = "structured")]
    Structured,
    #[serde(rename = "localStorage", alias = "keyValue")]
    KeyValue,
    #[serde(rename = "memory")]
    Memory,
}

impl BackendKind {
    pub const DEFAULT_PREFERENCE: [BackendKind; 4] = [
        BackendKind::Relational,
        BackendKind::Structured,
        BackendKind::KeyValue,
        BackendKind::Memory,
    ];

    pub fn storage_type(&self) -> &'static str {
        match self {
            BackendKind::Relational => "pglite",
            BackendKind::Structured => "indexedDB",
            BackendKind::KeyValue => "localStorage",
            BackendKind::Memory => "memory",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.storage_type())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Highlights,
    Progress,
    Stats,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::Highlights, Table::Progress, Table::Stats];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Highlights => "highlights",
            Table::Progress => "progress",
            Table::Stats => "stats",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Highlight(Highlight),
    Progress(Progress),
    Stats(Stats),
}

impl Record {
    pub fn table(&self) -> Table {
        match self {
            Record::Highlight(_) => Table::Highlights,
            Record::Progress(_) => Table::Progress,
            Record::Stats(_) => Table::Stats,
        }
    }

    pub fn article_id(&self) -> &str {
        match self {
            Record::Highlight(h) => &h.article_id,
            Record::Progress(p) => &p.article_id,
            Record::Stats(s) => &s.article_id,
        }
    }
}

/// Typed view over one table.
pub trait TableRecord: Sized + Into<Record> {
    const TABLE: Table;

    fn from_record(record: Record) -> Option<Self>;
}

macro_rules! table_record {
    ($ty:ident, $variant:ident, $table:expr) => {
        impl From<$ty> for Record {
            fn from(value: $ty) -> Self {
                Record::$variant(value)
            }
        }

        impl TableRecord for $ty {
            const TABLE: Table = $table;

            fn from_record(record: Record) -> Option<Self> {
                match record {
                    Record::$variant(value) => Some(value),
                    _ => None,
                }
            }
        }
    };
}

table_record!(Highlight, Highlight, Table::Highlights);
table_record!(Progress, Progress, Table::Progress);
table_record!(Stats, Stats, Table::Stats);

/// Where each persistent backend keeps its data.
#[derive(Debug, Clone)]
pub struct StorageLocations {
    pub sqlite_path: PathBuf,
    pub object_store_dir: PathBuf,
    pub key_value_path: PathBuf,
    pub key_value_quota_bytes: usize,
}

enum Backend {
    Relational(RelationalStore),
    Structured(ObjectStore),
    KeyValue(KeyValueStore),
    Memory(MemoryStore),
}

impl Backend {
    async fn open(kind: BackendKind, locations: &StorageLocations) -> Result<Self> {
        Ok(match kind {
            BackendKind::Relational => {
                Backend::Relational(RelationalStore::open(&locations.sqlite_path).await?)
            }
            BackendKind::Structured => {
                Backend::Structured(ObjectStore::open(&locations.object_store_dir).await?)
            }
            BackendKind::KeyValue => Backend::KeyValue(
                KeyValueStore::open(&locations.key_value_path, locations.key_value_quota_bytes)
                    .await?,
            ),
            BackendKind::Memory => Backend::Memory(MemoryStore::new()),
        })
    }

    fn kind(&self) -> BackendKind {
        match self {
            Backend::Relational(_) => BackendKind::Relational,
            Backend::Structured(_) => BackendKind::Structured,
            Backend::KeyValue(_) => BackendKind::KeyValue,
            Backend::Memory(_) => BackendKind::Memory,
        }
    }
}

/// Handle to the session's single active backend. Cheap to clone.
#[derive(Clone)]
pub struct Storage {
    backend: Arc<Backend>,
}

impl Storage {
    /// Tries each preference in order and keeps the first that initializes.
    pub async fn select(preferences: &[BackendKind], locations: &StorageLocations) -> Self {
        for &kind in preferences {
            match Backend::open(kind, locations).await {
                Ok(backend) => {
                    tracing::info!(backend = %kind, "storage backend selected");
                    return Self::from_backend(backend);
                }
                Err(e) => {
                    tracing::warn!(backend = %kind, error = %e, "storage backend unavailable");
                }
            }
        }

        tracing::warn!("no persistent storage available, highlights and progress will not survive a restart");
        Self::in_memory()
    }

    pub fn in_memory() -> Self {
        Self::from_backend(Backend::Memory(MemoryStore::new()))
    }

    fn from_backend(backend: Backend) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn storage_type(&self) -> &'static str {
        self.kind().storage_type()
    }

    /// Appends to `highlights`; inserts or replaces by article id for `progress` and `stats`.
    pub async fn put(&self, record: impl Into<Record>) -> Result<()> {
        let record = record.into();
        match &*self.backend {
            Backend::Relational(db) => db.put(record).await,
            Backend::Structured(db) => db.put(record).await,
            Backend::KeyValue(db) => db.put(record).await,
            Backend::Memory(db) => db.put(record).await,
        }
    }

    pub async fn get_all(&self, table: Table, article_id: &str) -> Result<Vec<Record>> {
        match &*self.backend {
            Backend::Relational(db) => db.get_all(table, article_id).await,
            Backend::Structured(db) => db.get_all(table, article_id).await,
            Backend::KeyValue(db) => db.get_all(table, article_id).await,
            Backend::Memory(db) => db.get_all(table, article_id).await,
        }
    }

    pub async fn get_one(&self, table: Table, article_id: &str) -> Result<Option<Record>> {
        match &*self.backend {
            Backend::Relational(db) => db.get_one(table, article_id).await,
            Backend::Structured(db) => db.get_one(table, article_id).await,
            Backend::KeyValue(db) => db.get_one(table, article_id).await,
            Backend::Memory(db) => db.get_one(table, article_id).await,
        }
    }

    /// `key` is the highlight id for `highlights` and ignored for the per-article tables.
    pub async fn delete(&self, table: Table, article_id: &str, key: &str) -> Result<()> {
        match &*self.backend {
            Backend::Relational(db) => db.delete(table, article_id, key).await,
            Backend::Structured(db) => db.delete(table, article_id, key).await,
            Backend::KeyValue(db) => db.delete(table, article_id, key).await,
            Backend::Memory(db) => db.delete(table, article_id, key).await,
        }
    }

    pub async fn all<T: TableRecord>(&self, article_id: &str) -> Result<Vec<T>> {
        Ok(self
            .get_all(T::TABLE, article_id)
            .await?
            .into_iter()
            .filter_map(T::from_record)
            .collect())
    }

    pub async fn one<T: TableRecord>(&self, article_id: &str) -> Result<Option<T>> {
        Ok(self.get_one(T::TABLE, article_id).await?.and_then(T::from_record))
    }
}
