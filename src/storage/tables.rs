use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Highlight, Progress, Stats};

use super::{Record, Table};

/// Process-local copy of the three tables, shared by the memory backend and
/// the object-store backend.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Tables {
    pub highlights: BTreeMap<String, Highlight>,
    pub progress: BTreeMap<String, Progress>,
    pub stats: BTreeMap<String, Stats>,
}

impl Tables {
    /// Appends highlights, upserts progress and stats by article id.
    pub fn insert(&mut self, record: Record) -> Result<()> {
        match record {
            Record::Highlight(h) => {
                if self.highlights.contains_key(&h.id) {
                    return Err(AppError::Storage(format!("duplicate highlight id {}", h.id)));
                }
                self.highlights.insert(h.id.clone(), h);
            }
            Record::Progress(p) => {
                self.progress.insert(p.article_id.clone(), p);
            }
            Record::Stats(s) => {
                self.stats.insert(s.article_id.clone(), s);
            }
        }
        Ok(())
    }

    pub fn select_all(&self, table: Table, article_id: &str) -> Vec<Record> {
        match table {
            Table::Highlights => {
                let mut rows: Vec<&Highlight> = self
                    .highlights
                    .values()
                    .filter(|h| h.article_id == article_id)
                    .collect();
                rows.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
                rows.into_iter().cloned().map(Record::Highlight).collect()
            }
            Table::Progress | Table::Stats => self.select_one(table, article_id).into_iter().collect(),
        }
    }

    pub fn select_one(&self, table: Table, article_id: &str) -> Option<Record> {
        match table {
            Table::Highlights => self.select_all(table, article_id).into_iter().next(),
            Table::Progress => self.progress.get(article_id).cloned().map(Record::Progress),
            Table::Stats => self.stats.get(article_id).cloned().map(Record::Stats),
        }
    }

    /// Returns whether a row was removed.
    pub fn delete(&mut self, table: Table, article_id: &str, key: &str) -> bool {
        match table {
            Table::Highlights => match self.highlights.get(key) {
                Some(h) if h.article_id == article_id => self.highlights.remove(key).is_some(),
                _ => false,
            },
            Table::Progress => self.progress.remove(article_id).is_some(),
            Table::Stats => self.stats.remove(article_id).is_some(),
        }
    }
}
